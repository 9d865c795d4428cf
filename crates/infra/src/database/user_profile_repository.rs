//! User profile repository implementation using SQLite
//!
//! Rows live in the `users` table; `email` and `supabase_id` carry unique
//! constraints, and violations surface as `AccountError::Conflict`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use tokio::task;
use tracing::warn;
use userhub_core::user::ports::UserProfileRepository as UserProfileRepositoryPort;
use userhub_domain::{AccountError, ProfileChanges, Result as DomainResult, UserProfile};

use super::manager::{map_sql_error, DbManager, SqliteConnection};

const SELECT_COLUMNS: &str = "SELECT id, supabase_id, email, full_name, profile_image, api_token,
        phone, cpf, birth_date, country, city, gender, language, preferences,
        created_at, updated_at
     FROM users";

/// SQLite-backed implementation of `UserProfileRepository`
pub struct SqliteUserProfileRepository {
    db: Arc<DbManager>,
}

impl SqliteUserProfileRepository {
    /// Create a new repository instance
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn query_one<P>(
        &self,
        filter: &'static str,
        param: P,
    ) -> DomainResult<Option<UserProfile>>
    where
        P: rusqlite::ToSql + Send + 'static,
    {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<UserProfile>> {
            let conn = db.get_connection()?;
            select_one(&conn, filter, &param)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl UserProfileRepositoryPort for SqliteUserProfileRepository {
    async fn get_by_id(&self, id: i64) -> DomainResult<Option<UserProfile>> {
        self.query_one("id = ?1", id).await
    }

    async fn get_by_external_id(&self, external_id: &str) -> DomainResult<Option<UserProfile>> {
        self.query_one("supabase_id = ?1", external_id.to_string()).await
    }

    async fn get_by_email(&self, email: &str) -> DomainResult<Option<UserProfile>> {
        self.query_one("email = ?1", email.to_string()).await
    }

    async fn create(&self, profile: UserProfile) -> DomainResult<UserProfile> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<UserProfile> {
            let conn = db.get_connection()?;
            let id = insert_user_profile(&conn, &profile).map_err(map_sql_error)?;
            select_one(&conn, "id = ?1", &id)?.ok_or_else(|| {
                AccountError::Database(format!("inserted user profile {id} not readable"))
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, id: i64, changes: ProfileChanges) -> DomainResult<UserProfile> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<UserProfile> {
            let conn = db.get_connection()?;
            let changed = update_user_profile(&conn, id, &changes).map_err(map_sql_error)?;
            if changed == 0 {
                return Err(AccountError::NotFound(format!("user profile {id}")));
            }
            select_one(&conn, "id = ?1", &id)?
                .ok_or_else(|| AccountError::NotFound(format!("user profile {id}")))
        })
        .await
        .map_err(map_join_error)?
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn select_one(
    conn: &SqliteConnection,
    filter: &str,
    param: &dyn rusqlite::ToSql,
) -> DomainResult<Option<UserProfile>> {
    let sql = format!("{SELECT_COLUMNS} WHERE {filter}");
    conn.query_row(&sql, &[param], map_user_profile_row).optional().map_err(map_sql_error)
}

/// Map a row to a UserProfile
fn map_user_profile_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    let id: i64 = row.get(0)?;
    let preferences: Option<String> = row.get(13)?;

    Ok(UserProfile {
        id,
        external_id: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        profile_image: row.get(4)?,
        api_token: row.get(5)?,
        phone: row.get(6)?,
        cpf: row.get(7)?,
        birth_date: row.get(8)?,
        country: row.get(9)?,
        city: row.get(10)?,
        gender: row.get(11)?,
        language: row.get(12)?,
        preferences: preferences.and_then(|raw| parse_preferences(id, &raw)),
        created_at: millis_to_datetime(row.get(14)?),
        updated_at: millis_to_datetime(row.get(15)?),
    })
}

/// Insert a user profile and return its row id
fn insert_user_profile(conn: &SqliteConnection, profile: &UserProfile) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (
            supabase_id, email, full_name, profile_image, api_token, phone, cpf,
            birth_date, country, city, gender, language, preferences, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            profile.external_id,
            profile.email,
            profile.full_name,
            profile.profile_image,
            profile.api_token,
            profile.phone,
            profile.cpf,
            profile.birth_date,
            profile.country,
            profile.city,
            profile.gender,
            profile.language,
            serialize_preferences(profile.preferences.as_ref()),
            profile.created_at.timestamp_millis(),
            profile.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Write the supplied columns over the current row in one statement.
///
/// `NULL` parameters keep the stored value; `email` and `created_at` are never
/// touched.
fn update_user_profile(
    conn: &SqliteConnection,
    id: i64,
    changes: &ProfileChanges,
) -> rusqlite::Result<usize> {
    let attributes = &changes.attributes;
    conn.execute(
        "UPDATE users SET
            supabase_id = COALESCE(supabase_id, ?1),
            full_name = COALESCE(?2, full_name),
            profile_image = COALESCE(?3, profile_image),
            api_token = COALESCE(?4, api_token),
            phone = COALESCE(?5, phone),
            cpf = COALESCE(?6, cpf),
            birth_date = COALESCE(?7, birth_date),
            country = COALESCE(?8, country),
            city = COALESCE(?9, city),
            gender = COALESCE(?10, gender),
            language = COALESCE(?11, language),
            preferences = COALESCE(?12, preferences),
            updated_at = MAX(updated_at, ?13)
         WHERE id = ?14",
        params![
            changes.link_external_id,
            attributes.full_name,
            attributes.profile_image,
            attributes.api_token,
            attributes.phone,
            attributes.cpf,
            attributes.birth_date,
            attributes.country,
            attributes.city,
            attributes.gender,
            attributes.language,
            serialize_preferences(attributes.preferences.as_ref()),
            changes.updated_at.timestamp_millis(),
            id,
        ],
    )
}

fn serialize_preferences(preferences: Option<&Value>) -> Option<String> {
    preferences.map(Value::to_string)
}

fn parse_preferences(profile_id: i64, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(err) => {
            warn!(profile_id, error = %err, "stored preferences are not valid JSON, ignoring");
            None
        }
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn map_join_error(err: task::JoinError) -> AccountError {
    if err.is_cancelled() {
        AccountError::Internal("blocking user profile task cancelled".into())
    } else {
        AccountError::Internal(format!("blocking user profile task failed: {err}"))
    }
}
