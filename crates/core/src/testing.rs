//! In-memory port implementations for tests
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use userhub_domain::{AccountError, IdentityUser, ProfileChanges, Result, UserProfile};

use crate::identity::ports::IdentityVerifier;
use crate::upload::ports::{ObjectStore, StoredObject};
use crate::user::ports::UserProfileRepository;

/// Profile store with the same uniqueness rules as the SQL schema
#[derive(Default)]
pub struct InMemoryUserProfileRepository {
    rows: Mutex<Vec<UserProfile>>,
    hidden_lookups: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl InMemoryUserProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` lookups miss, as if a concurrent writer inserted
    /// the row right after the lookup ran.
    pub fn hide_next_lookups(&self, count: usize) {
        self.hidden_lookups.store(count, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    pub fn profiles(&self) -> Vec<UserProfile> {
        self.rows.lock().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn lookup_hidden(&self) -> bool {
        self.hidden_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn find<F>(&self, predicate: F) -> Option<UserProfile>
    where
        F: Fn(&UserProfile) -> bool,
    {
        if self.lookup_hidden() {
            return None;
        }
        self.rows.lock().iter().find(|row| predicate(row)).cloned()
    }
}

fn check_unique(rows: &[UserProfile], candidate: &UserProfile) -> Result<()> {
    for row in rows.iter().filter(|row| row.id != candidate.id) {
        if row.email == candidate.email {
            return Err(AccountError::Conflict("email already exists".into()));
        }
        if candidate.external_id.is_some() && row.external_id == candidate.external_id {
            return Err(AccountError::Conflict("supabase id already exists".into()));
        }
    }
    Ok(())
}

#[async_trait]
impl UserProfileRepository for InMemoryUserProfileRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<UserProfile>> {
        Ok(self.rows.lock().iter().find(|row| row.id == id).cloned())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.find(|row| row.external_id.as_deref() == Some(external_id)))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        Ok(self.find(|row| row.email == email))
    }

    async fn create(&self, mut profile: UserProfile) -> Result<UserProfile> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock();
        profile.id = rows.iter().map(|row| row.id).max().unwrap_or(0) + 1;
        check_unique(&rows, &profile)?;
        rows.push(profile.clone());
        Ok(profile)
    }

    async fn update(&self, id: i64, changes: ProfileChanges) -> Result<UserProfile> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock();
        let current = rows
            .iter()
            .find(|row| row.id == id)
            .ok_or_else(|| AccountError::NotFound(format!("user profile {id}")))?;
        // Merged against the row under the lock, like the single UPDATE in SQL.
        let merged = current.with_changes(&changes);
        check_unique(&rows, &merged)?;
        let slot = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| AccountError::NotFound(format!("user profile {id}")))?;
        *slot = merged;
        Ok(slot.clone())
    }
}

/// Object store kept in a map
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    public_prefix: String,
    write_delay: Option<std::time::Duration>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new("/uploads")
    }
}

impl InMemoryObjectStore {
    pub fn new(public_prefix: impl Into<String>) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            public_prefix: public_prefix.into(),
            write_delay: None,
        }
    }

    /// Delay every write, to exercise storage timeouts.
    pub fn with_write_delay(mut self, delay: std::time::Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.objects
            .lock()
            .insert(key.to_string(), StoredObject { bytes, content_type: content_type.to_string() });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>> {
        Ok(self.objects.lock().get(key).cloned())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), key)
    }
}

/// Verifier backed by a fixed token table
#[derive(Default)]
pub struct StaticIdentityVerifier {
    tokens: Mutex<HashMap<String, IdentityUser>>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: &str, user: IdentityUser) -> Self {
        self.tokens.lock().insert(token.to_string(), user);
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, access_token: &str) -> Result<IdentityUser> {
        self.tokens
            .lock()
            .get(access_token)
            .cloned()
            .ok_or_else(|| AccountError::Unauthorized("invalid session".into()))
    }
}
