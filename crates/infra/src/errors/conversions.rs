//! Conversions from external infrastructure errors into domain errors.

use userhub_domain::AccountError;

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AccountError);

impl From<InfraError> for AccountError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AccountError> for InfraError {
    fn from(value: AccountError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAccountError {
    fn into_account(self) -> AccountError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → AccountError */
/* -------------------------------------------------------------------------- */

/// SQLITE_CONSTRAINT_UNIQUE
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;
/// SQLITE_CONSTRAINT_PRIMARYKEY
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;

impl IntoAccountError for SqlError {
    fn into_account(self) -> AccountError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        AccountError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        AccountError::Database("database is locked".into())
                    }
                    (
                        ErrorCode::ConstraintViolation,
                        SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY,
                    ) => AccountError::Conflict(if message.is_empty() {
                        "unique constraint violation".into()
                    } else {
                        message
                    }),
                    (ErrorCode::ConstraintViolation, _) => {
                        AccountError::Database(format!("constraint violation: {message}"))
                    }
                    _ => AccountError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => AccountError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                AccountError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                AccountError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => AccountError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => AccountError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_account())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → AccountError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(AccountError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AccountError */
/* -------------------------------------------------------------------------- */

impl IntoAccountError for HttpError {
    fn into_account(self) -> AccountError {
        if self.is_timeout() {
            return AccountError::Timeout("HTTP request timed out".into());
        }

        if self.is_connect() {
            return AccountError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 => AccountError::Unauthorized(message),
                403 => AccountError::Forbidden(message),
                404 => AccountError::NotFound(message),
                409 => AccountError::Conflict(message),
                400..=499 => AccountError::Validation(message),
                _ => AccountError::Network(message),
            };
        }

        if self.is_decode() {
            return AccountError::Network(format!("invalid response body: {self}"));
        }

        AccountError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_account())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → AccountError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        let mapped = match value.kind() {
            std::io::ErrorKind::NotFound => AccountError::NotFound("object not found".into()),
            std::io::ErrorKind::TimedOut => AccountError::Timeout(value.to_string()),
            _ => AccountError::Storage(value.to_string()),
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use rusqlite::ffi::{Error as FfiError, ErrorCode};
    use rusqlite::Error as SqlError;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn sqlite_busy_maps_to_database_error() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::DatabaseBusy, extended_code: 5 },
            Some("database is locked".into()),
        );

        let mapped: AccountError = InfraError::from(err).into();
        match mapped {
            AccountError::Database(msg) => {
                assert!(msg.contains("busy") || msg.contains("locked"));
            }
            other => panic!("expected database error, got {:?}", other),
        }
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 2067 },
            Some("UNIQUE constraint failed: users.email".into()),
        );

        let mapped: AccountError = InfraError::from(err).into();
        assert_eq!(mapped, AccountError::Conflict("UNIQUE constraint failed: users.email".into()));
        assert!(mapped.is_retryable());
    }

    #[test]
    fn not_null_violation_is_not_a_conflict() {
        let err = SqlError::SqliteFailure(
            FfiError { code: ErrorCode::ConstraintViolation, extended_code: 1299 },
            Some("NOT NULL constraint failed: users.email".into()),
        );

        let mapped: AccountError = InfraError::from(err).into();
        assert!(matches!(mapped, AccountError::Database(_)));
    }

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let mapped: AccountError = InfraError::from(err).into();
        assert!(matches!(mapped, AccountError::NotFound(_)));
    }

    #[tokio::test]
    async fn http_status_401_maps_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(StatusCode::UNAUTHORIZED))
            .mount(&server)
            .await;

        let client = Client::builder().no_proxy().build().unwrap();
        let error = client.get(server.uri()).send().await.unwrap().error_for_status().unwrap_err();

        let mapped: AccountError = InfraError::from(error).into();
        match mapped {
            AccountError::Unauthorized(msg) => assert!(msg.contains("401")),
            other => panic!("expected unauthorized, got {:?}", other),
        }
    }
}
