//! Supabase Auth (GoTrue) adapter.
//!
//! Implements both identity ports: server-side token verification for the
//! HTTP handlers and the client-side session lifecycle consumed by the
//! session context. Credentials never touch this service's database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;
use userhub_core::identity::ports::{IdentityClient, IdentityVerifier};
use userhub_domain::{
    AccountError, AuthEvent, IdentityConfig, IdentityUser, ProfileAttributes, Result, Session,
    SignUpOutcome,
};

use crate::errors::InfraError;
use crate::http::client::{error_from_response, HttpClient};

/// Refresh this many seconds ahead of the provider-reported expiry.
const REFRESH_THRESHOLD_SECS: i64 = 60;
const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    expires_at: Option<i64>,
    user: IdentityUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a full session, or only the user while the e-mail
/// address awaits confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(IdentityUser),
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: SignUpMetadata<'a>,
}

/// User metadata stored by the provider alongside the credentials.
#[derive(Serialize)]
struct SignUpMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpf: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    birth_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    city: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<&'a str>,
}

impl<'a> From<&'a ProfileAttributes> for SignUpMetadata<'a> {
    fn from(attributes: &'a ProfileAttributes) -> Self {
        Self {
            full_name: attributes.full_name.as_deref(),
            phone: attributes.phone.as_deref(),
            cpf: attributes.cpf.as_deref(),
            birth_date: attributes.birth_date.as_deref(),
            country: attributes.country.as_deref(),
            city: attributes.city.as_deref(),
            gender: attributes.gender.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// Supabase Auth client holding at most one session
pub struct SupabaseAuthClient {
    http: HttpClient,
    auth_url: Url,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseAuthClient {
    /// Build a client for the project at `config.url`.
    ///
    /// The anon key is attached to every request as the `apikey` header.
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.anon_key)
            .map_err(|_| AccountError::Config("anon key is not a valid header value".into()))?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);

        let http = HttpClient::builder().default_headers(headers).build()?;
        Self::with_http_client(http, &config.url)
    }

    /// Use a preconfigured client; it must already send the `apikey` header.
    pub fn with_http_client(http: HttpClient, project_url: &str) -> Result<Self> {
        let base = Url::parse(project_url)
            .map_err(|e| AccountError::Config(format!("invalid identity url: {e}")))?;
        let auth_url = base
            .join("auth/v1/")
            .map_err(|e| AccountError::Config(format!("invalid identity url: {e}")))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self { http, auth_url, session: RwLock::new(None), events })
    }

    /// Seed a session restored from client storage.
    pub fn with_session(self, session: Session) -> Self {
        *self.session.write() = Some(session);
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.auth_url
            .join(path)
            .map_err(|e| AccountError::Internal(format!("invalid auth endpoint {path}: {e}")))
    }

    fn authorized(&self, method: Method, url: Url, access_token: &str) -> RequestBuilder {
        self.http.request(method, url).header(AUTHORIZATION, format!("Bearer {access_token}"))
    }

    async fn token_grant<B: Serialize>(
        &self,
        grant_type: &str,
        body: &B,
        rejected: &str,
    ) -> Result<Session> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self.http.send(self.http.request(Method::POST, url).json(body)).await?;
        match response.status() {
            status if status.is_success() => {
                let token = response.json::<TokenResponse>().await.map_err(InfraError::from)?;
                Ok(token.into_session())
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                debug!(grant_type, "token grant rejected");
                Err(AccountError::Unauthorized(rejected.to_string()))
            }
            _ => Err(error_from_response(response).await),
        }
    }

    fn store_and_emit(&self, session: Session, event: fn(Session) -> AuthEvent) {
        *self.session.write() = Some(session.clone());
        self.emit(event(session));
    }

    fn clear_and_emit(&self) {
        let had_session = self.session.write().take().is_some();
        if had_session {
            self.emit(AuthEvent::SignedOut);
        }
    }

    fn emit(&self, event: AuthEvent) {
        let name = event.name();
        // No receivers is fine; nobody is listening yet.
        let receivers = self.events.send(event).unwrap_or(0);
        debug!(event = name, receivers, "auth event emitted");
    }
}

#[async_trait]
impl IdentityVerifier for SupabaseAuthClient {
    async fn verify(&self, access_token: &str) -> Result<IdentityUser> {
        if access_token.trim().is_empty() {
            return Err(AccountError::Unauthorized("missing session".into()));
        }

        let url = self.endpoint("user")?;
        let response = self.http.send(self.authorized(Method::GET, url, access_token)).await?;
        match response.status() {
            status if status.is_success() => {
                Ok(response.json::<IdentityUser>().await.map_err(InfraError::from)?)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AccountError::Unauthorized("invalid session".into()))
            }
            _ => Err(error_from_response(response).await),
        }
    }
}

#[async_trait]
impl IdentityClient for SupabaseAuthClient {
    async fn current_session(&self) -> Result<Option<Session>> {
        let Some(session) = self.session.read().clone() else {
            return Ok(None);
        };
        if !session.is_expired(REFRESH_THRESHOLD_SECS) {
            return Ok(Some(session));
        }

        match self.refresh_session().await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(AccountError::Unauthorized(_)) => {
                info!("stored session could not be refreshed, signing out");
                self.clear_and_emit();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &ProfileAttributes,
    ) -> Result<SignUpOutcome> {
        let url = self.endpoint("signup")?;
        let body = SignUpBody { email, password, data: SignUpMetadata::from(metadata) };

        let response = self.http.send(self.http.request(Method::POST, url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        match response.json::<SignUpResponse>().await.map_err(InfraError::from)? {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                let user = session.user.clone();
                self.store_and_emit(session.clone(), AuthEvent::SignedIn);
                info!(user_id = %user.id, "provider sign-up completed with session");
                Ok(SignUpOutcome { user, session: Some(session) })
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "provider sign-up awaiting confirmation");
                Ok(SignUpOutcome { user, session: None })
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .token_grant("password", &PasswordGrant { email, password }, "invalid credentials")
            .await?;
        self.store_and_emit(session.clone(), AuthEvent::SignedIn);
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .session
            .read()
            .as_ref()
            .and_then(|session| session.refresh_token.clone())
            .ok_or_else(|| AccountError::Unauthorized("no session to refresh".into()))?;

        let session = self
            .token_grant(
                "refresh_token",
                &RefreshGrant { refresh_token: &refresh_token },
                "session expired",
            )
            .await?;
        self.store_and_emit(session.clone(), AuthEvent::TokenRefreshed);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        let access_token = self.session.read().as_ref().map(|s| s.access_token.clone());

        if let Some(token) = access_token {
            let url = self.endpoint("logout")?;
            match self.http.send(self.authorized(Method::POST, url, &token)).await {
                Ok(response)
                    if response.status().is_success()
                        || response.status() == StatusCode::UNAUTHORIZED => {}
                Ok(response) => {
                    let err = error_from_response(response).await;
                    warn!(error = %err, "remote sign-out failed, clearing local session");
                }
                Err(err) => {
                    warn!(error = %err, "remote sign-out failed, clearing local session");
                }
            }
        }

        self.clear_and_emit();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
