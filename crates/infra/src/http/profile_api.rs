//! HTTP client for the account endpoints, used by the client session context.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;
use userhub_core::session::ports::ProfileApi;
use userhub_domain::{AccountError, Result, SyncRequest, UserProfile};

use super::client::{error_from_response, HttpClient};
use crate::errors::InfraError;

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    url: String,
}

/// [`ProfileApi`] over the service's own HTTP surface
pub struct HttpProfileApi {
    http: HttpClient,
    base_url: Url,
}

impl HttpProfileApi {
    /// `base_url` is the prefix the account routes hang off, e.g.
    /// `https://app.example.com/api/`.
    pub fn new(http: HttpClient, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| AccountError::Config(format!("invalid profile api url: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AccountError::Internal(format!("invalid endpoint {path}: {e}")))
    }
}

#[async_trait]
impl ProfileApi for HttpProfileApi {
    async fn fetch_profile(&self, external_id: &str) -> Result<Option<UserProfile>> {
        let mut url = self.endpoint("user")?;
        url.query_pairs_mut().append_pair("supabaseId", external_id);

        let response = self.http.send(self.http.request(Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("no profile row for session user yet");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let profile = response.json::<UserProfile>().await.map_err(InfraError::from)?;
        Ok(Some(profile))
    }

    async fn sync_profile(&self, request: &SyncRequest) -> Result<UserProfile> {
        let url = self.endpoint("user")?;
        let response = self.http.send(self.http.request(Method::POST, url).json(request)).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let envelope = response.json::<UserEnvelope>().await.map_err(InfraError::from)?;
        Ok(envelope.user)
    }

    async fn upload_avatar(
        &self,
        owner_email: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let url = self.endpoint("upload")?;
        let file = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| AccountError::Validation(format!("invalid content type: {e}")))?;
        let form = Form::new().part("file", file).text("email", owner_email.to_string());

        let response = self.http.send(self.http.request(Method::POST, url).multipart(form)).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let envelope = response.json::<UploadEnvelope>().await.map_err(InfraError::from)?;
        Ok(envelope.url)
    }
}
