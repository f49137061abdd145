//! HTTP implementation of [`IdentityBackend`].

use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::{BackendError, IdentityBackend, LoginRequest, TokenResponse};
use crate::config::EndpointsConfig;
use crate::net::{HttpClient, join_url};

/// Identity backend reached over HTTP.
///
/// Relies on the shared [`HttpClient`] cookie jar to carry the renewal
/// credential between `login`, `refresh` and `logout`.
#[derive(Debug, Clone)]
pub struct HttpIdentityBackend {
    http: HttpClient,
    base_url: String,
    endpoints: EndpointsConfig,
}

impl HttpIdentityBackend {
    pub fn new(http: HttpClient, base_url: impl Into<String>, endpoints: EndpointsConfig) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            endpoints,
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, BackendError> {
        let url = join_url(&self.base_url, path)
            .map_err(|e| BackendError::InvalidResponse(format!("Invalid endpoint URL: {e}")))?;

        let mut request = self.http.inner().post(url);
        request = match body {
            Some(b) => request.json(b),
            None => request.json(&serde_json::json!({})),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), path, "Identity backend rejected request");
        Err(BackendError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_for_token<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<TokenResponse, BackendError> {
        let response = self.post(path, body).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice::<TokenResponse>(&bytes)
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse token response: {e}")))
    }
}

#[async_trait::async_trait]
impl IdentityBackend for HttpIdentityBackend {
    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, BackendError> {
        let token = self.post_for_token(&self.endpoints.login, Some(request)).await?;
        debug!("Login accepted");
        Ok(token)
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<TokenResponse, BackendError> {
        let token = self
            .post_for_token::<serde_json::Value>(&self.endpoints.refresh, None)
            .await?;
        debug!("Renewal accepted");
        Ok(token)
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), BackendError> {
        self.post::<serde_json::Value>(&self.endpoints.logout, None).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}
