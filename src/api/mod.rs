//! Authenticated API calls.
//!
//! [`ApiClient::send`] is the request pipeline: it attaches the current
//! access credential, and when the server rejects it, renews through the
//! [`RefreshCoordinator`](crate::session::RefreshCoordinator) and retries
//! the call exactly once.

pub mod request;
pub mod user;

pub use request::{ApiRequest, ApiResponse};
pub use user::CurrentUser;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::credential::AccessCredential;
use crate::error::SessionError;
use crate::net::{join_url, normalize_path};
use crate::session::SessionManager;

/// Header carrying the per-call correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Client for the platform API, bound to one session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Send `request` through the pipeline.
    ///
    /// Calls to the renewal endpoint go out without a credential. Calls
    /// flagged with [`ApiRequest::bypass_pipeline`] and calls to the renewal
    /// endpoint never trigger renewal; a rejection ends them with
    /// [`SessionError::SessionEnded`]. Any other call rejected for its
    /// credential is renewed and retried once; if the retry is rejected as
    /// well the session ends with a [`SessionError::Renewal`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let request_id = Uuid::new_v4().to_string();
        let renewal_call = self.is_renewal_endpoint(request.path());

        let credential = if renewal_call {
            None
        } else {
            match self.session.current_credential() {
                Some(credential) => Some(credential),
                None if request.is_bypassed() => None,
                None => {
                    debug!(path = request.path(), "No credential yet, renewing before call");
                    Some(self.session.coordinator().request_refresh().await?)
                }
            }
        };

        let response = self.execute(&request, credential.as_deref(), &request_id).await?;
        if !self.is_auth_rejected(response.status) {
            return into_result(response);
        }

        if renewal_call || request.is_bypassed() {
            warn!(
                status = response.status,
                path = request.path(),
                request_id = %request_id,
                "Call outside the renewal path was rejected, session ended"
            );
            return Err(SessionError::SessionEnded {
                status: response.status,
            });
        }

        debug!(
            status = response.status,
            path = request.path(),
            request_id = %request_id,
            "Credential rejected, renewing and retrying once"
        );
        let renewed = self.session.coordinator().request_refresh().await?;

        let retried = self.execute(&request, Some(renewed.as_ref()), &request_id).await?;
        if self.is_auth_rejected(retried.status) {
            warn!(
                status = retried.status,
                path = request.path(),
                request_id = %request_id,
                "Retried call rejected again"
            );
            let failure = self
                .session
                .coordinator()
                .reject_renewed(&renewed, retried.status);
            return Err(failure.into());
        }
        into_result(retried)
    }

    /// `GET path` and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    /// `POST path` with a JSON body and deserialize the JSON answer.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// `DELETE path`.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, SessionError> {
        self.send(ApiRequest::delete(path)).await
    }

    async fn execute(
        &self,
        request: &ApiRequest,
        credential: Option<&AccessCredential>,
        request_id: &str,
    ) -> Result<ApiResponse, SessionError> {
        let url = join_url(&self.session.config().api.base_url, request.path())?;

        let mut builder = self
            .session
            .http()
            .inner()
            .request(request.method().clone(), url)
            .header(REQUEST_ID_HEADER, request_id);

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(credential) = credential {
            builder = builder.header(reqwest::header::AUTHORIZATION, credential.bearer());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(ApiResponse {
            status,
            request_id: request_id.to_string(),
            body,
        })
    }

    fn is_renewal_endpoint(&self, path: &str) -> bool {
        normalize_path(path) == normalize_path(&self.session.config().endpoints.refresh)
    }

    fn is_auth_rejected(&self, status: u16) -> bool {
        self.session
            .config()
            .session
            .auth_rejected_statuses
            .contains(&status)
    }
}

fn into_result(response: ApiResponse) -> Result<ApiResponse, SessionError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(SessionError::Api {
        status: response.status,
        message: response.text(),
    })
}
