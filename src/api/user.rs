//! The signed-in user.

use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::SessionError;

/// Profile of the user the current credential belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CurrentUser {
    #[serde(alias = "_id", alias = "userId", alias = "sub")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Remaining profile fields, kept as returned.
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

/// The user endpoint answers either with the user itself or wrapped in
/// `{"user": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserBody {
    Wrapped { user: CurrentUser },
    Bare(CurrentUser),
}

impl From<UserBody> for CurrentUser {
    fn from(body: UserBody) -> Self {
        match body {
            UserBody::Wrapped { user } | UserBody::Bare(user) => user,
        }
    }
}

impl ApiClient {
    /// Fetch the signed-in user through the pipeline.
    pub async fn current_user(&self) -> Result<CurrentUser, SessionError> {
        let path = self.session().config().endpoints.user.clone();
        let body: UserBody = self.get_json(&path).await?;
        Ok(body.into())
    }
}
