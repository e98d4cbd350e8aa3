//! Auth endpoint.

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::models::UserProfile;

/// `GET /auth/me`: the backend's view of the signed-in user.
pub async fn me(api: &ApiClient) -> Result<UserProfile, ApiError> {
    api.get("/auth/me").await
}
