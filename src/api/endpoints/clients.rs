//! Client (borrower) endpoints.
//!
//! - `GET /clients`: paginated list with search and entity filter
//! - `GET /clients/:id`
//! - `POST /clients`
//! - `PUT /clients/:id`
//! - `DELETE /clients/:id`

use crate::api::client::ApiClient;
use crate::api::error::ApiError;
use crate::models::{Client, ClientCreate, ClientListParams, ClientListResponse, ClientUpdate};

pub async fn list(api: &ApiClient, params: &ClientListParams) -> Result<ClientListResponse, ApiError> {
    api.get_with("/clients", params).await
}

pub async fn get(api: &ApiClient, id: &str) -> Result<Client, ApiError> {
    api.get(&format!("/clients/{id}")).await
}

pub async fn create(api: &ApiClient, data: &ClientCreate) -> Result<Client, ApiError> {
    api.post("/clients", data).await
}

pub async fn update(api: &ApiClient, id: &str, data: &ClientUpdate) -> Result<Client, ApiError> {
    api.put(&format!("/clients/{id}"), data).await
}

pub async fn delete(api: &ApiClient, id: &str) -> Result<(), ApiError> {
    api.delete(&format!("/clients/{id}")).await
}
