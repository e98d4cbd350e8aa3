//! Backend REST client.
//!
//! Thin async wrapper over `reqwest`: attaches the bearer token from the
//! injected `TokenProvider`, unwraps the `{data, error}` envelope and turns
//! non-2xx responses into `ApiError::Status`. No retries; the caller decides.

use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use super::error::{ApiError, GENERIC_MESSAGE};
use crate::config::{ApiConfig, CONNECT_TIMEOUT};
use crate::session::TokenProvider;

/// Multipart form field every uploaded file is sent under.
pub const UPLOAD_FIELD: &str = "files";

pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("cma-autofill/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config,
            tokens,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════
    // JSON verbs
    // ═══════════════════════════════════════════════════════════

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(Method::GET, path, &[], None).await
    }

    /// GET with a query built from `params`; absent and empty values are dropped.
    pub async fn get_with<T, Q>(&self, path: &str, params: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let query = query_pairs(params)?;
        self.send_json(Method::GET, path, &query, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        self.send_json(Method::POST, path, &[], Some(body)).await
    }

    /// POST with no request body (pipeline triggers).
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(Method::POST, path, &[], None).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = encode_body(body)?;
        self.send_json(Method::PUT, path, &[], Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(Method::DELETE, path, &[], None).await
    }

    // ═══════════════════════════════════════════════════════════
    // Files
    // ═══════════════════════════════════════════════════════════

    /// Upload local files as multipart form data, one part per file under
    /// the `files` field. The content type is guessed from the extension.
    pub async fn upload<T, P>(&self, path: &str, files: &[P]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let mut form = Form::new();
        for file in files {
            let file = file.as_ref();
            let bytes = tokio::fs::read(file).await?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| ApiError::Rejected(format!("Not a file: {}", file.display())))?;
            let mime = mime_guess::from_path(file).first_or_octet_stream();
            let part = Part::bytes(bytes)
                .file_name(name)
                .mime_str(mime.essence_str())?;
            form = form.part(UPLOAD_FIELD, part);
        }

        tracing::debug!(path, count = files.len(), "Uploading files");
        let builder = self.authorized(Method::POST, path)?.multipart(form);
        let response = self.execute(builder, path).await?;
        decode_envelope(response).await
    }

    /// Fetch a binary body (generated workbook) into memory.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let builder = self.authorized(Method::GET, path)?;
        let response = self.execute(builder, path).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Stream a binary body to `dest`, returning the number of bytes written.
    pub async fn download_to(&self, path: &str, dest: &Path) -> Result<u64, ApiError> {
        let builder = self.authorized(Method::GET, path)?;
        let response = self.execute(builder, path).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(dest = %dest.display(), bytes = written, "Download saved");
        Ok(written)
    }

    // ═══════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════

    /// Request builder with the bearer header. Fails locally with 401 when
    /// there is no token, before anything touches the network.
    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let token = self
            .tokens
            .access_token()
            .ok_or_else(ApiError::not_authenticated)?;
        Ok(self
            .http
            .request(method, self.config.endpoint(path))
            .bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let mut builder = self
            .authorized(method.clone(), path)?
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        tracing::debug!(method = %method, path, "API request");
        let response = self.execute(builder, path).await?;
        decode_envelope(response).await
    }

    async fn execute(&self, builder: RequestBuilder, path: &str) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let err = ApiError::from_response(status.as_u16(), status.canonical_reason(), &body);
        tracing::warn!(path, status = status.as_u16(), error = %err.message(), "API request failed");
        Err(err)
    }
}

/// Unwrap `{data, error}`. A 204 or an empty body decodes `T` from `null`,
/// which fits `()` and `Option<_>` results.
async fn decode_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status == StatusCode::NO_CONTENT || bytes.is_empty() {
        return serde_json::from_value(Value::Null).map_err(|e| ApiError::Decode(e.to_string()));
    }

    let mut envelope: Value =
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))?;

    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERIC_MESSAGE)
            .to_string();
        let code = error.get("code").and_then(Value::as_str).map(str::to_string);
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
            code,
        });
    }

    let data = envelope
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Rejected(format!("Invalid request body: {e}")))
}

/// Flatten a parameter struct into query pairs, skipping `null` and empty
/// strings. Pairs come out sorted by key.
pub fn query_pairs<Q: Serialize + ?Sized>(params: &Q) -> Result<Vec<(String, String)>, ApiError> {
    let value = serde_json::to_value(params)
        .map_err(|e| ApiError::Rejected(format!("Invalid query parameters: {e}")))?;
    let Value::Object(map) = value else {
        return Ok(Vec::new());
    };

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) if s.is_empty() => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{envelope, MockBackend};
    use crate::session::{Session, SessionStore};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: String,
    }

    fn client_for(backend: &MockBackend, token: Option<&str>) -> ApiClient {
        let store = match token {
            Some(t) => SessionStore::with_session(Session::from_token(t)),
            None => SessionStore::new(),
        };
        ApiClient::new(ApiConfig::new(&backend.url()), Arc::new(store)).unwrap()
    }

    #[tokio::test]
    async fn missing_token_fails_locally_with_401() {
        let backend = MockBackend::start(Router::new()).await;
        let client = client_for(&backend, None);

        let err = client.get::<Value>("/clients").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.message(), "Not authenticated. Please sign in.");
        assert_eq!(backend.hits(), 0);
    }

    #[tokio::test]
    async fn sends_bearer_and_unwraps_data() {
        let router = Router::new().route(
            "/api/v1/things/abc",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(envelope(json!({ "id": auth })))
            }),
        );
        let backend = MockBackend::start(router).await;
        let client = client_for(&backend, Some("tok-123"));

        let thing: Thing = client.get("/things/abc").await.unwrap();
        assert_eq!(thing.id, "Bearer tok-123");
    }

    #[tokio::test]
    async fn non_2xx_carries_status_message_and_code() {
        let router = Router::new().route(
            "/api/v1/things/missing",
            get(|| async {
                (
                    AxumStatus::NOT_FOUND,
                    Json(json!({"data": null, "error": {"message": "Thing not found", "code": "NOT_FOUND"}})),
                )
            }),
        );
        let backend = MockBackend::start(router).await;
        let client = client_for(&backend, Some("t"));

        let err = client.get::<Thing>("/things/missing").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "Thing not found");
        assert_eq!(err.code(), Some("NOT_FOUND"));
    }

    #[tokio::test]
    async fn non_json_error_body_uses_status_text() {
        let router = Router::new().route(
            "/api/v1/boom",
            get(|| async { (AxumStatus::BAD_GATEWAY, "<html>upstream down</html>") }),
        );
        let backend = MockBackend::start(router).await;
        let client = client_for(&backend, Some("t"));

        let err = client.get::<Value>("/boom").await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.message(), "Bad Gateway");
    }

    #[tokio::test]
    async fn no_content_yields_unit() {
        let router = Router::new().route(
            "/api/v1/things/abc",
            delete(|| async { AxumStatus::NO_CONTENT }),
        );
        let backend = MockBackend::start(router).await;
        let client = client_for(&backend, Some("t"));

        let () = client.delete("/things/abc").await.unwrap();
    }

    #[tokio::test]
    async fn post_sends_json_body() {
        let router = Router::new().route(
            "/api/v1/echo",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                let ct = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(envelope(json!({ "id": format!("{}|{}", ct, body["name"]) })))
            }),
        );
        let backend = MockBackend::start(router).await;
        let client = client_for(&backend, Some("t"));

        let thing: Thing = client.post("/echo", &json!({"name": "Acme"})).await.unwrap();
        assert_eq!(thing.id, r#"application/json|"Acme""#);
    }

    #[tokio::test]
    async fn connection_refused_maps_to_connection_error() {
        let store = SessionStore::with_session(Session::from_token("t"));
        let client =
            ApiClient::new(ApiConfig::new("http://127.0.0.1:1"), Arc::new(store)).unwrap();
        let err = client.get::<Value>("/clients").await.unwrap_err();
        assert!(matches!(err, ApiError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn download_streams_to_file() {
        let router = Router::new().route(
            "/api/v1/projects/p1/download",
            get(|| async { vec![0x50u8, 0x4b, 0x03, 0x04, 0xff] }),
        );
        let backend = MockBackend::start(router).await;
        let client = client_for(&backend, Some("t"));

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("CMA_Report.xlsx");
        let written = client
            .download_to("/projects/p1/download", &dest)
            .await
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![0x50, 0x4b, 0x03, 0x04, 0xff]);

        let bytes = client.download("/projects/p1/download").await.unwrap();
        assert_eq!(bytes.len(), 5);
    }

    #[tokio::test]
    async fn upload_sends_multipart_files_field() {
        let captured = Arc::new(std::sync::Mutex::new(None::<(String, String)>));
        let sink = captured.clone();
        let router = Router::new().route(
            "/api/v1/projects/p1/files",
            post(move |headers: HeaderMap, body: axum::body::Bytes| {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                *sink.lock().unwrap() = Some((content_type, String::from_utf8_lossy(&body).into_owned()));
                async { Json(envelope(json!([{"id": "f1"}, {"id": "f2"}]))) }
            }),
        );
        let backend = MockBackend::start(router).await;
        let client = client_for(&backend, Some("t"));

        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("bs.pdf");
        let csv = dir.path().join("ledger.csv");
        std::fs::write(&pdf, b"%PDF-1.4 balance sheet").unwrap();
        std::fs::write(&csv, b"item,amount\nsales,100\n").unwrap();

        let uploaded: Vec<Thing> = client
            .upload("/projects/p1/files", &[&pdf, &csv])
            .await
            .unwrap();
        assert_eq!(uploaded.len(), 2);

        let (content_type, body) = captured.lock().unwrap().take().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="), "{content_type}");
        assert!(!content_type.contains("application/json"));
        assert!(body.contains(r#"Content-Disposition: form-data; name="files"; filename="bs.pdf""#));
        assert!(body.contains("Content-Type: application/pdf"));
        assert!(body.contains(r#"name="files"; filename="ledger.csv""#));
        assert!(body.contains("Content-Type: text/csv"));
        assert!(body.contains("%PDF-1.4 balance sheet"));
    }

    #[tokio::test]
    async fn upload_of_missing_file_fails_before_sending() {
        let backend = MockBackend::start(Router::new()).await;
        let client = client_for(&backend, Some("t"));
        let dir = tempfile::tempdir().unwrap();

        let err = client
            .upload::<Value, _>("/projects/p1/files", &[dir.path().join("absent.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Io(_)), "got {err:?}");
        assert_eq!(backend.hits(), 0);
    }

    #[derive(Serialize)]
    struct Params {
        search: Option<String>,
        entity_type: String,
        page: Option<u32>,
        active: bool,
    }

    #[test]
    fn query_pairs_skip_absent_and_empty() {
        let params = Params {
            search: None,
            entity_type: String::new(),
            page: Some(2),
            active: true,
        };
        assert_eq!(
            query_pairs(&params).unwrap(),
            vec![
                ("active".to_string(), "true".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }
}
