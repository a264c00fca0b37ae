//! Scaleway REST client
//!
//! Direct Scaleway API implementation. Authenticates with the secret key in
//! the `X-Auth-Token` header and maps HTTP failures onto [`CloudError`].

use reqwest::{Method, StatusCode};
use scwflow_cloud::{CloudError, Result};
use scwflow_config::ProviderConfig;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const AUTH_HEADER: &str = "X-Auth-Token";
const PAGE_SIZE: usize = 100;

/// Shared HTTP client, safe for concurrent use.
#[derive(Clone)]
pub struct ScalewayClient {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
    project_id: Option<String>,
}

impl std::fmt::Debug for ScalewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalewayClient")
            .field("api_url", &self.api_url)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ScalewayClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scwflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            api_url: config.api_url().trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone().unwrap_or_default(),
            project_id: config.project_id.clone(),
        })
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let url = format!("{}{}", self.api_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(AUTH_HEADER, &self.secret_key);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(transport)?;

        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(map_status(status, &text, &url));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.send(Method::GET, path, None).await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let value = self.send(Method::POST, path, Some(&body)).await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let value = self.send(Method::PATCH, path, Some(&body)).await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let value = self.send(Method::PUT, path, Some(&body)).await?;
        Ok(serde_json::from_value(value.unwrap_or(Value::Null))?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Fetches every page of a list call. `path` may already carry a query.
    pub async fn list<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>> {
        let sep = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let url = format!("{}{}page={}&page_size={}", path, sep, page, PAGE_SIZE);
            let mut body: Value = self.get(&url).await?;
            let batch: Vec<T> = match body.get_mut(key) {
                Some(v) => serde_json::from_value(v.take())?,
                None => Vec::new(),
            };
            let total = body.get("total_count").and_then(Value::as_u64);
            let fetched = batch.len();
            items.extend(batch);
            let done = fetched < PAGE_SIZE || total.is_some_and(|t| items.len() as u64 >= t);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

fn transport(e: reqwest::Error) -> CloudError {
    CloudError::Transport(e.to_string())
}

/// Maps a failed HTTP response onto the error taxonomy, keeping the
/// server's message as is.
pub fn map_status(status: StatusCode, body: &str, url: &str) -> CloudError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        format!("{} {}", status, url)
    } else {
        message
    };

    match status.as_u16() {
        404 | 410 => CloudError::NotFound(message),
        409 | 412 => CloudError::Conflict(message),
        401 | 403 => CloudError::Unauthorized(message),
        400 | 422 => CloudError::validation(field_of(body).unwrap_or_default(), message),
        _ => CloudError::Transport(format!("{}: {}", status, message)),
    }
}

/// First invalid field reported by an `invalid_arguments` error body.
fn field_of(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("details")?
        .as_array()?
        .first()?
        .get("argument_name")?
        .as_str()
        .map(str::to_string)
}
