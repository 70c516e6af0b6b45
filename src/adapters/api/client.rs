use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::dto::ErrorBody;
use crate::ports::{RepositoryError, RepositoryResult};

pub struct ApiClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> RepositoryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("agora-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepositoryError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_base(base_url),
            api_token,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> RepositoryResult<T> {
        let response = self.send(self.client.get(self.url(path))).await?;
        let body = self.check(response).await?;
        parse(&body)
    }

    pub async fn post<T: DeserializeOwned, R: serde::Serialize>(
        &self,
        path: &str,
        body: &R,
    ) -> RepositoryResult<T> {
        let response = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        let body = self.check(response).await?;
        parse(&body)
    }

    /// POST where only success matters; any response body is ignored.
    pub async fn post_unit<R: serde::Serialize>(&self, path: &str, body: &R) -> RepositoryResult<()> {
        let response = self
            .send(self.client.post(self.url(path)).json(body))
            .await?;
        self.check(response).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str) -> RepositoryResult<()> {
        let response = self.send(self.client.delete(self.url(path))).await?;
        self.check(response).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> RepositoryResult<Response> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        request
            .send()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))
    }

    /// Returns the body text of a 2xx response, or the mapped error.
    async fn check(&self, response: Response) -> RepositoryResult<String> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let text = response
            .text()
            .await
            .map_err(|e| RepositoryError::Network(e.to_string()))?;
        tracing::debug!("API {} response: {}", status, text);

        if status.is_success() {
            Ok(text)
        } else {
            Err(map_status(status, &text, retry_after))
        }
    }
}

fn normalize_base(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    format!("{trimmed}/")
}

fn parse<T: DeserializeOwned>(body: &str) -> RepositoryResult<T> {
    serde_json::from_str(body).map_err(|e| {
        RepositoryError::Serialization(format!(
            "Failed to parse response: {}. Response was: {}",
            e, body
        ))
    })
}

/// The `detail` field of an error body, when the server sent JSON with one.
fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
}

pub(crate) fn map_status(status: StatusCode, body: &str, retry_after: u64) -> RepositoryError {
    let detail = error_detail(body);
    match status.as_u16() {
        401 => RepositoryError::Authentication(detail),
        403 => RepositoryError::Forbidden(detail),
        404 => RepositoryError::NotFound(detail),
        429 => RepositoryError::RateLimit(retry_after),
        code => RepositoryError::Api {
            status: code,
            detail,
        },
    }
}
