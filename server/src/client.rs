//! Typed HTTP client for the license service.

use crate::api::{
    BatchRequest, BatchResponse, CheckResponse, CodeRequest, GenerateResponse, ListRequest,
    ListResponse, MessageResponse, StatsResponse, StatusResponse, VerifyRequest, VerifyResponse,
};
use crate::error::ErrorResponse;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("admin key required (use --admin-key or ONECODE_ADMIN_KEY)")]
    MissingAdminKey,

    /// The server could not be reached.
    #[error("server unreachable: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered with an error body.
    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("activation cache: {0}")]
    Cache(#[from] onecode_license::LicenseError),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Client for the license service endpoints.
#[derive(Clone)]
pub struct AdminClient {
    http: Client,
    base: Url,
    admin_key: Option<String>,
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("base", &self.base.as_str())
            .field("admin_key", &self.admin_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AdminClient {
    pub fn new(base: &str, admin_key: Option<String>) -> ClientResult<Self> {
        let base = Url::parse(base).map_err(|e| ClientError::InvalidUrl(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base,
            admin_key: admin_key.filter(|k| !k.is_empty()),
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn admin_key(&self) -> ClientResult<String> {
        self.admin_key.clone().ok_or(ClientError::MissingAdminKey)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
        let resp = request.send().await.map_err(ClientError::Network)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(ClientError::Network)?;

        if !status.is_success() {
            return Err(match serde_json::from_slice::<ErrorResponse>(&bytes) {
                Ok(body) => ClientError::Api {
                    status: status.as_u16(),
                    code: body.code,
                    message: body.error,
                },
                Err(_) => ClientError::Api {
                    status: status.as_u16(),
                    code: "HTTP".to_string(),
                    message: String::from_utf8_lossy(&bytes).into_owned(),
                },
            });
        }
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &[&str], body: &B) -> ClientResult<T> {
        Self::send(self.http.post(self.url(path)).json(body)).await
    }

    pub async fn status(&self) -> ClientResult<StatusResponse> {
        Self::send(self.http.get(self.url(&[]))).await
    }

    pub async fn generate(&self, seed: &str) -> ClientResult<GenerateResponse> {
        Self::send(self.http.get(self.url(&["gen", seed]))).await
    }

    pub async fn batch(&self, count: u32) -> ClientResult<BatchResponse> {
        let body = BatchRequest {
            count: Some(count),
            admin_key: Some(self.admin_key()?),
        };
        self.post(&["gen", "batch"], &body).await
    }

    pub async fn verify(&self, code: &str, machine_id: &str) -> ClientResult<VerifyResponse> {
        let body = VerifyRequest {
            code: Some(code.to_string()),
            machine_id: Some(machine_id.to_string()),
        };
        self.post(&["verify"], &body).await
    }

    fn code_request(&self, code: &str) -> ClientResult<CodeRequest> {
        Ok(CodeRequest {
            code: Some(code.to_string()),
            admin_key: Some(self.admin_key()?),
        })
    }

    pub async fn unbind(&self, code: &str) -> ClientResult<MessageResponse> {
        self.post(&["unbind"], &self.code_request(code)?).await
    }

    pub async fn check(&self, code: &str) -> ClientResult<CheckResponse> {
        self.post(&["admin", "check"], &self.code_request(code)?).await
    }

    pub async fn delete(&self, code: &str) -> ClientResult<MessageResponse> {
        self.post(&["admin", "delete"], &self.code_request(code)?).await
    }

    pub async fn list(&self, page: u32, limit: u32) -> ClientResult<ListResponse> {
        let body = ListRequest {
            admin_key: Some(self.admin_key()?),
            page: Some(page),
            limit: Some(limit),
        };
        self.post(&["admin", "list"], &body).await
    }

    pub async fn stats(&self) -> ClientResult<StatsResponse> {
        Self::send(self.http.get(self.url(&["stats"]))).await
    }
}
