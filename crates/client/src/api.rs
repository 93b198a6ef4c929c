use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use slotlock_common::{
    AcquireRequest, ErrorBody, InspectRequest, LeaseRecord, LockResponse, ReleaseRequest,
    RenewRequest, TimeResponse,
};
use std::time::{Duration, Instant};
use tokio::time::sleep;

const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_CAP_MS: u64 = 5_000;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{}: {}", .0.error, .0.message)]
    Rejected(ErrorBody),
    #[error("unexpected response status {0}")]
    UnexpectedStatus(StatusCode),
}

/// Thin typed wrapper over the coordinator's HTTP API.
#[derive(Clone)]
pub struct LockClient {
    http: Client,
    base_url: String,
}

impl LockClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn acquire(&self, resource_id: &str, owner_id: &str, ttl_seconds: i64) -> Result<LockResponse, ClientError> {
        let req = AcquireRequest {
            resource_id: resource_id.to_string(),
            owner_id: owner_id.to_string(),
            ttl_seconds,
        };
        self.post("/acquire", &req).await
    }

    /// Acquires, retrying on CONFLICT with exponential backoff and full
    /// jitter until `wait` has elapsed. Returns the last response.
    pub async fn acquire_with_wait(
        &self,
        resource_id: &str,
        owner_id: &str,
        ttl_seconds: i64,
        wait: Duration,
    ) -> Result<LockResponse, ClientError> {
        let deadline = Instant::now() + wait;
        let mut attempt = 0;
        loop {
            let resp = self.acquire(resource_id, owner_id, ttl_seconds).await?;
            if !matches!(resp, LockResponse::Conflict { .. }) {
                return Ok(resp);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(resp);
            }
            let delay = backoff_delay(attempt, &mut rand::thread_rng()).min(remaining);
            sleep(delay).await;
            attempt += 1;
        }
    }

    pub async fn renew(&self, resource_id: &str, owner_id: &str, ttl_seconds: i64) -> Result<LockResponse, ClientError> {
        let req = RenewRequest {
            resource_id: resource_id.to_string(),
            owner_id: owner_id.to_string(),
            ttl_seconds,
        };
        self.post("/renew", &req).await
    }

    pub async fn release(&self, resource_id: &str, owner_id: &str) -> Result<LockResponse, ClientError> {
        let req = ReleaseRequest {
            resource_id: resource_id.to_string(),
            owner_id: owner_id.to_string(),
        };
        self.post("/release", &req).await
    }

    pub async fn inspect(&self, resource_id: &str) -> Result<LockResponse, ClientError> {
        let req = InspectRequest {
            resource_id: resource_id.to_string(),
        };
        self.post("/inspect", &req).await
    }

    pub async fn list(&self) -> Result<Vec<LeaseRecord>, ClientError> {
        self.get("/list").await
    }

    pub async fn time(&self) -> Result<TimeResponse, ClientError> {
        self.get("/time").await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.http.get(format!("{}{}", self.base_url, path)).send().await?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    match resp.status() {
        StatusCode::BAD_REQUEST => Err(ClientError::Rejected(resp.json().await?)),
        StatusCode::OK | StatusCode::CONFLICT | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
            Ok(resp.json().await?)
        }
        other => Err(ClientError::UnexpectedStatus(other)),
    }
}

/// Full-jitter backoff: uniform in `[0, min(cap, base * 2^attempt)]`.
pub fn backoff_delay<R: Rng>(attempt: u32, rng: &mut R) -> Duration {
    let ceiling = BACKOFF_BASE_MS
        .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
        .min(BACKOFF_CAP_MS);
    Duration::from_millis(rng.gen_range(0..=ceiling))
}
