use crate::error::LeaseError;
use crate::manager::{AcquireOutcome, LeaseManager, ReleaseOutcome, RenewOutcome};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use slotlock_common::{
    AcquireRequest, ErrorBody, HealthResponse, InspectRequest, LeaseRecord, LockResponse,
    ReleaseRequest, RenewRequest, TimeResponse,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LeaseManager>,
}

impl IntoResponse for LeaseError {
    fn into_response(self) -> Response {
        match self {
            LeaseError::InvalidInput(message) => invalid_input(message),
        }
    }
}

fn invalid_input(message: String) -> Response {
    warn!(%message, "Rejected invalid lock request");
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: "INVALID_INPUT".to_string(),
            message,
        }),
    )
        .into_response()
}

fn reply(status: StatusCode, body: LockResponse) -> Response {
    (status, Json(body)).into_response()
}

pub async fn acquire(
    State(state): State<AppState>,
    payload: Result<Json<AcquireRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_input(rejection.body_text()),
    };

    match state.manager.acquire(&req.resource_id, &req.owner_id, req.ttl_seconds) {
        Ok(AcquireOutcome::Granted(lease)) => {
            info!(resource_id = %lease.resource_id, owner_id = %lease.owner_id, ttl_seconds = lease.ttl_seconds, "Lock acquired");
            reply(
                StatusCode::OK,
                LockResponse::Locked {
                    resource_id: lease.resource_id,
                    owner_id: None,
                    acquired_at: lease.acquired_at,
                    ttl_seconds: lease.ttl_seconds,
                },
            )
        }
        Ok(AcquireOutcome::Conflict(holder)) => {
            info!(resource_id = %holder.resource_id, owner_id = %req.owner_id, holder = %holder.owner_id, "Lock conflict");
            reply(
                StatusCode::CONFLICT,
                LockResponse::Conflict {
                    resource_id: holder.resource_id,
                    owner_id: holder.owner_id,
                    acquired_at: holder.acquired_at,
                },
            )
        }
        Err(e) => e.into_response(),
    }
}

pub async fn renew(
    State(state): State<AppState>,
    payload: Result<Json<RenewRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_input(rejection.body_text()),
    };

    match state.manager.renew(&req.resource_id, &req.owner_id, req.ttl_seconds) {
        Ok(RenewOutcome::Renewed(lease)) => {
            info!(resource_id = %lease.resource_id, owner_id = %lease.owner_id, ttl_seconds = lease.ttl_seconds, "Lock renewed");
            reply(
                StatusCode::OK,
                LockResponse::Renewed {
                    resource_id: lease.resource_id,
                    acquired_at: lease.acquired_at,
                    ttl_seconds: lease.ttl_seconds,
                },
            )
        }
        Ok(RenewOutcome::NotOwner) => {
            warn!(resource_id = %req.resource_id, owner_id = %req.owner_id, "Renew refused: not owner");
            reply(StatusCode::FORBIDDEN, LockResponse::Forbidden { resource_id: req.resource_id })
        }
        Ok(RenewOutcome::NotFound) => {
            info!(resource_id = %req.resource_id, owner_id = %req.owner_id, "Renew of missing lock");
            reply(StatusCode::NOT_FOUND, LockResponse::NotFound { resource_id: req.resource_id })
        }
        Err(e) => e.into_response(),
    }
}

pub async fn release(
    State(state): State<AppState>,
    payload: Result<Json<ReleaseRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_input(rejection.body_text()),
    };

    match state.manager.release(&req.resource_id, &req.owner_id) {
        Ok(ReleaseOutcome::Released) => {
            info!(resource_id = %req.resource_id, owner_id = %req.owner_id, "Lock released");
            reply(StatusCode::OK, LockResponse::Released { resource_id: req.resource_id })
        }
        Ok(ReleaseOutcome::NotOwner) => {
            warn!(resource_id = %req.resource_id, owner_id = %req.owner_id, "Release refused: not owner");
            reply(StatusCode::FORBIDDEN, LockResponse::Forbidden { resource_id: req.resource_id })
        }
        // Releasing something already gone is a no-op for the caller.
        Ok(ReleaseOutcome::NotFound) => {
            reply(StatusCode::OK, LockResponse::NotFound { resource_id: req.resource_id })
        }
        Err(e) => e.into_response(),
    }
}

pub async fn inspect(
    State(state): State<AppState>,
    payload: Result<Json<InspectRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(req)) => inspect_reply(&state.manager, req.resource_id),
        Err(rejection) => invalid_input(rejection.body_text()),
    }
}

pub async fn inspect_path(State(state): State<AppState>, Path(resource_id): Path<String>) -> Response {
    inspect_reply(&state.manager, resource_id)
}

fn inspect_reply(manager: &LeaseManager, resource_id: String) -> Response {
    match manager.inspect(&resource_id) {
        Ok(Some(lease)) => reply(
            StatusCode::OK,
            LockResponse::Locked {
                resource_id: lease.resource_id,
                owner_id: Some(lease.owner_id),
                acquired_at: lease.acquired_at,
                ttl_seconds: lease.ttl_seconds,
            },
        ),
        Ok(None) => reply(StatusCode::OK, LockResponse::Free { resource_id }),
        Err(e) => e.into_response(),
    }
}

pub async fn list_locks(State(state): State<AppState>) -> Json<Vec<LeaseRecord>> {
    Json(state.manager.list())
}

pub async fn server_time(State(state): State<AppState>) -> Json<TimeResponse> {
    let now = state.manager.now();
    Json(TimeResponse {
        server_time_utc: now,
        server_unix_ms: now.timestamp_millis(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        live_leases: state.manager.list().len(),
    })
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::manager::LeaseManager;
    use crate::server::router;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use chrono::{TimeDelta, TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const SLOT: &str = "hubble-acad_2025-12-01T03:00:00Z";

    fn app() -> (Arc<ManualClock>, Router) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 11, 30, 12, 0, 0).unwrap() + TimeDelta::milliseconds(123),
        ));
        let manager = Arc::new(LeaseManager::new(clock.clone()));
        (clock, router(manager))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        call(app, Method::POST, uri, Some(body)).await
    }

    #[tokio::test]
    async fn acquire_then_conflict() {
        let (_, app) = app();

        let (status, body) = post(&app, "/acquire", json!({"resource_id": SLOT, "owner_id": "svc-1", "ttl_seconds": 30})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "LOCKED", "resource_id": SLOT, "acquired_at": "2025-11-30T12:00:00.123Z", "ttl_seconds": 30})
        );

        let (status, body) = post(&app, "/acquire", json!({"resource_id": SLOT, "owner_id": "svc-2", "ttl_seconds": 30})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body,
            json!({"status": "CONFLICT", "resource_id": SLOT, "owner_id": "svc-1", "acquired_at": "2025-11-30T12:00:00.123Z"})
        );
    }

    #[tokio::test]
    async fn invalid_acquire_bodies_are_rejected() {
        let (_, app) = app();

        for body in [
            json!({"resource_id": SLOT, "owner_id": "svc-1", "ttl_seconds": 0}),
            json!({"resource_id": SLOT, "owner_id": "svc-1", "ttl_seconds": -3}),
            json!({"resource_id": SLOT, "owner_id": "svc-1", "ttl_seconds": "thirty"}),
            json!({"resource_id": SLOT, "owner_id": "svc-1"}),
            json!({"owner_id": "svc-1", "ttl_seconds": 30}),
            json!({"resource_id": SLOT, "owner_id": "", "ttl_seconds": 30}),
        ] {
            let (status, body) = post(&app, "/acquire", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "INVALID_INPUT");
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        }

        let response = app
            .clone()
            .oneshot(Request::post("/acquire").body(Body::from("not json")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn renew_maps_outcomes() {
        let (clock, app) = app();
        post(&app, "/acquire", json!({"resource_id": SLOT, "owner_id": "svc-1", "ttl_seconds": 5})).await;
        clock.advance(TimeDelta::seconds(2));

        let (status, body) = post(&app, "/renew", json!({"resource_id": SLOT, "owner_id": "svc-1", "ttl_seconds": 30})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "RENEWED");
        assert_eq!(body["acquired_at"], "2025-11-30T12:00:02.123Z");
        assert_eq!(body["ttl_seconds"], 30);

        let (status, body) = post(&app, "/renew", json!({"resource_id": SLOT, "owner_id": "svc-2", "ttl_seconds": 30})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({"status": "FORBIDDEN", "resource_id": SLOT}));

        let (status, body) = post(&app, "/renew", json!({"resource_id": "ghost", "owner_id": "svc-1", "ttl_seconds": 30})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"status": "NOT_FOUND", "resource_id": "ghost"}));
    }

    #[tokio::test]
    async fn release_then_inspect_is_free() {
        let (_, app) = app();
        post(&app, "/acquire", json!({"resource_id": SLOT, "owner_id": "svc-1", "ttl_seconds": 30})).await;

        let (status, body) = post(&app, "/release", json!({"resource_id": SLOT, "owner_id": "svc-2"})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], "FORBIDDEN");

        let (status, body) = post(&app, "/release", json!({"resource_id": SLOT, "owner_id": "svc-1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "RELEASED", "resource_id": SLOT}));

        let (status, body) = post(&app, "/inspect", json!({"resource_id": SLOT})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "FREE", "resource_id": SLOT}));
    }

    #[tokio::test]
    async fn release_of_ghost_is_benign() {
        let (_, app) = app();
        let (status, body) = post(&app, "/release", json!({"resource_id": "ghost", "owner_id": "svc-1"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "NOT_FOUND", "resource_id": "ghost"}));
    }

    #[tokio::test]
    async fn inspect_reports_holder_until_expiry() {
        let (clock, app) = app();
        post(&app, "/acquire", json!({"resource_id": "slot-a", "owner_id": "svc-1", "ttl_seconds": 1})).await;

        let (_, body) = call(&app, Method::GET, "/locks/slot-a", None).await;
        assert_eq!(
            body,
            json!({"status": "LOCKED", "resource_id": "slot-a", "owner_id": "svc-1", "acquired_at": "2025-11-30T12:00:00.123Z", "ttl_seconds": 1})
        );

        clock.advance(TimeDelta::seconds(1));
        let (_, body) = call(&app, Method::GET, "/locks/slot-a", None).await;
        assert_eq!(body["status"], "FREE");
    }

    #[tokio::test]
    async fn list_excludes_expired_and_is_ordered() {
        let (clock, app) = app();
        post(&app, "/acquire", json!({"resource_id": "slot-c", "owner_id": "svc-1", "ttl_seconds": 60})).await;
        post(&app, "/acquire", json!({"resource_id": "slot-b", "owner_id": "svc-2", "ttl_seconds": 1})).await;
        post(&app, "/acquire", json!({"resource_id": "slot-a", "owner_id": "svc-3", "ttl_seconds": 60})).await;
        clock.advance(TimeDelta::seconds(2));

        let (status, body) = call(&app, Method::GET, "/list", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|lease| lease["resource_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["slot-a", "slot-c"]);

        let (_, health) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(health, json!({"status": "ok", "live_leases": 2}));
    }

    #[tokio::test]
    async fn time_reports_coordinator_clock() {
        let (_, app) = app();
        let (status, body) = call(&app, Method::GET, "/time", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["server_time_utc"], "2025-11-30T12:00:00.123Z");
        assert_eq!(body["server_unix_ms"], 1_764_504_000_123_i64);
    }

    #[tokio::test]
    async fn request_id_is_echoed_or_generated() {
        let (_, app) = app();

        let response = app
            .clone()
            .oneshot(Request::get("/health").header("x-request-id", "req-abc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "req-abc");

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let generated = response.headers()["x-request-id"].to_str().unwrap();
        assert!(generated.starts_with("req-"));
    }
}
