//! HTTP/JSON adapter over [`PurgeService`].
//!
//! `POST /purge` with `{"urls": [...]}`. Acceptance errors map onto status
//! codes so callers can tell "retry later" (429) from "go elsewhere" (503).

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use warp::http::StatusCode;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use super::PurgeService;
use crate::IntakeError;
use crate::Result;
use crate::SystemError;

const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeResponse {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PurgeResponse {
    fn accepted() -> Self {
        Self {
            accepted: true,
            error: None,
        }
    }

    fn rejected(reason: impl ToString) -> Self {
        Self {
            accepted: false,
            error: Some(reason.to_string()),
        }
    }
}

pub(crate) fn status_for(e: &IntakeError) -> StatusCode {
    match e {
        IntakeError::InvalidBatch(_) => StatusCode::BAD_REQUEST,
        IntakeError::Backpressure { .. } => StatusCode::TOO_MANY_REQUESTS,
        IntakeError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        IntakeError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// The `/purge` filter. A request blocked on a full queue gives up after
/// `intake_timeout` with 504.
pub fn purge_routes(
    service: PurgeService,
    intake_timeout: Duration,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let with_service = warp::any().map(move || service.clone());

    warp::path!("purge")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_service)
        .and_then(move |req: PurgeRequest, service: PurgeService| handle_purge(req, service, intake_timeout))
        .recover(handle_rejection)
}

async fn handle_purge(
    req: PurgeRequest,
    service: PurgeService,
    intake_timeout: Duration,
) -> std::result::Result<warp::reply::Response, Rejection> {
    let cancel = CancellationToken::new();
    let result = tokio::select! {
        biased;
        r = service.submit_purge(req.urls, &cancel) => r,
        _ = sleep(intake_timeout) => {
            cancel.cancel();
            Err(IntakeError::Cancelled)
        }
    };

    let reply = match result {
        Ok(()) => warp::reply::with_status(warp::reply::json(&PurgeResponse::accepted()), StatusCode::OK),
        Err(e) => warp::reply::with_status(warp::reply::json(&PurgeResponse::rejected(&e)), status_for(&e)),
    };
    Ok(reply.into_response())
}

async fn handle_rejection(rejection: Rejection) -> std::result::Result<warp::reply::Response, Infallible> {
    let (status, reason) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = rejection.find::<warp::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("malformed purge request: {e}"))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "purge request too large".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        debug!("[http] unhandled rejection: {:?}", rejection);
        (StatusCode::BAD_REQUEST, format!("{rejection:?}"))
    };

    Ok(warp::reply::with_status(warp::reply::json(&PurgeResponse::rejected(reason)), status).into_response())
}

/// Binds the intake server and returns the bound address together with the
/// server future, which resolves once `shutdown` completes and in-flight
/// requests have been answered.
pub fn bind_http_server(
    listen_address: SocketAddr,
    service: PurgeService,
    intake_timeout: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, impl Future<Output = ()>)> {
    let routes = purge_routes(service, intake_timeout);
    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(listen_address, shutdown)
        .map_err(|e| SystemError::ServerBind {
            service: "purge intake",
            address: listen_address.to_string(),
            reason: e.to_string(),
        })?;

    info!("[http] purge intake listening on {}", addr);
    Ok((addr, server))
}
