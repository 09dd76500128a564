// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use lmp_core::{
    context::memory::InMemoryContext,
    contract::RevertReason,
    orchestrator::{ClaimOutcome, Orchestrator},
    Error,
};
use lmp_voucher::Receipt;
use log::info;
use prometheus::{register_int_counter, IntCounter};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, signal, task::JoinHandle};

// Register the metrics into the global metrics registry.
lazy_static! {
    static ref ISSUANCE_SUCCESS_COUNTER: IntCounter = register_int_counter!(
        "voucher_issuance_success_count",
        "Number of successfully issued vouchers."
    )
    .unwrap();
    static ref ISSUANCE_FAILURE_COUNTER: IntCounter = register_int_counter!(
        "voucher_issuance_failure_count",
        "Number of failed voucher issuance requests (for any reason)."
    )
    .unwrap();
    static ref CLAIM_CONFIRMED_COUNTER: IntCounter = register_int_counter!(
        "claim_confirmed_count",
        "Number of claims confirmed within the request timeout."
    )
    .unwrap();
    static ref CLAIM_PENDING_COUNTER: IntCounter = register_int_counter!(
        "claim_pending_count",
        "Number of claims that went pending and were left to reconciliation."
    )
    .unwrap();
    static ref CLAIM_FAILURE_COUNTER: IntCounter = register_int_counter!(
        "claim_failure_count",
        "Number of failed claim requests (for any reason)."
    )
    .unwrap();
}

/// The orchestrator flavor this service runs: in-memory adapters around the
/// simulated claim registry, custodian key in a local software wallet.
pub type AppOrchestrator = Orchestrator<InMemoryContext, PrivateKeySigner>;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<AppOrchestrator>,
    context: InMemoryContext,
}

impl AppState {
    pub fn new(orchestrator: Arc<AppOrchestrator>, context: InMemoryContext) -> Self {
        Self {
            orchestrator,
            context,
        }
    }

    pub fn context(&self) -> &InMemoryContext {
        &self.context
    }
}

#[derive(Debug, Deserialize)]
struct CreateVoucherRequest {
    receipt_id: u64,
    recipient: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    receipt_id: u64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// [`Error`] with its REST mapping.
///
/// Authorization failures all collapse to a generic 403: the response never
/// reveals which check failed.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::MissingRecipient => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ReceiptNotFound { .. } | Error::VoucherNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            Error::AlreadyIssued { .. } | Error::TokenAlreadyMinted { .. } => {
                StatusCode::CONFLICT
            }
            Error::Upstream { .. } | Error::Signing(_) => StatusCode::BAD_GATEWAY,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::ChainRevert(reason) => match reason {
                RevertReason::Paused => StatusCode::SERVICE_UNAVAILABLE,
                RevertReason::NonceAlreadyUsed { .. }
                | RevertReason::TokenAlreadyMinted { .. } => StatusCode::CONFLICT,
                _ => StatusCode::BAD_REQUEST,
            },
            Error::InvalidSystemTime { .. } | Error::AdapterError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// Authenticated caller account. Authentication itself happens upstream of
/// this service; the header carries its result.
fn caller_account(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("x-account-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| {
            ApiError(Error::Validation {
                field: "x-account-id",
                message: "missing caller account header".into(),
            })
        })
}

async fn ingest_receipt(
    State(state): State<AppState>,
    Json(receipt): Json<Receipt>,
) -> StatusCode {
    state.context.insert_receipt(receipt);
    StatusCode::CREATED
}

async fn create_voucher(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateVoucherRequest>,
) -> Result<Response, ApiError> {
    let account = caller_account(&headers)?;
    match state
        .orchestrator
        .create_voucher(request.receipt_id, request.recipient.as_deref(), &account)
        .await
    {
        Ok(issued) => {
            ISSUANCE_SUCCESS_COUNTER.inc();
            Ok(Json(issued).into_response())
        }
        Err(err) => {
            ISSUANCE_FAILURE_COUNTER.inc();
            Err(err.into())
        }
    }
}

async fn claim(
    State(state): State<AppState>,
    Json(request): Json<ClaimRequest>,
) -> Result<Response, ApiError> {
    match state.orchestrator.claim(request.receipt_id).await {
        Ok(outcome) => {
            match outcome {
                ClaimOutcome::Confirmed { .. } => CLAIM_CONFIRMED_COUNTER.inc(),
                ClaimOutcome::Pending { .. } => CLAIM_PENDING_COUNTER.inc(),
            }
            Ok(Json(outcome).into_response())
        }
        Err(err) => {
            CLAIM_FAILURE_COUNTER.inc();
            Err(err.into())
        }
    }
}

async fn nft_status(
    State(state): State<AppState>,
    Path(receipt_id): Path<u64>,
) -> Result<Response, ApiError> {
    let status = state
        .orchestrator
        .nft_status(receipt_id)
        .await?
        .ok_or(Error::VoucherNotFound { receipt_id })?;
    Ok(Json(status).into_response())
}

async fn stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.orchestrator.collection_stats().await?;
    Ok(Json(stats).into_response())
}

/// Builds the REST router over the orchestrator.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/receipts", post(ingest_receipt))
        .route("/api/v1/vouchers", post(create_voucher))
        .route("/api/v1/claims", post(claim))
        .route("/api/v1/receipts/{receipt_id}/nft", get(nft_status))
        .route("/api/v1/stats", get(stats))
        .with_state(state)
}

pub async fn run_server(
    port: u16,
    state: AppState,
) -> anyhow::Result<(JoinHandle<()>, std::net::SocketAddr)> {
    let router = api_router(state);

    let listener = TcpListener::bind(&format!("0.0.0.0:{port}")).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_handler())
            .await
        {
            log::error!("claim service error: {e}");
        }
    });

    Ok((handle, addr))
}

/// Graceful shutdown handler
async fn shutdown_handler() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
