//! Invoice creation endpoints and the processor webhook.

use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use super::auth::AuthAccount;
use super::types::{ApiResponse, TopUpInvoiceRequest};
use super::{ApiError, AppState};
use crate::api::validation::validate_token_amount;
use crate::services::billing::CreatedInvoice;
use crate::services::reconciler::{ReconcileOutcome, WebhookEvent};

pub async fn create_topup_invoice(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
    Json(body): Json<TopUpInvoiceRequest>,
) -> Result<Json<ApiResponse<CreatedInvoice>>, ApiError> {
    let tokens = validate_token_amount(body.tokens)?;
    let invoice = state
        .shared
        .billing
        .create_topup_invoice(account_id, tokens)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

pub async fn create_subscription_invoice(
    State(state): State<Arc<AppState>>,
    Extension(AuthAccount(account_id)): Extension<AuthAccount>,
) -> Result<Json<ApiResponse<CreatedInvoice>>, ApiError> {
    let invoice = state
        .shared
        .billing
        .create_subscription_invoice(account_id)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

/// Processor deliveries are retried until acknowledged, so every business
/// outcome returns 2xx. Only a body that fails to deserialize is rejected,
/// and that happens in the `Json` extractor before this handler runs.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(event): Json<WebhookEvent>,
) -> Json<ApiResponse<&'static str>> {
    match state.shared.reconciler.apply(&event).await {
        Ok(ReconcileOutcome::Applied) => Json(ApiResponse::success("applied")),
        Ok(ReconcileOutcome::Duplicate) => Json(ApiResponse::success("duplicate")),
        Ok(ReconcileOutcome::Ignored) => Json(ApiResponse::success("ignored")),
        Ok(ReconcileOutcome::Malformed) => Json(ApiResponse::success("malformed")),
        Err(err) => {
            // Acknowledge anyway; the claim was released (or never made),
            // so the processor's retry will be applied cleanly.
            tracing::error!(reference = %event.reference, %err, "Webhook processing failed");
            Json(ApiResponse::success("deferred"))
        }
    }
}
