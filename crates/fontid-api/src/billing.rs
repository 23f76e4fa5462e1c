use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use fontid_types::api::{Claims, CheckoutRequest, CheckoutResponse, PaymentMethod, PlanInfo};
use fontid_types::models::Plan;

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Please fill in all payment details.")]
    IncompleteDetails,
}

/// What the customer asked to pay for.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub username: String,
    pub plan: String,
    pub amount_cents: u32,
    pub method: PaymentMethod,
    pub card_number: String,
    pub expiry: String,
    pub cvv: String,
}

/// A request the provider has agreed to charge.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub id: Uuid,
    pub amount_cents: u32,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub transaction_id: String,
    pub amount_cents: u32,
}

/// Seam for a payment provider. Checkout authorizes, charges, and only then
/// touches the credential store.
pub trait PaymentGateway: Send + Sync {
    fn authorize(&self, request: &PaymentRequest) -> Result<Authorization, PaymentError>;
    fn charge(&self, authorization: Authorization) -> Result<Receipt, PaymentError>;
}

/// Accepts any request with every detail filled in. Moves no money.
#[derive(Debug, Default, Clone)]
pub struct MockGateway;

impl PaymentGateway for MockGateway {
    fn authorize(&self, request: &PaymentRequest) -> Result<Authorization, PaymentError> {
        let details = [&request.card_number, &request.expiry, &request.cvv];
        if details.iter().any(|d| d.trim().is_empty()) {
            return Err(PaymentError::IncompleteDetails);
        }

        Ok(Authorization {
            id: Uuid::new_v4(),
            amount_cents: request.amount_cents,
            method: request.method,
        })
    }

    fn charge(&self, authorization: Authorization) -> Result<Receipt, PaymentError> {
        info!(
            "Mock charge of {} cents via {:?}",
            authorization.amount_cents, authorization.method
        );
        Ok(Receipt {
            transaction_id: authorization.id.to_string(),
            amount_cents: authorization.amount_cents,
        })
    }
}

pub async fn list_plans() -> Json<Vec<PlanInfo>> {
    Json(Plan::ALL.into_iter().map(PlanInfo::from).collect())
}

/// POST /billing/checkout: charge, then record the new plan.
/// Plan names outside the catalog are charged nothing and stored as given.
pub async fn checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Json(req) = payload?;
    let amount_cents = req
        .plan
        .parse::<Plan>()
        .map(|p| p.monthly_price_cents())
        .unwrap_or(0);

    let request = PaymentRequest {
        username: claims.sub.clone(),
        plan: req.plan,
        amount_cents,
        method: req.method,
        card_number: req.card_number,
        expiry: req.expiry,
        cvv: req.cvv,
    };

    let authorization = state.gateway.authorize(&request)?;
    let receipt = state.gateway.charge(authorization)?;

    state.store.update_plan(&claims.sub, &request.plan)?;

    Ok(Json(CheckoutResponse {
        plan: request.plan,
        transaction_id: receipt.transaction_id,
        amount_cents: receipt.amount_cents,
    }))
}
