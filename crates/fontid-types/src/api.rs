use serde::{Deserialize, Serialize};

use crate::models::Plan;

// -- Token Claims --

/// Bearer token claims. No `exp`; sessions are never expired server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupResponse {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub plan: String,
    pub token: String,
}

// -- Plans & Billing --

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanInfo {
    pub plan: Plan,
    pub monthly_price_cents: u32,
    pub description: String,
}

impl From<Plan> for PlanInfo {
    fn from(plan: Plan) -> Self {
        Self {
            plan,
            monthly_price_cents: plan.monthly_price_cents(),
            description: plan.description().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    MasterCard,
    AirtelMoney,
    MtnMobileMoney,
    PayPal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    pub plan: String,
    pub method: PaymentMethod,
    pub card_number: String,
    pub expiry: String,
    pub cvv: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub plan: String,
    pub transaction_id: String,
    pub amount_cents: u32,
}

// -- Prediction --

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub font: String,
    pub confidence: f32,
}

// -- Recordings --

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RecordingEntry {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
