use axum::{Extension, Json, body::Bytes, extract::State};
use tracing::{debug, error};

use fontid_model::ModelError;
use fontid_types::api::{Claims, PredictResponse};

use crate::auth::AppState;
use crate::error::ApiError;

/// 50 MB upload limit for images.
pub const MAX_IMAGE_SIZE: usize = 50 * 1024 * 1024;

/// POST /predict: accepts raw image bytes, returns the most likely font.
pub async fn predict(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    bytes: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("No image uploaded.".into()));
    }

    debug!("{} submitted {} bytes for prediction", claims.sub, bytes.len());

    let prediction = tokio::task::spawn_blocking(move || {
        let image = image::load_from_memory(&bytes).map_err(ModelError::from)?;
        let model = state.models.load_model_and_classes()?;
        model.predict(&image, state.preprocessor.as_ref())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    Ok(Json(PredictResponse {
        font: prediction.label,
        confidence: prediction.confidence,
    }))
}
