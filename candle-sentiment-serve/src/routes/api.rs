use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::{inference_endpoint::inference, responses::ErrorResponse};

/// Body of a prediction request, `{"data": ["<text>"]}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PredictRequest {
    data: Vec<String>,
}

/// Body of a prediction response, `{"data": ["<report>"]}`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct PredictResponse {
    data: Vec<String>,
}

pub(crate) async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(|e| ErrorResponse::new(e.status(), e.body_text()))?;
    let text = request.data.into_iter().next().ok_or_else(|| {
        ErrorResponse::new(
            StatusCode::BAD_REQUEST,
            "`data` must contain the text to analyze",
        )
    })?;
    let report = inference(&state.inference, text).await?;
    Ok(Json(PredictResponse { data: vec![report] }))
}
