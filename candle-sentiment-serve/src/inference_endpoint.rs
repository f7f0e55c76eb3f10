use tokio::sync::oneshot;

use crate::{
    responses::ErrorResponse,
    workers::{InferenceState, InferenceTask},
};

/// Sends `req` to the inference workers and waits for the response.
pub(crate) async fn inference<I, O>(state: &InferenceState<I, O>, req: I) -> Result<O, ErrorResponse> {
    let (resp_tx, resp_rx) = oneshot::channel();
    let task = InferenceTask { req, resp_tx };

    if let Err(e) = state.tx.send(task).await {
        tracing::error!("Failed to send task to worker: {}", e);
        return Err(ErrorResponse::internal());
    }

    resp_rx.await.map_err(|e| {
        tracing::error!("Failed to receive response from worker: {}", e);
        ErrorResponse::internal()
    })
}
