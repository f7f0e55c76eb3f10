mod api;
mod form;

use anyhow::{ensure, Result};
use axum::{
    routing::{get, post},
    Router,
};
use candle_sentiment_pipelines::{analyze_sentiment, ModelLoader};
use minijinja::Environment;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::workers::{task_distributor, InferenceState, InferenceTask, ProcessFn};

#[derive(Clone)]
pub(crate) struct AppState {
    inference: InferenceState<String, String>,
    templates: Arc<Environment<'static>>,
}

fn process_sentiment(loader: &(dyn ModelLoader + 'static), text: String) -> String {
    analyze_sentiment(loader, &text)
}

fn load_templates() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    env.add_template("index.html", include_str!("../../templates/index.html"))?;
    Ok(env)
}

/// Builds the router serving the sentiment form and the prediction API. Requests are answered
/// by `num_workers` inference workers sharing `loader`.
pub(crate) fn router(loader: Arc<dyn ModelLoader>, num_workers: usize) -> Result<Router> {
    ensure!(num_workers > 0, "At least one inference worker is required");

    let (tx, rx) = mpsc::channel::<InferenceTask<String, String>>(32);
    tokio::spawn(task_distributor(
        rx,
        loader,
        num_workers,
        Arc::new(process_sentiment) as Arc<ProcessFn<dyn ModelLoader, String, String>>,
    ));

    let state = AppState {
        inference: InferenceState { tx },
        templates: Arc::new(load_templates()?),
    };

    Ok(Router::new()
        .route("/", get(form::index).post(form::submit))
        .route("/api/predict", post(api::predict))
        .route("/health", get(health))
        .with_state(state))
}

async fn health() -> &'static str {
    "ok"
}
