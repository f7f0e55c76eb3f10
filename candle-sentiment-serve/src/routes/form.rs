use axum::{extract::State, http::StatusCode, response::Html, Form};
use minijinja::context;
use serde::Deserialize;

use super::AppState;
use crate::{inference_endpoint::inference, responses::ErrorResponse};

const TITLE: &str = "Sentiment Analysis";
const DESCRIPTION: &str = "Enter a piece of text and the tool returns its sentiment \
    (positive/negative) together with the confidence score.";
pub(crate) const EXAMPLES: [&str; 2] = [
    "I love this product! It's amazing.",
    "This is the worst experience I've ever had.",
];

#[derive(Debug, Deserialize)]
pub(crate) struct SentimentForm {
    #[serde(default)]
    text: String,
}

fn render_page(state: &AppState, text: &str, output: &str) -> Result<Html<String>, ErrorResponse> {
    let page = state
        .templates
        .get_template("index.html")
        .and_then(|template| {
            template.render(context! {
                title => TITLE,
                description => DESCRIPTION,
                examples => EXAMPLES,
                text => text,
                output => output,
            })
        })
        .map_err(|e| {
            tracing::error!("Failed to render page: {}", e);
            ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page")
        })?;
    Ok(Html(page))
}

pub(crate) async fn index(State(state): State<AppState>) -> Result<Html<String>, ErrorResponse> {
    render_page(&state, "", "")
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    Form(form): Form<SentimentForm>,
) -> Result<Html<String>, ErrorResponse> {
    let report = inference(&state.inference, form.text.clone()).await?;
    render_page(&state, &form.text, &report)
}
