//! One-shot endpoints: story generation, quality checks and backlog upload

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::{Map, Value};
use storyrank_protocol::Story;
use storyrank_techniques::authoring::{
    generation_prompt, parse_generated_stories, parse_quality_evaluations, quality_prompt,
    GENERATION_SYSTEM_PROMPT, QUALITY_SYSTEM_PROMPT,
};
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::protocol::{
    GenerateStoriesRequest, GeneratedStoriesResponse, QualityCheckRequest, QualityCheckResponse,
    StoriesResponse, UploadResponse,
};
use crate::server::AppState;

const GENERATE_MISSING: &str = "Missing required data: objective, and model";
const QUALITY_MISSING: &str = "Missing required data: framework, stories, and model";

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) async fn generate_user_stories(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateStoriesRequest>, JsonRejection>,
) -> Result<Json<GeneratedStoriesResponse>, GatewayError> {
    let Ok(Json(request)) = payload else {
        return Err(GatewayError::InvalidRequest(GENERATE_MISSING.to_string()));
    };
    let (Some(objective), Some(model)) = (required(request.objective), required(request.model))
    else {
        return Err(GatewayError::InvalidRequest(GENERATE_MISSING.to_string()));
    };

    let prompt = generation_prompt(&objective, request.mvp.as_deref());
    let reply = state
        .orchestrator
        .generate(&model, GENERATION_SYSTEM_PROMPT, prompt)
        .await
        .map_err(|e| GatewayError::generation("story generation", e))?;

    let stories = parse_generated_stories(&reply);
    info!(model = %model, stories = stories.len(), "Generated user stories");
    Ok(Json(StoriesResponse {
        stories_with_epics: stories,
    }))
}

/// Accepts loosely shaped story objects; a missing key is filled from the
/// story's position.
fn stories_from_values(values: Vec<Value>) -> Vec<Story> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let Value::Object(mut object) = value else {
                warn!(index, "Skipping story that is not an object");
                return None;
            };
            object
                .entry("key")
                .or_insert_with(|| Value::from(index as i64 + 1));
            match serde_json::from_value::<Story>(Value::Object(object)) {
                Ok(story) => Some(story),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed story");
                    None
                }
            }
        })
        .collect()
}

pub(crate) async fn check_user_stories_quality(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QualityCheckRequest>, JsonRejection>,
) -> Result<Json<QualityCheckResponse>, GatewayError> {
    let Ok(Json(request)) = payload else {
        return Err(GatewayError::InvalidRequest(QUALITY_MISSING.to_string()));
    };
    let (Some(framework), Some(stories), Some(model)) = (
        required(request.framework),
        request.stories,
        required(request.model),
    ) else {
        return Err(GatewayError::InvalidRequest(QUALITY_MISSING.to_string()));
    };

    let stories = stories_from_values(stories);
    let prompt = quality_prompt(&stories, &framework);
    let reply = state
        .orchestrator
        .generate(&model, QUALITY_SYSTEM_PROMPT, prompt)
        .await
        .map_err(|e| GatewayError::generation("quality check", e))?;

    let evaluations = parse_quality_evaluations(&reply);
    if evaluations.len() < stories.len() {
        warn!(
            evaluated = evaluations.len(),
            expected = stories.len(),
            "Quality reply does not cover every story"
        );
    }
    Ok(Json(StoriesResponse {
        stories_with_epics: evaluations,
    }))
}

/// Parse a delimited file into header-keyed rows.
///
/// Short rows leave their trailing columns `null`; extra cells are dropped.
pub fn parse_csv_rows(bytes: &[u8]) -> Result<Vec<Map<String, Value>>, GatewayError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);
    let invalid = |e: csv::Error| GatewayError::InvalidUpload(format!("Invalid CSV file: {}", e));

    let headers = reader.headers().map_err(invalid)?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(invalid)?;
        let row: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record
                    .get(i)
                    .map_or(Value::Null, |v| Value::String(v.to_string()));
                (header.to_string(), cell)
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

pub(crate) async fn upload_csv(
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, GatewayError> {
    let upload = |e: axum::extract::multipart::MultipartError| {
        GatewayError::InvalidUpload(e.body_text())
    };

    while let Some(field) = multipart.next_field().await.map_err(upload)? {
        if field.name() != Some("file") {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.ends_with(".csv") {
            return Err(GatewayError::InvalidUpload(
                "Unsupported file type".to_string(),
            ));
        }

        let bytes = field.bytes().await.map_err(upload)?;
        let rows = parse_csv_rows(&bytes)?;
        info!(file = %file_name, rows = rows.len(), "Parsed uploaded backlog");
        return Ok(Json(StoriesResponse {
            stories_with_epics: rows,
        }));
    }

    Err(GatewayError::InvalidUpload("No file part".to_string()))
}
