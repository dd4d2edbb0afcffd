//! The three routes the proxy serves: the two OpenAI-shaped completion
//! endpoints and an unauthenticated health probe.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{ IntoResponse, Json, Response };
use axum::Json as JsonBody;
use bg_auth::AuthOutcome;
use serde_json::{ json, Value };

use crate::pipeline::{ admit_and_dispatch, Route };
use crate::state::ProxyState;

pub async fn chat_completions(State(state): State<ProxyState>, auth: AuthOutcome, headers: HeaderMap, JsonBody(body): JsonBody<Value>) -> Response
{
  admit_and_dispatch(&state, auth, Route::ChatCompletions, &headers, body).await
}

pub async fn responses(State(state): State<ProxyState>, auth: AuthOutcome, headers: HeaderMap, JsonBody(body): JsonBody<Value>) -> Response
{
  admit_and_dispatch(&state, auth, Route::Responses, &headers, body).await
}

pub async fn health() -> impl IntoResponse
{
  Json(json!({ "status": "ok" }))
}
