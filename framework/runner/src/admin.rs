//! Administrative endpoint the orchestrator uses to set the run context before a run starts.
//!
//! The handlers work on raw request bodies and return an [AdminResponse], so any HTTP server can
//! serve them through [RunContextEndpoint::handle]. [RunContextEndpoint::router] wires them into an
//! axum [Router].

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use harness_bridge_model::RunContext;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::{ContextError, RunContextStore};

pub const SET_CONTEXT_PATH: &str = "/controlplane/set-context";
pub const GET_CONTEXT_PATH: &str = "/controlplane/get-context";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminRoute {
    pub method: AdminMethod,
    pub path: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminResponse {
    pub status: u16,
    pub body: Value,
}

impl AdminResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, error: impl std::fmt::Display) -> Self {
        Self {
            status,
            body: json!({ "success": false, "error": error.to_string() }),
        }
    }
}

impl IntoResponse for AdminResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

/// Body of a set-context request. Every field is optional and a missing field is reset.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SetContextRequest {
    run_id: Option<String>,
    tenant_id: Option<String>,
    env_id: Option<String>,
    duration_seconds: Option<i64>,
}

impl From<SetContextRequest> for RunContext {
    fn from(request: SetContextRequest) -> Self {
        RunContext {
            run_id: request.run_id.unwrap_or_default(),
            tenant_id: request.tenant_id.unwrap_or_default(),
            env_id: request.env_id.unwrap_or_default(),
            duration_seconds: request.duration_seconds,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunContextEndpoint {
    contexts: Arc<RunContextStore>,
}

impl RunContextEndpoint {
    pub fn new(contexts: Arc<RunContextStore>) -> Self {
        Self { contexts }
    }

    pub fn routes() -> [AdminRoute; 2] {
        [
            AdminRoute {
                method: AdminMethod::Post,
                path: SET_CONTEXT_PATH,
            },
            AdminRoute {
                method: AdminMethod::Get,
                path: GET_CONTEXT_PATH,
            },
        ]
    }

    /// Dispatch a request to the matching handler. Returns `None` if no route matches.
    pub fn handle(&self, method: AdminMethod, path: &str, body: &[u8]) -> Option<AdminResponse> {
        match (method, path) {
            (AdminMethod::Post, SET_CONTEXT_PATH) => Some(self.set_context(body)),
            (AdminMethod::Get, GET_CONTEXT_PATH) => Some(self.get_context()),
            _ => None,
        }
    }

    /// Replace the whole run context from a JSON body.
    ///
    /// The body must be a JSON object. The context is left unchanged if the body is rejected.
    pub fn set_context(&self, body: &[u8]) -> AdminResponse {
        let context = match parse_set_context(body) {
            Ok(context) => context,
            Err(e) => {
                log::warn!("Rejected set-context request: {e}");
                return AdminResponse::error(400, e);
            }
        };

        match self.contexts.set(context) {
            Ok(context) => {
                log::info!(
                    "Run context set: runId={}, tenantId={}, envId={}, durationSeconds={:?}",
                    context.run_id,
                    context.tenant_id,
                    context.env_id,
                    context.duration_seconds
                );
                AdminResponse::ok(json!({
                    "success": true,
                    "message": "Run context set successfully",
                    "context": context.as_ref(),
                }))
            }
            Err(e @ ContextError::RunInProgress(_)) => {
                log::warn!("Rejected set-context request: {e}");
                AdminResponse::error(409, e)
            }
        }
    }

    pub fn get_context(&self) -> AdminResponse {
        AdminResponse::ok(json!({
            "success": true,
            "context": self.contexts.get().as_ref(),
        }))
    }

    pub fn router(self) -> Router {
        Router::new()
            .route(SET_CONTEXT_PATH, post(set_context_handler))
            .route(GET_CONTEXT_PATH, get(get_context_handler))
            .with_state(self)
    }
}

fn parse_set_context(body: &[u8]) -> Result<RunContext, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    if !value.is_object() {
        return Err(serde::de::Error::custom("expected a JSON object"));
    }

    Ok(serde_json::from_value::<SetContextRequest>(value)?.into())
}

async fn set_context_handler(
    State(endpoint): State<RunContextEndpoint>,
    body: Bytes,
) -> AdminResponse {
    endpoint.set_context(&body)
}

async fn get_context_handler(State(endpoint): State<RunContextEndpoint>) -> AdminResponse {
    endpoint.get_context()
}
