//! Request dispatch.
//!
//! Routes `(capability, action)` requests through the registry, runs the
//! quality gate ahead of major actions, and folds every outcome into one
//! stable response shape. Handlers return typed results; errors are
//! tagged with their kind and a retryability flag so callers can react
//! without string matching.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::EngineState;
use crate::engine::{
    AdvancePhaseParams, CreateProjectParams, GateResult, GenerateDocumentParams, ListFactsParams,
    NextQuestionsParams, ProjectStatusParams, RecordFactParams, ResolveConflictParams,
    SubmitAnswerParams,
};
use crate::error::{EngineError, EngineResult};

/// An incoming request line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub capability: String,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

/// Machine-readable error surface on a dispatch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable kind tag, e.g. `validation` or `gate_blocked`.
    pub kind: String,
    pub message: String,
    /// Whether retrying the same request unchanged can succeed.
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The single response shape for every dispatched request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    /// Gate evaluation attached to major actions, blocking or not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_metadata: Option<GateResult>,
}

impl DispatchResponse {
    fn ok(data: Value, gate_metadata: Option<GateResult>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            gate_metadata,
        }
    }

    fn err(error: &EngineError, gate_metadata: Option<GateResult>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from_engine_error(error)),
            gate_metadata,
        }
    }
}

impl ErrorBody {
    fn from_engine_error(error: &EngineError) -> Self {
        let details = match error {
            EngineError::ConflictPending { conflict_ids, .. } => {
                Some(json!({ "conflict_ids": conflict_ids }))
            }
            EngineError::ConcurrentModification { category, key, .. } => {
                Some(json!({ "category": category, "key": key }))
            }
            EngineError::Validation { field, .. } => Some(json!({ "field": field })),
            _ => None,
        };

        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            details,
        }
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: &Value) -> EngineResult<T> {
    serde_json::from_value(payload.clone()).map_err(|e| EngineError::Validation {
        field: "payload".to_string(),
        reason: e.to_string(),
    })
}

/// Pull the project id out of a raw payload before typed parsing, so
/// the gate can run first for major actions.
fn payload_project_id(payload: &Value) -> EngineResult<String> {
    payload
        .get("project_id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::Validation {
            field: "project_id".to_string(),
            reason: "project_id is required".to_string(),
        })
}

impl EngineState {
    /// Dispatch one request to its handler.
    ///
    /// Never returns an error: every failure is folded into the response
    /// shape so the caller loop stays a straight serialize-and-print.
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchResponse {
        debug!(
            capability = %request.capability,
            action = %request.action,
            "Dispatching request"
        );

        let entry = match self.registry.resolve(&request.capability, &request.action) {
            Ok(entry) => entry,
            Err(e) => return DispatchResponse::err(&e, None),
        };

        // Major actions run the gate before their handler and carry the
        // evaluation on the response either way.
        let gate_metadata = if let Some(operation) = entry.gate_operation {
            let project_id = match payload_project_id(&request.payload) {
                Ok(id) => id,
                Err(e) => return DispatchResponse::err(&e, None),
            };
            let gate = match self.gate.evaluate(&project_id, operation).await {
                Ok(gate) => gate,
                Err(e) => return DispatchResponse::err(&e, None),
            };

            if gate.is_blocking {
                let reason = gate
                    .reason
                    .clone()
                    .unwrap_or_else(|| "NoViablePath".to_string());
                info!(
                    capability = %request.capability,
                    action = %request.action,
                    project_id = %project_id,
                    reason = %reason,
                    "Major action blocked by quality gate"
                );
                return DispatchResponse::err(&EngineError::GateBlocked { reason }, Some(gate));
            }
            Some(gate)
        } else {
            None
        };

        match self.invoke(&request).await {
            Ok(data) => DispatchResponse::ok(data, gate_metadata),
            Err(e) => DispatchResponse::err(&e, gate_metadata),
        }
    }

    async fn invoke(&self, request: &DispatchRequest) -> EngineResult<Value> {
        let payload = &request.payload;

        let data = match (request.capability.as_str(), request.action.as_str()) {
            ("project", "create") => {
                let params: CreateProjectParams = parse_payload(payload)?;
                serde_json::to_value(self.projects.create(params).await?)
            }
            ("project", "status") => {
                let params: ProjectStatusParams = parse_payload(payload)?;
                serde_json::to_value(self.projects.status(params).await?)
            }
            ("project", "advance_phase") => {
                let params: AdvancePhaseParams = parse_payload(payload)?;
                serde_json::to_value(self.projects.advance_phase(params).await?)
            }
            ("facts", "submit_answer") => {
                let params: SubmitAnswerParams = parse_payload(payload)?;
                serde_json::to_value(self.intake.submit_answer(params).await?)
            }
            ("facts", "record") => {
                let params: RecordFactParams = parse_payload(payload)?;
                serde_json::to_value(self.intake.record(params).await?)
            }
            ("facts", "list") => {
                let params: ListFactsParams = parse_payload(payload)?;
                serde_json::to_value(self.intake.list(params).await?)
            }
            ("facts", "resolve_conflict") => {
                let params: ResolveConflictParams = parse_payload(payload)?;
                serde_json::to_value(self.intake.resolve_conflict(params).await?)
            }
            ("questions", "next") => {
                let params: NextQuestionsParams = parse_payload(payload)?;
                serde_json::to_value(self.questions.next(params).await?)
            }
            ("spec", "generate_document") => {
                let params: GenerateDocumentParams = parse_payload(payload)?;
                serde_json::to_value(self.composer.generate(params).await?)
            }
            // The registry admits only the pairs matched above.
            (capability, _) => {
                return Err(EngineError::Internal {
                    message: format!("registered action has no handler: {capability}"),
                })
            }
        };

        data.map_err(|e| EngineError::Internal {
            message: format!("response serialization failed: {e}"),
        })
    }
}
