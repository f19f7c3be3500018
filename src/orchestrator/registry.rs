//! Static capability registry.
//!
//! Every routable `(capability, action)` pair is declared here at startup
//! together with its quality-gate classification. Dispatch rejects
//! anything outside the table, replacing stringly runtime method lookup
//! with an explicit closed surface.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};

/// Gate classification for a registered action.
#[derive(Debug, Clone)]
pub struct RegisteredAction {
    /// Major actions run the quality gate before their handler.
    pub major: bool,
    /// Gate operation name to price, for major actions.
    pub gate_operation: Option<&'static str>,
}

/// Closed table of routable actions.
#[derive(Debug, Clone)]
pub struct Registry {
    entries: HashMap<(&'static str, &'static str), RegisteredAction>,
}

impl Registry {
    /// Build the engine's default surface.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };

        registry.register("project", "create", None);
        registry.register("project", "status", None);
        registry.register("project", "advance_phase", Some("advance_phase"));

        registry.register("facts", "submit_answer", None);
        registry.register("facts", "record", None);
        registry.register("facts", "list", None);
        registry.register("facts", "resolve_conflict", None);

        registry.register("questions", "next", None);

        registry.register("spec", "generate_document", Some("generate_document"));

        registry
    }

    fn register(
        &mut self,
        capability: &'static str,
        action: &'static str,
        gate_operation: Option<&'static str>,
    ) {
        self.entries.insert(
            (capability, action),
            RegisteredAction {
                major: gate_operation.is_some(),
                gate_operation,
            },
        );
    }

    /// Resolve a pair, distinguishing an unknown capability from an
    /// unknown action on a known capability.
    pub fn resolve(&self, capability: &str, action: &str) -> EngineResult<&RegisteredAction> {
        let entry = self
            .entries
            .iter()
            .find(|((c, a), _)| *c == capability && *a == action)
            .map(|(_, entry)| entry);
        if let Some(entry) = entry {
            return Ok(entry);
        }

        if self.entries.keys().any(|(c, _)| *c == capability) {
            Err(EngineError::UnknownAction {
                capability: capability.to_string(),
                action: action.to_string(),
            })
        } else {
            Err(EngineError::UnknownCapability {
                capability: capability.to_string(),
            })
        }
    }

    /// Number of registered actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
