//! Model-callable tools
//!
//! The closed set of functions the remote model may invoke during a session,
//! their declared JSON-schema capabilities, and the dispatcher that executes
//! calls and returns results on the control channel.

pub mod dispatcher;
pub mod functions;

pub use dispatcher::ToolDispatcher;
pub use functions::{HttpPatientFunctions, NullPatientFunctions, PatientFunctions};

use serde::Serialize;
use serde_json::json;

/// Declared capability for one callable tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    fn function(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            kind: "function".to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// The fixed tool set declared to the remote model.
pub fn declared_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            "getPatientSummary",
            "Get a summary of the patient's therapy session on a specific date.",
            json!({
                "type": "object",
                "properties": {
                    "patientId": { "type": "number", "description": "The patient's id" },
                    "date": { "type": "string", "description": "Session date, YYYY-MM-DD" }
                },
                "required": ["patientId", "date"]
            }),
        ),
        ToolDefinition::function(
            "getClientSince",
            "Find out when the patient first became a client.",
            json!({
                "type": "object",
                "properties": {
                    "patientId": { "type": "number", "description": "The patient's id" }
                },
                "required": ["patientId"]
            }),
        ),
        ToolDefinition::function(
            "getTranscriptQuotes",
            "Search past session transcripts for quotes relevant to a query, \
             optionally restricted to one date.",
            json!({
                "type": "object",
                "properties": {
                    "patientId": { "type": "number", "description": "The patient's id" },
                    "query": { "type": "string", "description": "What to look for" },
                    "date": { "type": "string", "description": "Optional session date, YYYY-MM-DD" }
                },
                "required": ["patientId", "query"]
            }),
        ),
    ]
}
