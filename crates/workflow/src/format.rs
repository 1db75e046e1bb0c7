//! Workflow document shape detection and file reading.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::{Result, WorkflowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowFormat {
    /// UI-saved graph: `{nodes: [...], links: [...]}`.
    Web,
    /// Flat `{node_id: {class_type, inputs}}` document.
    Api,
}

impl fmt::Display for WorkflowFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Api => write!(f, "api"),
        }
    }
}

/// `nodes` holding a list means web format; anything else is treated as
/// API format.
pub fn detect(document: &Value) -> WorkflowFormat {
    match document.get("nodes") {
        Some(Value::Array(_)) => WorkflowFormat::Web,
        _ => WorkflowFormat::Api,
    }
}

/// Read and parse a workflow file.
pub fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}
