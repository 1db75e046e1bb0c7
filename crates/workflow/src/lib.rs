/// ComfyUI workflow translation
///
/// Turns a UI-authored ("web") workflow graph into the flat API format the
/// ComfyUI server executes, then drives it with generation parameters by
/// locating the sampler and tracing its conditioning inputs.
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

pub mod client;
pub mod config;
pub mod convert;
pub mod diagnostics;
pub mod document;
pub mod format;
pub mod inject;
pub mod trace;
pub mod web;
pub mod widgets;

pub use client::{ComfyUiClient, PromptRequest, QueuedPrompt};
pub use config::{GenerationDefaults, TranslatorConfig};
pub use convert::{convert, convert_document, Conversion};
pub use diagnostics::{Diagnostics, PromptSlot, SkipReason};
pub use document::{ApiEntry, ApiGraph, ApiNode, NodeRef};
pub use format::{detect, read_document, WorkflowFormat};
pub use inject::{GenerationParams, Injection, InjectionReport, Injector};
pub use trace::{find_sampler, trace_conditioning, SAMPLER_TYPES, TEXT_ENCODE_TYPES};
pub use web::{LinkIndex, LinkRecord, NodeInput, NodeRecord, WebGraph};
pub use widgets::{NodeKind, WidgetField};

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The graph cannot be driven as submitted (no supported sampler).
    #[error("{0}")]
    Structure(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ComfyUI API error: {status} - {body}")]
    Server { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Output of the full detect -> convert -> inject pipeline.
#[derive(Debug, Clone)]
pub struct Translation {
    pub format: WorkflowFormat,
    pub graph: ApiGraph,
    pub report: InjectionReport,
    /// Conversion and injection skips, in the order they happened.
    pub diagnostics: Diagnostics,
}

/// Run the whole pipeline on an already parsed workflow document.
///
/// Only a missing sampler node fails; every other gap is recorded in
/// [`Translation::diagnostics`] and skipped.
pub fn translate(
    document: Value,
    model_name: &str,
    params: &GenerationParams,
    config: &TranslatorConfig,
) -> Result<Translation> {
    let format = detect(&document);
    let Conversion {
        graph,
        mut diagnostics,
    } = convert_document(document);

    tracing::info!(
        "translating {} workflow with {} nodes",
        format,
        graph.node_count()
    );

    let Injection { graph, report } = Injector::new(config).inject(graph, model_name, params)?;
    diagnostics.append(report.diagnostics.clone());

    Ok(Translation {
        format,
        graph,
        report,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_translate_api_document() {
        let doc = json!({
            "3": {
                "class_type": "KSampler",
                "inputs": {"seed": 1, "positive": ["6", 0], "negative": ["7", 0]}
            },
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "old"}},
            "7": {"class_type": "CLIPTextEncode", "inputs": {"text": "old neg"}}
        });
        let params = GenerationParams {
            seed: Some(99.into()),
            prompt: Some("new".into()),
            ..Default::default()
        };

        let out = translate(doc, "", &params, &TranslatorConfig::default()).unwrap();

        assert_eq!(out.format, WorkflowFormat::Api);
        assert_eq!(out.graph.get("6").unwrap().inputs["text"], json!("new"));
        assert_eq!(out.graph.get("7").unwrap().inputs["text"], json!("old neg"));
        assert_eq!(out.graph.get("3").unwrap().inputs["seed"], json!(99));
    }

    #[test]
    fn test_translate_without_sampler_fails() {
        let doc = json!({"1": {"class_type": "SaveImage", "inputs": {}}});
        let err = translate(
            doc,
            "",
            &GenerationParams::default(),
            &TranslatorConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(err, WorkflowError::Structure(_)));
        assert!(err.to_string().contains("KSampler"));
    }
}
