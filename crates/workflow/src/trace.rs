//! Sampler lookup and backward conditioning trace.

use std::collections::HashSet;

use crate::document::{ApiGraph, ApiNode, NodeRef};
use crate::{Result, WorkflowError};

/// Sampler classes parameter injection can anchor on.
pub const SAMPLER_TYPES: &[&str] = &[
    "KSampler",
    "KSamplerAdvanced",
    "SamplerCustom",
    "SamplerCustomAdvanced",
];

/// Text encoders a prompt can be written into.
pub const TEXT_ENCODE_TYPES: &[&str] = &["CLIPTextEncode", "CLIPTextEncodeSDXL"];

pub const DEFAULT_MAX_DEPTH: usize = 5;

pub fn is_sampler(node: &ApiNode) -> bool {
    SAMPLER_TYPES.contains(&node.class_type.as_str())
}

pub fn is_text_encoder(node: &ApiNode) -> bool {
    TEXT_ENCODE_TYPES.contains(&node.class_type.as_str())
}

/// First sampler node in document order.
pub fn find_sampler(graph: &ApiGraph) -> Result<(&str, &ApiNode)> {
    graph.nodes().find(|(_, node)| is_sampler(node)).ok_or_else(|| {
        tracing::warn!("workflow has no sampler node");
        WorkflowError::Structure(format!(
            "no sampler node found; supported types: {}",
            SAMPLER_TYPES.join(", ")
        ))
    })
}

/// Nearest text encoder reachable backwards from `start`.
///
/// Depth-first over linked inputs, in input order, so the first input that
/// leads to an encoder wins. `start` is depth 0; anything deeper than
/// `max_depth` is not examined. Each node is entered at most once, which
/// also ends the walk on cyclic graphs.
pub fn trace_conditioning(graph: &ApiGraph, start: &str, max_depth: usize) -> Option<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<(String, usize)> = vec![(start.to_string(), 0)];

    while let Some((id, depth)) = stack.pop() {
        if depth > max_depth || !visited.insert(id.clone()) {
            continue;
        }
        let Some(node) = graph.get(&id) else {
            continue;
        };
        if is_text_encoder(node) {
            return Some(id);
        }

        // reversed so the first input is popped first
        let upstream: Vec<NodeRef> = node.links().map(|(_, target)| target).collect();
        for target in upstream.into_iter().rev() {
            stack.push((target.node, depth + 1));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(value: serde_json::Value) -> ApiGraph {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_find_first_sampler_in_order() {
        let g = graph(json!({
            "1": {"class_type": "CheckpointLoaderSimple", "inputs": {}},
            "7": {"class_type": "SamplerCustom", "inputs": {}},
            "3": {"class_type": "KSampler", "inputs": {}}
        }));
        let (id, node) = find_sampler(&g).unwrap();
        assert_eq!(id, "7");
        assert_eq!(node.class_type, "SamplerCustom");
    }

    #[test]
    fn test_missing_sampler_names_supported_types() {
        let g = graph(json!({"1": {"class_type": "EmptyLatentImage", "inputs": {}}}));
        let err = find_sampler(&g).unwrap_err();
        let message = err.to_string();
        for name in SAMPLER_TYPES {
            assert!(message.contains(name), "{message}");
        }
    }

    #[test]
    fn test_trace_direct_encoder() {
        let g = graph(json!({
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "x"}}
        }));
        assert_eq!(trace_conditioning(&g, "6", 5), Some("6".into()));
    }

    #[test]
    fn test_trace_through_combiner() {
        let g = graph(json!({
            "9": {"class_type": "ConditioningCombine",
                  "inputs": {"conditioning_1": ["8", 0], "conditioning_2": ["6", 0]}},
            "8": {"class_type": "ConditioningSetArea", "inputs": {"conditioning": ["5", 0]}},
            "5": {"class_type": "CLIPTextEncodeSDXL", "inputs": {}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {}}
        }));
        // first input branch is explored fully before the second
        assert_eq!(trace_conditioning(&g, "9", 5), Some("5".into()));
    }

    #[test]
    fn test_trace_respects_depth() {
        let g = graph(json!({
            "a": {"class_type": "Reroute", "inputs": {"x": ["b", 0]}},
            "b": {"class_type": "Reroute", "inputs": {"x": ["c", 0]}},
            "c": {"class_type": "CLIPTextEncode", "inputs": {}}
        }));
        assert_eq!(trace_conditioning(&g, "a", 2), Some("c".into()));
        assert_eq!(trace_conditioning(&g, "a", 1), None);
    }

    #[test]
    fn test_trace_terminates_on_cycle() {
        let g = graph(json!({
            "a": {"class_type": "Reroute", "inputs": {"x": ["b", 0]}},
            "b": {"class_type": "Reroute", "inputs": {"x": ["a", 0]}}
        }));
        for depth in [1, 2, 5, 100] {
            assert_eq!(trace_conditioning(&g, "a", depth), None);
        }
    }

    #[test]
    fn test_trace_missing_start() {
        let g = graph(json!({}));
        assert_eq!(trace_conditioning(&g, "42", 5), None);
    }
}
