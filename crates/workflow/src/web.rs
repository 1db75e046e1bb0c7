//! UI-authored ("web") workflow graph.
//!
//! Read leniently out of a `serde_json::Value`: every record is parsed on
//! its own into `Result<_, SkipReason>` and bad records are dropped with a
//! diagnostic instead of failing the document.

use serde_json::Value;
use std::collections::HashMap;

use crate::diagnostics::{Diagnostics, SkipReason};
use crate::document::{node_id_string, NodeRef};

/// A declared input slot of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInput {
    pub name: String,
    pub link: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub node_type: String,
    pub inputs: Vec<NodeInput>,
    /// Positional widget values, meaning depends on `node_type`.
    /// `None` when the node carries none.
    pub widgets_values: Option<Value>,
}

impl NodeRecord {
    pub fn from_value(
        index: usize,
        value: &Value,
        diagnostics: &mut Diagnostics,
    ) -> Result<Self, SkipReason> {
        let obj = value
            .as_object()
            .ok_or(SkipReason::NodeNotMapping { index })?;

        let id = obj
            .get("id")
            .and_then(node_id_string)
            .ok_or(SkipReason::NodeWithoutId { index })?;

        let node_type = obj
            .get("type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SkipReason::NodeWithoutType { node: id.clone() })?
            .to_string();

        let mut inputs = Vec::new();
        if let Some(raw_inputs) = obj.get("inputs").and_then(Value::as_array) {
            for (slot, raw) in raw_inputs.iter().enumerate() {
                match NodeInput::from_value(&id, slot, raw) {
                    Ok(input) => inputs.push(input),
                    Err(reason) => diagnostics.push(reason),
                }
            }
        }

        let widgets_values = obj.get("widgets_values").filter(|v| !v.is_null()).cloned();

        Ok(Self {
            id,
            node_type,
            inputs,
            widgets_values,
        })
    }
}

impl NodeInput {
    fn from_value(node: &str, index: usize, value: &Value) -> Result<Self, SkipReason> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| SkipReason::InputWithoutName {
                node: node.to_string(),
                index,
            })?;

        Ok(Self {
            name: name.to_string(),
            link: value.get("link").and_then(Value::as_u64),
        })
    }
}

/// Directed edge from an output slot to an input slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub id: u64,
    pub source: String,
    pub source_slot: u64,
    pub target: String,
    pub target_slot: u64,
    pub kind: Value,
}

impl LinkRecord {
    /// Accepts the positional form
    /// `[id, source, source_slot, target, target_slot, type, ...]` and the
    /// object form newer frontends write
    /// (`{id, origin_id, origin_slot, target_id, target_slot, type}`).
    pub fn from_value(index: usize, value: &Value) -> Result<Self, SkipReason> {
        let malformed = || SkipReason::MalformedLink { index };

        match value {
            Value::Array(fields) if fields.len() >= 6 => Ok(Self {
                id: fields[0].as_u64().ok_or_else(malformed)?,
                source: node_id_string(&fields[1]).ok_or_else(malformed)?,
                source_slot: fields[2].as_u64().ok_or_else(malformed)?,
                target: node_id_string(&fields[3]).unwrap_or_default(),
                target_slot: fields[4].as_u64().unwrap_or_default(),
                kind: fields[5].clone(),
            }),
            Value::Object(obj) => Ok(Self {
                id: obj.get("id").and_then(Value::as_u64).ok_or_else(malformed)?,
                source: obj
                    .get("origin_id")
                    .and_then(node_id_string)
                    .ok_or_else(malformed)?,
                source_slot: obj
                    .get("origin_slot")
                    .and_then(Value::as_u64)
                    .ok_or_else(malformed)?,
                target: obj
                    .get("target_id")
                    .and_then(node_id_string)
                    .unwrap_or_default(),
                target_slot: obj
                    .get("target_slot")
                    .and_then(Value::as_u64)
                    .unwrap_or_default(),
                kind: obj.get("type").cloned().unwrap_or(Value::Null),
            }),
            _ => Err(malformed()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebGraph {
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
}

impl WebGraph {
    /// Read `{nodes, links}`. A missing or non-list `links` is an empty
    /// link table.
    pub fn parse(value: &Value, diagnostics: &mut Diagnostics) -> Self {
        let mut graph = Self::default();

        if let Some(nodes) = value.get("nodes").and_then(Value::as_array) {
            for (index, raw) in nodes.iter().enumerate() {
                match NodeRecord::from_value(index, raw, diagnostics) {
                    Ok(node) => graph.nodes.push(node),
                    Err(reason) => diagnostics.push(reason),
                }
            }
        }

        if let Some(links) = value.get("links").and_then(Value::as_array) {
            for (index, raw) in links.iter().enumerate() {
                match LinkRecord::from_value(index, raw) {
                    Ok(link) => graph.links.push(link),
                    Err(reason) => diagnostics.push(reason),
                }
            }
        }

        graph
    }
}

/// `link_id -> (source node, source slot)`, built once per conversion.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    sources: HashMap<u64, NodeRef>,
}

impl LinkIndex {
    /// Later records with a repeated id replace earlier ones.
    pub fn build(links: &[LinkRecord]) -> Self {
        let sources = links
            .iter()
            .map(|link| (link.id, NodeRef::new(link.source.clone(), link.source_slot)))
            .collect();
        Self { sources }
    }

    pub fn resolve(&self, link: u64) -> Option<&NodeRef> {
        self.sources.get(&link)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_links_are_skipped() {
        let mut diagnostics = Diagnostics::new();
        let graph = WebGraph::parse(
            &json!({
                "nodes": [],
                "links": [
                    [1, 10, 0, 5, 1, "CONDITIONING"],
                    [2, 11, 0, 5],
                    [3, 4, 1, 5, 0, "CLIP", {"extra": true}]
                ]
            }),
            &mut diagnostics,
        );

        let index = LinkIndex::build(&graph.links);
        assert_eq!(index.len(), 2);
        assert_eq!(index.resolve(1), Some(&NodeRef::new("10", 0)));
        assert_eq!(index.resolve(2), None);
        assert_eq!(index.resolve(3), Some(&NodeRef::new("4", 1)));
        assert!(diagnostics.contains(&SkipReason::MalformedLink { index: 1 }));
    }

    #[test]
    fn test_object_links() {
        let link = LinkRecord::from_value(
            0,
            &json!({"id": 7, "origin_id": 3, "origin_slot": 2, "target_id": 4, "target_slot": 0, "type": "LATENT"}),
        )
        .unwrap();
        assert_eq!(link.id, 7);
        assert_eq!(link.source, "3");
        assert_eq!(link.source_slot, 2);
        assert_eq!(link.kind, json!("LATENT"));
    }

    #[test]
    fn test_nodes_without_id_or_type_are_skipped() {
        let mut diagnostics = Diagnostics::new();
        let graph = WebGraph::parse(
            &json!({
                "nodes": [
                    {"id": 1, "type": "SaveImage"},
                    {"id": "", "type": "SaveImage"},
                    {"id": 3, "type": ""},
                    {"type": "VAELoader"},
                    "garbage"
                ]
            }),
            &mut diagnostics,
        );

        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].id, "1");
        assert!(graph.links.is_empty());
        assert_eq!(diagnostics.len(), 4);
        assert!(diagnostics.contains(&SkipReason::NodeWithoutType { node: "3".into() }));
        assert!(diagnostics.contains(&SkipReason::NodeNotMapping { index: 4 }));
    }

    #[test]
    fn test_node_inputs() {
        let mut diagnostics = Diagnostics::new();
        let node = NodeRecord::from_value(
            0,
            &json!({
                "id": 5,
                "type": "KSampler",
                "inputs": [
                    {"name": "model", "type": "MODEL", "link": 4},
                    {"name": "positive", "link": null},
                    {"type": "LATENT", "link": 9}
                ],
                "widgets_values": [1, "fixed", 20]
            }),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(
            node.inputs,
            vec![
                NodeInput {
                    name: "model".into(),
                    link: Some(4)
                },
                NodeInput {
                    name: "positive".into(),
                    link: None
                },
            ]
        );
        assert_eq!(node.widgets_values, Some(json!([1, "fixed", 20])));
        assert!(diagnostics.contains(&SkipReason::InputWithoutName {
            node: "5".into(),
            index: 2
        }));
    }
}
