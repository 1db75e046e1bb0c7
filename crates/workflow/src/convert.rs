//! Web -> API graph conversion.

use serde_json::Value;

use crate::diagnostics::{Diagnostics, SkipReason};
use crate::document::{ApiGraph, ApiNode};
use crate::format::{detect, WorkflowFormat};
use crate::web::{LinkIndex, WebGraph};
use crate::widgets::NodeKind;

/// A converted graph plus everything that was skipped on the way.
#[derive(Debug, Clone, Default)]
pub struct Conversion {
    pub graph: ApiGraph,
    pub diagnostics: Diagnostics,
}

/// Convert a parsed web graph.
///
/// Link-derived inputs are set first; widget values only fill inputs that
/// are still empty. References to nodes that did not make it into the
/// output are removed so every remaining reference resolves.
pub fn convert(web: &WebGraph) -> Conversion {
    let mut diagnostics = Diagnostics::new();
    let links = LinkIndex::build(&web.links);
    let mut graph = ApiGraph::new();

    for record in &web.nodes {
        let kind = NodeKind::from_class_type(&record.node_type);
        let mut node = ApiNode::new(record.node_type.clone());

        for input in &record.inputs {
            let Some(link) = input.link else {
                continue;
            };
            match links.resolve(link) {
                Some(source) => node.set_input(&input.name, source.to_value()),
                None => diagnostics.push(SkipReason::DanglingLink {
                    node: record.id.clone(),
                    input: input.name.clone(),
                    link,
                }),
            }
        }

        kind.apply_widgets(
            &record.id,
            record.widgets_values.as_ref(),
            &mut node.inputs,
            &mut diagnostics,
        );

        graph.insert(record.id.clone(), node);
    }

    prune_dangling_references(&mut graph, &mut diagnostics);

    tracing::debug!(
        "converted {} web nodes and {} links into {} api nodes",
        web.nodes.len(),
        links.len(),
        graph.node_count()
    );

    Conversion { graph, diagnostics }
}

fn prune_dangling_references(graph: &mut ApiGraph, diagnostics: &mut Diagnostics) {
    let mut dangling = Vec::new();
    for (id, node) in graph.nodes() {
        for (input, target) in node.links() {
            if graph.get(&target.node).is_none() {
                dangling.push((id.to_string(), input.to_string(), target));
            }
        }
    }

    for (id, input, target) in dangling {
        if let Some(node) = graph.get_mut(&id) {
            node.inputs.remove(&input);
        }
        diagnostics.push(SkipReason::DanglingReference {
            node: id,
            input,
            target: target.node,
        });
    }
}

/// Turn any parsed workflow document into an API graph: web documents are
/// converted, API documents are read as-is with non-node entries kept
/// opaque.
pub fn convert_document(document: Value) -> Conversion {
    match detect(&document) {
        WorkflowFormat::Web => {
            let mut diagnostics = Diagnostics::new();
            let web = WebGraph::parse(&document, &mut diagnostics);
            let Conversion {
                graph,
                diagnostics: converted,
            } = convert(&web);
            diagnostics.append(converted);
            Conversion { graph, diagnostics }
        }
        WorkflowFormat::Api => {
            let mut diagnostics = Diagnostics::new();
            let graph = match document {
                Value::Object(map) => ApiGraph::from_map(map),
                _ => ApiGraph::new(),
            };
            for key in graph.opaque_keys() {
                diagnostics.push(SkipReason::OpaqueEntry {
                    key: key.to_string(),
                });
            }
            Conversion { graph, diagnostics }
        }
    }
}
