//! Records skipped by the lenient readers and injector.
//!
//! Nothing in here is an error: a workflow with skips still translates.
//! The list exists so callers (and tests) can see what was dropped.

use serde::Serialize;
use std::fmt;

/// Which prompt a conditioning lookup was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSlot {
    Positive,
    Negative,
}

impl PromptSlot {
    /// Name of the sampler input that carries this slot.
    pub fn input_name(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

impl fmt::Display for PromptSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.input_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A `nodes` element that is not a mapping.
    NodeNotMapping { index: usize },
    NodeWithoutId { index: usize },
    NodeWithoutType { node: String },
    /// A link record that is too short or carries non-integer ids/slots.
    MalformedLink { index: usize },
    InputWithoutName { node: String, index: usize },
    /// An input names a link id absent from the link table.
    DanglingLink {
        node: String,
        input: String,
        link: u64,
    },
    /// A resolved link points at a node that was itself skipped.
    DanglingReference {
        node: String,
        input: String,
        target: String,
    },
    WidgetsNotSequence { node: String },
    MissingWidget {
        node: String,
        input: &'static str,
        position: usize,
    },
    /// Widget values on a node type with no known positional schema.
    UninterpretedWidgets { node: String, class_type: String },
    /// A top-level API entry that is not a node mapping.
    OpaqueEntry { key: String },
    ConditioningNotFound { slot: PromptSlot },
    NodeTypeAbsent { class_type: &'static str },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotMapping { index } => write!(f, "node #{index} is not an object"),
            Self::NodeWithoutId { index } => write!(f, "node #{index} has no id"),
            Self::NodeWithoutType { node } => write!(f, "node {node} has no type"),
            Self::MalformedLink { index } => write!(f, "link #{index} is malformed"),
            Self::InputWithoutName { node, index } => {
                write!(f, "input #{index} of node {node} has no name")
            }
            Self::DanglingLink { node, input, link } => {
                write!(f, "{node}.{input} uses unknown link {link}")
            }
            Self::DanglingReference {
                node,
                input,
                target,
            } => write!(f, "{node}.{input} points at missing node {target}"),
            Self::WidgetsNotSequence { node } => {
                write!(f, "widgets_values of node {node} is not a list")
            }
            Self::MissingWidget {
                node,
                input,
                position,
            } => write!(f, "node {node} has no widget value at {position} for {input}"),
            Self::UninterpretedWidgets { node, class_type } => {
                write!(f, "widgets of node {node} ({class_type}) left uninterpreted")
            }
            Self::OpaqueEntry { key } => write!(f, "entry {key} is not a node"),
            Self::ConditioningNotFound { slot } => {
                write!(f, "no text encoder found behind the {slot} input")
            }
            Self::NodeTypeAbsent { class_type } => write!(f, "no {class_type} node in graph"),
        }
    }
}

/// Ordered list of skips.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<SkipReason>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reason: SkipReason) {
        tracing::debug!("skipped: {reason}");
        self.0.push(reason);
    }

    /// Move another list's entries to the end of this one.
    pub fn append(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SkipReason> {
        self.0.iter()
    }

    pub fn contains(&self, reason: &SkipReason) -> bool {
        self.0.contains(reason)
    }

    pub fn into_vec(self) -> Vec<SkipReason> {
        self.0
    }
}

impl Extend<SkipReason> for Diagnostics {
    fn extend<T: IntoIterator<Item = SkipReason>>(&mut self, iter: T) {
        for reason in iter {
            self.push(reason);
        }
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a SkipReason;
    type IntoIter = std::slice::Iter<'a, SkipReason>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
