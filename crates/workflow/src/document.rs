//! Flat API-format graph: node id -> `{class_type, inputs}`.
//!
//! Entry order is the document order and is significant: the sampler
//! lookup and every "first node of type X" scan walk it front to back.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Pointer to an output slot of another node, `[node_id, slot]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub node: String,
    pub slot: u64,
}

impl NodeRef {
    pub fn new(node: impl Into<String>, slot: u64) -> Self {
        Self {
            node: node.into(),
            slot,
        }
    }

    /// Read a 2-element reference; anything else is a literal input.
    pub fn from_value(value: &Value) -> Option<Self> {
        let pair = value.as_array()?;
        if pair.len() != 2 {
            return None;
        }
        let node = node_id_string(&pair[0])?;
        let slot = pair[1].as_u64()?;
        Some(Self { node, slot })
    }

    pub fn to_value(&self) -> Value {
        json!([self.node, self.slot])
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.slot)
    }
}

/// Coerce a JSON node id to its string key.
///
/// Integral floats (`5.0`) render as `"5"`, not `"5.0"`, so a float id and
/// an integer link endpoint name the same node. Empty strings, `null` and
/// non-scalar ids have no key.
pub(crate) fn node_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some((f as i64).to_string())
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

/// One executable node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiNode {
    pub class_type: String,
    pub inputs: Map<String, Value>,
    /// Keys other than `class_type`/`inputs` (e.g. `_meta`), kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiNode {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: Map::new(),
            extra: Map::new(),
        }
    }

    /// Read a node mapping, handing the value back if it is not one.
    pub fn from_value(value: Value) -> std::result::Result<Self, Value> {
        let Value::Object(mut map) = value else {
            return Err(value);
        };
        let class_ok = matches!(map.get("class_type"), Some(Value::String(_)));
        let inputs_ok = matches!(map.get("inputs"), None | Some(Value::Object(_)));
        if !class_ok || !inputs_ok {
            return Err(Value::Object(map));
        }

        let class_type = match map.remove("class_type") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let inputs = match map.remove("inputs") {
            Some(Value::Object(inputs)) => inputs,
            _ => Map::new(),
        };

        Ok(Self {
            class_type,
            inputs,
            extra: map,
        })
    }

    pub fn is_class(&self, class_type: &str) -> bool {
        self.class_type == class_type
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// Overwrite an input.
    pub fn set_input(&mut self, name: &str, value: impl Into<Value>) {
        self.inputs.insert(name.to_string(), value.into());
    }

    /// Set an input unless something already occupies it. Returns whether
    /// the value was written.
    pub fn set_input_if_absent(&mut self, name: &str, value: impl Into<Value>) -> bool {
        if self.inputs.contains_key(name) {
            return false;
        }
        self.inputs.insert(name.to_string(), value.into());
        true
    }

    /// Node reference held by an input, if that input is a link.
    pub fn link(&self, name: &str) -> Option<NodeRef> {
        self.inputs.get(name).and_then(NodeRef::from_value)
    }

    /// All linked inputs in input order.
    pub fn links(&self) -> impl Iterator<Item = (&str, NodeRef)> + '_ {
        self.inputs
            .iter()
            .filter_map(|(name, value)| NodeRef::from_value(value).map(|r| (name.as_str(), r)))
    }
}

/// A top-level value of an API document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ApiEntry {
    Node(ApiNode),
    /// Not a node mapping. Kept for output, skipped by every scan.
    Opaque(Value),
}

impl ApiEntry {
    pub fn from_value(value: Value) -> Self {
        match ApiNode::from_value(value) {
            Ok(node) => Self::Node(node),
            Err(value) => Self::Opaque(value),
        }
    }

    pub fn as_node(&self) -> Option<&ApiNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Opaque(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut ApiNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Opaque(_) => None,
        }
    }
}

/// Ordered API-format document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiGraph {
    entries: Vec<(String, ApiEntry)>,
}

impl ApiGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a decoded JSON object, keeping key order.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut graph = Self::new();
        for (key, value) in map {
            graph.insert_entry(key, ApiEntry::from_value(value));
        }
        graph
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == id)
    }

    /// Insert an entry. An existing id keeps its position and gets the
    /// new value.
    pub fn insert_entry(&mut self, id: impl Into<String>, entry: ApiEntry) {
        let id = id.into();
        match self.position(&id) {
            Some(index) => self.entries[index].1 = entry,
            None => self.entries.push((id, entry)),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, node: ApiNode) {
        self.insert_entry(id, ApiEntry::Node(node));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&ApiNode> {
        self.entries
            .iter()
            .find(|(key, _)| key == id)
            .and_then(|(_, entry)| entry.as_node())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ApiNode> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == id)
            .and_then(|(_, entry)| entry.as_node_mut())
    }

    /// Every entry, nodes and opaque values, in document order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ApiEntry)> + '_ {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Node entries only, in document order.
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &ApiNode)> + '_ {
        self.entries
            .iter()
            .filter_map(|(key, entry)| entry.as_node().map(|node| (key.as_str(), node)))
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = (&str, &mut ApiNode)> + '_ {
        self.entries
            .iter_mut()
            .filter_map(|(key, entry)| entry.as_node_mut().map(|node| (key.as_str(), node)))
    }

    pub fn opaque_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, ApiEntry::Opaque(_)))
            .map(|(key, _)| key.as_str())
    }

    /// Id of the first node of the given class.
    pub fn first_of_class(&self, class_type: &str) -> Option<String> {
        self.nodes()
            .find(|(_, node)| node.is_class(class_type))
            .map(|(id, _)| id.to_string())
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, entry) in &self.entries {
            let value = match entry {
                ApiEntry::Node(node) => {
                    let mut obj = Map::new();
                    obj.insert("class_type".into(), Value::String(node.class_type.clone()));
                    obj.insert("inputs".into(), Value::Object(node.inputs.clone()));
                    for (k, v) in &node.extra {
                        obj.insert(k.clone(), v.clone());
                    }
                    Value::Object(obj)
                }
                ApiEntry::Opaque(value) => value.clone(),
            };
            map.insert(key.clone(), value);
        }
        Value::Object(map)
    }
}

impl Serialize for ApiGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ApiGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_map(map))
    }
}
