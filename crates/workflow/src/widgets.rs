//! Positional widget schemas.
//!
//! `widgets_values` carries no field names, so each known node type gets a
//! fixed table of `position -> input name`. Positions absent from a table
//! are UI-only widgets (e.g. KSampler's "control_after_generate").

use serde_json::{Map, Value};

use crate::diagnostics::{Diagnostics, SkipReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetField {
    pub position: usize,
    pub input: &'static str,
}

const fn field(position: usize, input: &'static str) -> WidgetField {
    WidgetField { position, input }
}

const KSAMPLER: &[WidgetField] = &[
    field(0, "seed"),
    field(2, "steps"),
    field(3, "cfg"),
    field(4, "sampler_name"),
    field(5, "scheduler"),
    field(6, "denoise"),
];

const KSAMPLER_ADVANCED: &[WidgetField] = &[
    field(0, "add_noise"),
    field(1, "noise_seed"),
    field(3, "steps"),
    field(4, "cfg"),
    field(5, "sampler_name"),
    field(6, "scheduler"),
    field(7, "start_at_step"),
    field(8, "end_at_step"),
    field(9, "return_with_leftover_noise"),
];

const CLIP_TEXT_ENCODE: &[WidgetField] = &[field(0, "text")];
const CHECKPOINT_LOADER_SIMPLE: &[WidgetField] = &[field(0, "ckpt_name")];
const EMPTY_LATENT_IMAGE: &[WidgetField] =
    &[field(0, "width"), field(1, "height"), field(2, "batch_size")];
const SAVE_IMAGE: &[WidgetField] = &[field(0, "filename_prefix")];
const VAE_LOADER: &[WidgetField] = &[field(0, "vae_name")];
const LOAD_IMAGE: &[WidgetField] = &[field(0, "image")];
const LORA_LOADER: &[WidgetField] = &[
    field(0, "lora_name"),
    field(1, "strength_model"),
    field(2, "strength_clip"),
];
const CLIP_SET_LAST_LAYER: &[WidgetField] = &[field(0, "stop_at_clip_layer")];

/// Node types whose widget layout is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    KSampler,
    KSamplerAdvanced,
    ClipTextEncode,
    CheckpointLoaderSimple,
    EmptyLatentImage,
    SaveImage,
    VaeLoader,
    LoadImage,
    LoraLoader,
    ClipSetLastLayer,
    /// Any other class. Widgets are not interpreted.
    Opaque(String),
}

impl NodeKind {
    pub fn from_class_type(class_type: &str) -> Self {
        match class_type {
            "KSampler" => Self::KSampler,
            "KSamplerAdvanced" => Self::KSamplerAdvanced,
            "CLIPTextEncode" => Self::ClipTextEncode,
            "CheckpointLoaderSimple" => Self::CheckpointLoaderSimple,
            "EmptyLatentImage" => Self::EmptyLatentImage,
            "SaveImage" => Self::SaveImage,
            "VAELoader" => Self::VaeLoader,
            "LoadImage" => Self::LoadImage,
            "LoraLoader" => Self::LoraLoader,
            "CLIPSetLastLayer" => Self::ClipSetLastLayer,
            other => Self::Opaque(other.to_string()),
        }
    }

    pub fn class_type(&self) -> &str {
        match self {
            Self::KSampler => "KSampler",
            Self::KSamplerAdvanced => "KSamplerAdvanced",
            Self::ClipTextEncode => "CLIPTextEncode",
            Self::CheckpointLoaderSimple => "CheckpointLoaderSimple",
            Self::EmptyLatentImage => "EmptyLatentImage",
            Self::SaveImage => "SaveImage",
            Self::VaeLoader => "VAELoader",
            Self::LoadImage => "LoadImage",
            Self::LoraLoader => "LoraLoader",
            Self::ClipSetLastLayer => "CLIPSetLastLayer",
            Self::Opaque(class_type) => class_type,
        }
    }

    pub fn widget_fields(&self) -> &'static [WidgetField] {
        match self {
            Self::KSampler => KSAMPLER,
            Self::KSamplerAdvanced => KSAMPLER_ADVANCED,
            Self::ClipTextEncode => CLIP_TEXT_ENCODE,
            Self::CheckpointLoaderSimple => CHECKPOINT_LOADER_SIMPLE,
            Self::EmptyLatentImage => EMPTY_LATENT_IMAGE,
            Self::SaveImage => SAVE_IMAGE,
            Self::VaeLoader => VAE_LOADER,
            Self::LoadImage => LOAD_IMAGE,
            Self::LoraLoader => LORA_LOADER,
            Self::ClipSetLastLayer => CLIP_SET_LAST_LAYER,
            Self::Opaque(_) => &[],
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    /// Copy widget values into `inputs` without touching keys that are
    /// already set (links win). Short or non-list widget values skip the
    /// affected fields only.
    pub fn apply_widgets(
        &self,
        node: &str,
        widgets: Option<&Value>,
        inputs: &mut Map<String, Value>,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(widgets) = widgets else {
            return;
        };

        if self.is_opaque() {
            let non_empty = match widgets {
                Value::Array(values) => !values.is_empty(),
                Value::Object(values) => !values.is_empty(),
                _ => true,
            };
            if non_empty {
                diagnostics.push(SkipReason::UninterpretedWidgets {
                    node: node.to_string(),
                    class_type: self.class_type().to_string(),
                });
            }
            return;
        }

        let Some(values) = widgets.as_array() else {
            diagnostics.push(SkipReason::WidgetsNotSequence {
                node: node.to_string(),
            });
            return;
        };

        for field in self.widget_fields() {
            match values.get(field.position) {
                Some(value) => {
                    if !inputs.contains_key(field.input) {
                        inputs.insert(field.input.to_string(), value.clone());
                    }
                }
                None => diagnostics.push(SkipReason::MissingWidget {
                    node: node.to_string(),
                    input: field.input,
                    position: field.position,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(kind: &NodeKind, widgets: Value) -> (Map<String, Value>, Diagnostics) {
        let mut inputs = Map::new();
        let mut diagnostics = Diagnostics::new();
        kind.apply_widgets("1", Some(&widgets), &mut inputs, &mut diagnostics);
        (inputs, diagnostics)
    }

    #[test]
    fn test_ksampler_skips_control_after_generate() {
        let (inputs, diagnostics) = apply(
            &NodeKind::KSampler,
            json!([123, "randomize", 20, 7.0, "euler", "normal", 1.0]),
        );
        assert!(diagnostics.is_empty());
        assert_eq!(inputs["seed"], json!(123));
        assert_eq!(inputs["steps"], json!(20));
        assert_eq!(inputs["cfg"], json!(7.0));
        assert_eq!(inputs["sampler_name"], json!("euler"));
        assert_eq!(inputs["scheduler"], json!("normal"));
        assert_eq!(inputs["denoise"], json!(1.0));
        assert!(!inputs.values().any(|v| v == "randomize"));
    }

    #[test]
    fn test_ksampler_advanced_layout() {
        let (inputs, _) = apply(
            &NodeKind::KSamplerAdvanced,
            json!(["enable", 42, "fixed", 25, 6.5, "dpmpp_2m", "karras", 0, 10000, "disable"]),
        );
        assert_eq!(inputs["add_noise"], json!("enable"));
        assert_eq!(inputs["noise_seed"], json!(42));
        assert_eq!(inputs["steps"], json!(25));
        assert_eq!(inputs["end_at_step"], json!(10000));
        assert_eq!(inputs["return_with_leftover_noise"], json!("disable"));
        assert_eq!(inputs.len(), 9);
    }

    #[test]
    fn test_short_widgets_leave_fields_unset() {
        let (inputs, diagnostics) = apply(&NodeKind::EmptyLatentImage, json!([768]));
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs["width"], json!(768));
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.contains(&SkipReason::MissingWidget {
            node: "1".into(),
            input: "batch_size",
            position: 2
        }));
    }

    #[test]
    fn test_linked_input_wins() {
        let mut inputs = Map::new();
        inputs.insert("text".into(), json!(["7", 0]));
        let mut diagnostics = Diagnostics::new();
        NodeKind::ClipTextEncode.apply_widgets(
            "1",
            Some(&json!(["from widget"])),
            &mut inputs,
            &mut diagnostics,
        );
        assert_eq!(inputs["text"], json!(["7", 0]));
    }

    #[test]
    fn test_opaque_widgets_not_interpreted() {
        let kind = NodeKind::from_class_type("MyCustomNode");
        assert_eq!(kind, NodeKind::Opaque("MyCustomNode".into()));
        let (inputs, diagnostics) = apply(&kind, json!([1, 2, 3]));
        assert!(inputs.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_non_list_widgets() {
        let (inputs, diagnostics) = apply(&NodeKind::SaveImage, json!({"filename_prefix": "x"}));
        assert!(inputs.is_empty());
        assert!(diagnostics.contains(&SkipReason::WidgetsNotSequence { node: "1".into() }));
    }

    #[test]
    fn test_class_type_round_trip() {
        for name in [
            "KSampler",
            "KSamplerAdvanced",
            "CLIPTextEncode",
            "CheckpointLoaderSimple",
            "EmptyLatentImage",
            "SaveImage",
            "VAELoader",
            "LoadImage",
            "LoraLoader",
            "CLIPSetLastLayer",
        ] {
            let kind = NodeKind::from_class_type(name);
            assert!(!kind.is_opaque(), "{name} should be known");
            assert_eq!(kind.class_type(), name);
        }
    }
}
