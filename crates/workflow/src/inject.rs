//! Generation parameter injection.
//!
//! The injector takes the graph by value and hands it back mutated, so a
//! caller that still needs the original has to clone it explicitly.

use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use crate::config::{GenerationDefaults, TranslatorConfig};
use crate::diagnostics::{Diagnostics, PromptSlot, SkipReason};
use crate::document::ApiGraph;
use crate::trace::{find_sampler, trace_conditioning};
use crate::Result;

/// Seed value meaning "pick one at random".
pub const RANDOM_SEED: i64 = -1;

/// Batch size written to the latent node on every request.
pub const LATENT_BATCH_SIZE: u32 = 1;

/// Generation request coming from the front end. Every field is optional;
/// unknown keys are ignored when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Any 64-bit integer, signed or unsigned. Integral floats are accepted.
    #[serde(deserialize_with = "deserialize_seed")]
    pub seed: Option<Number>,
    #[serde(deserialize_with = "deserialize_count")]
    pub steps: Option<u32>,
    pub cfg_scale: Option<f64>,
    pub sampler_name: Option<String>,
    pub scheduler: Option<String>,
    pub denoising_strength: Option<f64>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    #[serde(deserialize_with = "deserialize_count")]
    pub width: Option<u32>,
    #[serde(deserialize_with = "deserialize_count")]
    pub height: Option<u32>,
    /// Server-side filename for img2img, written into the first LoadImage.
    pub init_image: Option<String>,
}

impl GenerationParams {
    /// Requested seed, or a fresh random 32-bit one for `-1`, unset or a
    /// value that is not an integer.
    pub fn resolve_seed(&self) -> Number {
        match self.seed.as_ref().and_then(integral) {
            Some(seed) if seed.as_i64() != Some(RANDOM_SEED) => seed,
            _ => Number::from(rand::thread_rng().gen::<u32>()),
        }
    }

    fn prompt_for(&self, slot: PromptSlot) -> Option<&str> {
        match slot {
            PromptSlot::Positive => self.prompt.as_deref(),
            PromptSlot::Negative => self.negative_prompt.as_deref(),
        }
    }
}

/// Integer form of a JSON number; `30.0` becomes `30`, `2.5` has none.
fn integral(number: &Number) -> Option<Number> {
    if number.is_i64() || number.is_u64() {
        return Some(number.clone());
    }
    let f = number.as_f64()?;
    if f.fract() != 0.0 {
        return None;
    }
    if f >= 0.0 && f <= u64::MAX as f64 {
        Some(Number::from(f as u64))
    } else if f < 0.0 && f >= i64::MIN as f64 {
        Some(Number::from(f as i64))
    } else {
        None
    }
}

fn deserialize_seed<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Number>, D::Error> {
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    integral(&number)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("seed must be an integer, got {number}")))
}

fn deserialize_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u32>, D::Error> {
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    integral(&number)
        .and_then(|n| n.as_u64())
        .and_then(|n| u32::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected a non-negative integer, got {number}")))
}

/// What the injector touched.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionReport {
    pub sampler: String,
    pub seed: Number,
    pub positive: Option<String>,
    pub negative: Option<String>,
    pub checkpoint: Option<String>,
    pub latent: Option<String>,
    pub load_image: Option<String>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct Injection {
    pub graph: ApiGraph,
    pub report: InjectionReport,
}

pub struct Injector {
    defaults: GenerationDefaults,
    max_trace_depth: usize,
}

impl Injector {
    pub fn new(config: &TranslatorConfig) -> Self {
        Self {
            defaults: config.defaults.clone(),
            max_trace_depth: config.max_trace_depth,
        }
    }

    /// Drive `graph` with the request.
    ///
    /// Fails only when the graph has no supported sampler. Missing
    /// encoders, checkpoint loaders, latent or image nodes are recorded in
    /// the report and skipped.
    pub fn inject(
        &self,
        mut graph: ApiGraph,
        model_name: &str,
        params: &GenerationParams,
    ) -> Result<Injection> {
        let (sampler_id, sampler) = find_sampler(&graph)?;
        let sampler_id = sampler_id.to_string();
        let seed_input = if sampler.is_class("KSamplerAdvanced") {
            "noise_seed"
        } else {
            "seed"
        };
        let positive = sampler.link(PromptSlot::Positive.input_name());
        let negative = sampler.link(PromptSlot::Negative.input_name());

        let seed = params.resolve_seed();
        let defaults = &self.defaults;
        if let Some(sampler) = graph.get_mut(&sampler_id) {
            sampler.set_input(seed_input, seed.clone());
            sampler.set_input("steps", params.steps.unwrap_or(defaults.steps));
            sampler.set_input("cfg", params.cfg_scale.unwrap_or(defaults.cfg_scale));
            sampler.set_input(
                "sampler_name",
                params
                    .sampler_name
                    .clone()
                    .unwrap_or_else(|| defaults.sampler_name.clone()),
            );
            sampler.set_input(
                "scheduler",
                params
                    .scheduler
                    .clone()
                    .unwrap_or_else(|| defaults.scheduler.clone()),
            );
            sampler.set_input(
                "denoise",
                params
                    .denoising_strength
                    .unwrap_or(defaults.denoising_strength),
            );
        }
        tracing::debug!("sampler {sampler_id}: {seed_input}={seed}");

        let mut report = InjectionReport {
            sampler: sampler_id,
            seed,
            positive: None,
            negative: None,
            checkpoint: None,
            latent: None,
            load_image: None,
            diagnostics: Diagnostics::new(),
        };

        for (slot, start) in [
            (PromptSlot::Positive, positive),
            (PromptSlot::Negative, negative),
        ] {
            let encoder = start
                .and_then(|start| trace_conditioning(&graph, &start.node, self.max_trace_depth));
            let Some(encoder) = encoder else {
                report
                    .diagnostics
                    .push(SkipReason::ConditioningNotFound { slot });
                continue;
            };
            if let Some(text) = params.prompt_for(slot) {
                write_prompt(&mut graph, &encoder, text);
            }
            match slot {
                PromptSlot::Positive => report.positive = Some(encoder),
                PromptSlot::Negative => report.negative = Some(encoder),
            }
        }

        if !model_name.is_empty() {
            report.checkpoint = set_on_first(
                &mut graph,
                "CheckpointLoaderSimple",
                &[("ckpt_name", Value::from(model_name))],
                &mut report.diagnostics,
            );
        }

        report.latent = set_on_first(
            &mut graph,
            "EmptyLatentImage",
            &[
                ("width", Value::from(params.width.unwrap_or(defaults.width))),
                (
                    "height",
                    Value::from(params.height.unwrap_or(defaults.height)),
                ),
                ("batch_size", Value::from(LATENT_BATCH_SIZE)),
            ],
            &mut report.diagnostics,
        );

        if let Some(image) = &params.init_image {
            report.load_image = set_on_first(
                &mut graph,
                "LoadImage",
                &[("image", Value::from(image.as_str()))],
                &mut report.diagnostics,
            );
        }

        Ok(Injection { graph, report })
    }
}

/// SDXL encoders take the same text for both towers.
fn write_prompt(graph: &mut ApiGraph, encoder: &str, text: &str) {
    let Some(node) = graph.get_mut(encoder) else {
        return;
    };
    match node.class_type.as_str() {
        "CLIPTextEncode" => node.set_input("text", text),
        "CLIPTextEncodeSDXL" => {
            node.set_input("text_g", text);
            node.set_input("text_l", text);
        }
        _ => {}
    }
}

fn set_on_first(
    graph: &mut ApiGraph,
    class_type: &'static str,
    values: &[(&str, Value)],
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    let Some(id) = graph.first_of_class(class_type) else {
        diagnostics.push(SkipReason::NodeTypeAbsent { class_type });
        return None;
    };
    if let Some(node) = graph.get_mut(&id) {
        for (name, value) in values {
            node.set_input(name, value.clone());
        }
    }
    Some(id)
}
