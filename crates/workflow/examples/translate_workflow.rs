/// Workflow translation example
///
/// Converts a small UI-saved workflow to API format, injects a prompt and
/// prints the document that would be queued on the server.
///
/// Run with:
/// cargo run --example translate_workflow --package workflow
use serde_json::json;
use workflow::{translate, GenerationParams, TranslatorConfig};

fn main() -> workflow::Result<()> {
    let document = json!({
        "nodes": [
            {"id": 4, "type": "CheckpointLoaderSimple", "widgets_values": ["v1-5-pruned.safetensors"]},
            {"id": 5, "type": "EmptyLatentImage", "widgets_values": [512, 512, 1]},
            {"id": 6, "type": "CLIPTextEncode",
             "inputs": [{"name": "clip", "link": 3}], "widgets_values": [""]},
            {"id": 7, "type": "CLIPTextEncode",
             "inputs": [{"name": "clip", "link": 4}], "widgets_values": [""]},
            {"id": 3, "type": "KSampler",
             "inputs": [
                 {"name": "model", "link": 5},
                 {"name": "positive", "link": 1},
                 {"name": "negative", "link": 2},
                 {"name": "latent_image", "link": 6}
             ],
             "widgets_values": [0, "randomize", 20, 7.0, "euler", "normal", 1.0]}
        ],
        "links": [
            [1, 6, 0, 3, 1, "CONDITIONING"],
            [2, 7, 0, 3, 2, "CONDITIONING"],
            [3, 4, 1, 6, 0, "CLIP"],
            [4, 4, 1, 7, 0, "CLIP"],
            [5, 4, 0, 3, 0, "MODEL"],
            [6, 5, 0, 3, 3, "LATENT"]
        ]
    });

    let params = GenerationParams {
        prompt: Some("a lighthouse at dusk, oil painting".into()),
        negative_prompt: Some("blurry, lowres".into()),
        width: Some(768),
        height: Some(512),
        ..Default::default()
    };

    let translation = translate(
        document,
        "sd_xl_base_1.0.safetensors",
        &params,
        &TranslatorConfig::default(),
    )?;

    println!("=== {} workflow ===", translation.format);
    println!("Sampler: node {}", translation.report.sampler);
    println!("Seed: {}", translation.report.seed);
    for reason in &translation.diagnostics {
        println!("Skipped: {}", reason);
    }
    println!("{}", serde_json::to_string_pretty(&translation.graph)?);

    Ok(())
}
