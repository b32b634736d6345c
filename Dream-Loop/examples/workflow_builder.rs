//! Build a dream-loop job graph and print the JSON that would be submitted.
//!
//! ```sh
//! cargo run --example workflow_builder
//! ```

use dream_loop::{loop_prompt, DreamElements, GenerationParams};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let prompt = loop_prompt(&DreamElements::new("cat", "galaxy", "waterfall"));

    let (workflow, seed) = GenerationParams::new(prompt)
        .size(768, 432)
        .frame_count(24)
        .steps(30)
        .cfg_scale(7.0)
        .seed(42)
        .model_path("dreamshaper_8.safetensors")
        .build();
    workflow.validate()?;

    for (id, step) in workflow.steps() {
        println!("{:>2}: {:<24} {}", id, step.class_type, step.label());
    }
    println!("\nWorkflow JSON:");
    println!("{}", serde_json::to_string_pretty(&workflow)?);
    println!("\nSeed: {}", seed);

    Ok(())
}
