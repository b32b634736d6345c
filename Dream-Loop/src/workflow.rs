use rand::Rng;
use serde::ser::{SerializeMap, SerializeTuple};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

use crate::error::{DreamError, Result};

/// Negative prompt applied to every generation.
pub const NEGATIVE_PROMPT: &str =
    "low quality, blurry, distorted, text, watermark, logo, bad anatomy";

pub const DEFAULT_MODEL: &str = "seedream-v1.safetensors";
pub const DEFAULT_STEPS: u32 = 20;
pub const DEFAULT_CFG_SCALE: f64 = 7.5;
/// Frame rate of the animated output.
pub const ANIMATION_FPS: u32 = 8;

/// Exclusive upper bound for randomly drawn seeds.
const SEED_RANGE: u64 = 1_000_000;

/// Data-flow edge to output slot `slot` of step `step_id`.
/// Serialized as the backend expects: `["4", 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    pub step_id: String,
    pub slot: u32,
}

impl Serialize for StepRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.step_id)?;
        tup.serialize_element(&self.slot)?;
        tup.end()
    }
}

/// A step input: either a literal or a link to another step's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StepInput {
    Link(StepRef),
    Value(Value),
}

impl StepInput {
    fn link(step_id: &str, slot: u32) -> Self {
        StepInput::Link(StepRef {
            step_id: step_id.to_string(),
            slot,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct StepMeta {
    title: String,
}

/// One node of the job graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub inputs: BTreeMap<String, StepInput>,
    pub class_type: String,
    #[serde(rename = "_meta")]
    meta: StepMeta,
}

impl Step {
    fn new(class_type: &str, title: &str) -> Self {
        Self {
            inputs: BTreeMap::new(),
            class_type: class_type.to_string(),
            meta: StepMeta {
                title: title.to_string(),
            },
        }
    }

    fn input(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.inputs
            .insert(name.to_string(), StepInput::Value(value.into()));
        self
    }

    fn link(mut self, name: &str, step_id: &str, slot: u32) -> Self {
        self.inputs
            .insert(name.to_string(), StepInput::link(step_id, slot));
        self
    }

    pub fn label(&self) -> &str {
        &self.meta.title
    }

    /// Links to other steps, in input-name order.
    pub fn references(&self) -> impl Iterator<Item = &StepRef> {
        self.inputs.values().filter_map(|input| match input {
            StepInput::Link(r) => Some(r),
            StepInput::Value(_) => None,
        })
    }
}

/// Declarative job graph, serialized as an ordered `id -> step` object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    steps: Vec<(String, Step)>,
}

impl Workflow {
    fn push(&mut self, id: &str, step: Step) {
        self.steps.push((id.to_string(), step));
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|(sid, _)| sid == id).map(|(_, s)| s)
    }

    pub fn steps(&self) -> impl Iterator<Item = (&str, &Step)> {
        self.steps.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Declaration index of each step id.
    pub fn declaration_order(&self) -> HashMap<&str, usize> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (id.as_str(), i))
            .collect()
    }

    /// Check that every link targets a step declared before it. This also
    /// rules out cycles.
    pub fn validate(&self) -> Result<()> {
        let order = self.declaration_order();
        if order.len() != self.steps.len() {
            return Err(DreamError::InvalidResponse(
                "Workflow contains duplicate step ids".into(),
            ));
        }
        for (index, (id, step)) in self.steps.iter().enumerate() {
            for link in step.references() {
                match order.get(link.step_id.as_str()) {
                    Some(&target) if target < index => {}
                    Some(_) => {
                        return Err(DreamError::InvalidResponse(format!(
                            "Step {} links forward to step {}",
                            id, link.step_id
                        )))
                    }
                    None => {
                        return Err(DreamError::InvalidResponse(format!(
                            "Step {} links to unknown step {}",
                            id, link.step_id
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
}

impl Serialize for Workflow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.steps.len()))?;
        for (id, step) in &self.steps {
            map.serialize_entry(id, step)?;
        }
        map.end()
    }
}

/// Parameters for a looping video workflow.
///
/// `frame_count` becomes the batch size of the latent image: one generated
/// frame per batch slot.
///
/// # Example
/// ```
/// use dream_loop::GenerationParams;
///
/// let (workflow, seed) = GenerationParams::new("a cat morphing into a galaxy")
///     .size(512, 512)
///     .frame_count(16)
///     .steps(25)
///     .build();
///
/// assert!(seed < 1_000_000);
/// assert!(workflow.get("1").is_some()); // checkpoint loader
/// assert!(workflow.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
}

impl GenerationParams {
    /// Create params for a prompt at 1024x576 with 15 frames.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            width: 1024,
            height: 576,
            frame_count: 15,
            seed: None,
            steps: None,
            cfg_scale: None,
            model_path: None,
        }
    }

    /// Set output dimensions.
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the number of frames (latent batch size).
    pub fn frame_count(mut self, frames: u32) -> Self {
        self.frame_count = frames;
        self
    }

    /// Set a specific seed. Unset means a fresh random seed per build.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of sampling steps.
    pub fn steps(mut self, steps: u32) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Set the classifier-free guidance scale.
    pub fn cfg_scale(mut self, cfg: f64) -> Self {
        self.cfg_scale = Some(cfg);
        self
    }

    /// Set the checkpoint file name.
    pub fn model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Build the job graph and resolve the seed.
    ///
    /// Returns `(workflow, actual_seed)`. Steps are declared in dependency
    /// order: checkpoint, latent, positive and negative encodes, sampler,
    /// decode, then the still-image and animated sinks.
    pub fn build(&self) -> (Workflow, u64) {
        let seed = self
            .seed
            .unwrap_or_else(|| rand::rng().random_range(0..SEED_RANGE));
        let model = self.model_path.as_deref().unwrap_or(DEFAULT_MODEL);

        let mut wf = Workflow::default();
        wf.push(
            "1",
            Step::new("CheckpointLoaderSimple", "Load Checkpoint").input("ckpt_name", model),
        );
        wf.push(
            "2",
            Step::new("EmptyLatentImage", "Empty Latent Image")
                .input("width", self.width)
                .input("height", self.height)
                .input("batch_size", self.frame_count),
        );
        wf.push(
            "3",
            Step::new("CLIPTextEncode", "CLIP Text Encode (Positive)")
                .input("text", self.prompt.as_str())
                .link("clip", "1", 1),
        );
        wf.push(
            "4",
            Step::new("CLIPTextEncode", "CLIP Text Encode (Negative)")
                .input("text", NEGATIVE_PROMPT)
                .link("clip", "1", 1),
        );
        wf.push(
            "5",
            Step::new("KSampler", "KSampler")
                .input("seed", seed)
                .input("steps", self.steps.unwrap_or(DEFAULT_STEPS))
                .input("cfg", self.cfg_scale.unwrap_or(DEFAULT_CFG_SCALE))
                .input("sampler_name", "euler")
                .input("scheduler", "normal")
                .input("denoise", 1.0)
                .link("model", "1", 0)
                .link("positive", "3", 0)
                .link("negative", "4", 0)
                .link("latent_image", "2", 0),
        );
        wf.push(
            "6",
            Step::new("VAEDecode", "VAE Decode")
                .link("samples", "5", 0)
                .link("vae", "1", 2),
        );
        wf.push(
            "7",
            Step::new("SaveImage", "Save Image")
                .input("filename_prefix", "seedream_loop")
                .link("images", "6", 0),
        );
        wf.push(
            "8",
            Step::new("SaveAnimatedWEBP", "Save Animated Video")
                .link("images", "6", 0)
                .input("fps", ANIMATION_FPS)
                .input("loop_count", 0)
                .input("filename_prefix", "dream_loop")
                .input("format", "image/gif")
                .input("pingpong", false)
                .input("save_output", true),
        );

        (wf, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_params() -> GenerationParams {
        GenerationParams::new("Seamless infinite loop: cat morphing into galaxy")
            .size(1024, 576)
            .frame_count(15)
            .seed(12345)
            .steps(20)
            .cfg_scale(7.5)
            .model_path("seedream-v1.safetensors")
    }

    #[test]
    fn test_build_has_all_nodes() {
        let (workflow, _) = make_params().build();
        assert_eq!(workflow.len(), 8);
        for i in 1..=8 {
            assert!(workflow.get(&i.to_string()).is_some(), "Missing node {}", i);
        }
    }

    #[test]
    fn test_references_resolve() {
        for frames in [1, 8, 15, 64] {
            let (workflow, _) = make_params().frame_count(frames).build();
            assert!(workflow.validate().is_ok());
            let order = workflow.declaration_order();
            for (_, step) in workflow.steps() {
                for link in step.references() {
                    assert!(order.contains_key(link.step_id.as_str()));
                }
            }
        }
    }

    #[test]
    fn test_validate_rejects_unknown_link() {
        let mut wf = Workflow::default();
        wf.push("1", Step::new("VAEDecode", "VAE Decode").link("samples", "9", 0));
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_forward_link() {
        let mut wf = Workflow::default();
        wf.push("1", Step::new("VAEDecode", "VAE Decode").link("samples", "2", 0));
        wf.push("2", Step::new("KSampler", "KSampler"));
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_ksampler_settings() {
        let (workflow, seed) = make_params().build();
        let value = workflow.to_value();
        let node = &value["5"];
        assert_eq!(node["class_type"], "KSampler");
        assert_eq!(node["inputs"]["seed"], 12345);
        assert_eq!(seed, 12345);
        assert_eq!(node["inputs"]["steps"], 20);
        assert_eq!(node["inputs"]["cfg"], 7.5);
        assert_eq!(node["inputs"]["sampler_name"], "euler");
        assert_eq!(node["inputs"]["scheduler"], "normal");
        assert_eq!(node["inputs"]["denoise"], 1.0);
    }

    #[test]
    fn test_defaults_applied() {
        let (workflow, seed) = GenerationParams::new("test").build();
        let value = workflow.to_value();
        assert!(seed < SEED_RANGE);
        assert_eq!(value["5"]["inputs"]["seed"], seed);
        assert_eq!(value["5"]["inputs"]["steps"], DEFAULT_STEPS);
        assert_eq!(value["5"]["inputs"]["cfg"], DEFAULT_CFG_SCALE);
        assert_eq!(value["1"]["inputs"]["ckpt_name"], DEFAULT_MODEL);
    }

    #[test]
    fn test_frame_count_is_batch_size() {
        let (workflow, _) = make_params().size(640, 360).frame_count(24).build();
        let value = workflow.to_value();
        assert_eq!(value["2"]["inputs"]["width"], 640);
        assert_eq!(value["2"]["inputs"]["height"], 360);
        assert_eq!(value["2"]["inputs"]["batch_size"], 24);
    }

    #[test]
    fn test_text_encodes() {
        let (workflow, _) = make_params().build();
        let value = workflow.to_value();
        assert_eq!(
            value["3"]["inputs"]["text"],
            "Seamless infinite loop: cat morphing into galaxy"
        );
        assert_eq!(value["3"]["inputs"]["clip"], json!(["1", 1]));
        assert_eq!(value["4"]["inputs"]["text"], NEGATIVE_PROMPT);
        assert_eq!(value["4"]["_meta"]["title"], "CLIP Text Encode (Negative)");
    }

    #[test]
    fn test_node_connections() {
        let (workflow, _) = make_params().build();
        let value = workflow.to_value();
        assert_eq!(value["5"]["inputs"]["model"], json!(["1", 0]));
        assert_eq!(value["5"]["inputs"]["positive"], json!(["3", 0]));
        assert_eq!(value["5"]["inputs"]["negative"], json!(["4", 0]));
        assert_eq!(value["5"]["inputs"]["latent_image"], json!(["2", 0]));
        assert_eq!(value["6"]["inputs"]["samples"], json!(["5", 0]));
        assert_eq!(value["6"]["inputs"]["vae"], json!(["1", 2]));
        assert_eq!(value["7"]["inputs"]["images"], json!(["6", 0]));
        assert_eq!(value["8"]["inputs"]["images"], json!(["6", 0]));
    }

    #[test]
    fn test_animated_sink() {
        let (workflow, _) = make_params().build();
        let step = workflow.get("8").unwrap();
        assert_eq!(step.class_type, "SaveAnimatedWEBP");
        assert_eq!(step.label(), "Save Animated Video");
        let value = workflow.to_value();
        assert_eq!(value["8"]["inputs"]["fps"], 8);
        assert_eq!(value["8"]["inputs"]["loop_count"], 0);
        assert_eq!(value["7"]["inputs"]["filename_prefix"], "seedream_loop");
    }

    #[test]
    fn test_serialized_key_order() {
        let (workflow, _) = make_params().build();
        let text = serde_json::to_string(&workflow).unwrap();
        let first = text.find("\"1\":").unwrap();
        let last = text.find("\"8\":").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_params_serialize_camel_case() {
        let json = serde_json::to_value(make_params()).unwrap();
        assert_eq!(json["frameCount"], 15);
        assert_eq!(json["cfgScale"], 7.5);
        assert_eq!(json["modelPath"], "seedream-v1.safetensors");
    }
}
