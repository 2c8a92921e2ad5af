// src/generator/workflow.rs
// Typed ComfyUI workflow graph. Templates build the node map once; the
// generator then injects the prompt and generation parameters through named
// slots instead of raw string keys into an opaque mapping.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{LimnerError, Result};

// Conventional node ids, shared with user-supplied workflow files.
const POSITIVE_PROMPT: &str = "3";
const CHECKPOINT: &str = "4";
const DIMENSIONS: &str = "5";
const SAMPLER: &str = "6";
const NEGATIVE_PROMPT: &str = "7";
const VAE_DECODE: &str = "8";
const SAVE_IMAGE: &str = "9";
const LOAD_IMAGE: &str = "10";
const VAE_ENCODE: &str = "11";

/// Built-in template families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowTemplate {
    Basic,
    Sdxl,
    Flux,
    Img2Img,
}

impl WorkflowTemplate {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(Self::Basic),
            "sdxl" => Some(Self::Sdxl),
            "flux" => Some(Self::Flux),
            "img2img" => Some(Self::Img2Img),
            _ => None,
        }
    }

    fn checkpoint(self) -> &'static str {
        match self {
            Self::Basic => "sdxl.safetensors",
            Self::Sdxl | Self::Img2Img => "sd_xl_base_1.0.safetensors",
            Self::Flux => "flux1-dev.safetensors",
        }
    }

    fn cfg(self) -> f64 {
        match self {
            // Flux distilled checkpoints run without classifier-free guidance
            Self::Flux => 1.0,
            _ => 7.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub class_type: String,
    pub inputs: Map<String, Value>,
}

fn node(class_type: &str, inputs: Value) -> Node {
    let inputs = match inputs {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Node {
        class_type: class_type.to_string(),
        inputs,
    }
}

/// Parameters injected into the sampler and dimension slots.
#[derive(Debug, Clone)]
pub struct GenParams {
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub sampler: String,
    pub denoise: f32,
}

/// A generation job graph plus the slot ids the injection targets live at.
#[derive(Debug, Clone)]
pub struct Workflow {
    nodes: BTreeMap<String, Node>,
}

impl Workflow {
    /// Build one of the built-in graphs. `Img2Img` needs a resolvable base
    /// image; the other templates ignore it.
    pub fn from_template(template: WorkflowTemplate, base_image: Option<&str>) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            POSITIVE_PROMPT.to_string(),
            node("CLIPTextEncode", json!({"text": "", "clip": [CHECKPOINT, 1]})),
        );
        nodes.insert(
            CHECKPOINT.to_string(),
            node(
                "CheckpointLoaderSimple",
                json!({"ckpt_name": template.checkpoint()}),
            ),
        );
        nodes.insert(
            DIMENSIONS.to_string(),
            node(
                "EmptyLatentImage",
                json!({"width": 512, "height": 768, "batch_size": 1}),
            ),
        );
        nodes.insert(
            SAMPLER.to_string(),
            node(
                "KSampler",
                json!({
                    "model": [CHECKPOINT, 0],
                    "positive": [POSITIVE_PROMPT, 0],
                    "negative": [NEGATIVE_PROMPT, 0],
                    "latent_image": [DIMENSIONS, 0],
                    "steps": 20,
                    "seed": 0,
                    "cfg": template.cfg(),
                    "sampler_name": "euler",
                    "scheduler": "normal",
                    "denoise": 1.0,
                }),
            ),
        );
        nodes.insert(
            NEGATIVE_PROMPT.to_string(),
            node(
                "CLIPTextEncode",
                json!({"text": "bad quality", "clip": [CHECKPOINT, 1]}),
            ),
        );
        nodes.insert(
            VAE_DECODE.to_string(),
            node(
                "VAEDecode",
                json!({"samples": [SAMPLER, 0], "vae": [CHECKPOINT, 2]}),
            ),
        );
        nodes.insert(
            SAVE_IMAGE.to_string(),
            node(
                "SaveImage",
                json!({"filename_prefix": "limner", "images": [VAE_DECODE, 0]}),
            ),
        );

        let mut workflow = Self { nodes };
        if template == WorkflowTemplate::Img2Img {
            let base = base_image.ok_or(LimnerError::MissingBaseImage)?;
            workflow.rewire_for_img2img(base);
        }
        Ok(workflow)
    }

    /// Wrap a user-supplied graph verbatim. Injection targets the
    /// conventional slot ids; nodes the graph does not have are left alone.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(LimnerError::MalformedResponse(
                "workflow JSON is not an object".to_string(),
            ));
        };
        let mut nodes = BTreeMap::new();
        for (id, raw) in map {
            let class_type = raw
                .get("class_type")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let inputs = raw
                .get("inputs")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();
            nodes.insert(id, Node { class_type, inputs });
        }
        Ok(Self { nodes })
    }

    /// Switch the sampler to the advanced variant fed from an encoded base
    /// image, with explicit noise-add control.
    fn rewire_for_img2img(&mut self, base_image: &str) {
        self.nodes.insert(
            LOAD_IMAGE.to_string(),
            node("LoadImage", json!({"image": base_image})),
        );
        self.nodes.insert(
            VAE_ENCODE.to_string(),
            node(
                "VAEEncode",
                json!({"pixels": [LOAD_IMAGE, 0], "vae": [CHECKPOINT, 2]}),
            ),
        );
        if let Some(sampler) = self.nodes.get_mut(SAMPLER) {
            sampler.class_type = "KSamplerAdvanced".to_string();
            sampler
                .inputs
                .insert("latent_image".to_string(), json!([VAE_ENCODE, 0]));
            sampler.inputs.insert("add_noise".to_string(), json!("enable"));
            sampler.inputs.insert("start_at_step".to_string(), json!(0));
        }
    }

    /// Inject the positive prompt text.
    pub fn set_prompt(&mut self, prompt: &str) {
        self.set_input(POSITIVE_PROMPT, "text", json!(prompt));
    }

    /// Inject steps, seed, sampler name and latent dimensions. The seed slot
    /// name depends on the sampler variant; denoise strength only applies to
    /// the advanced (img2img) sampler.
    pub fn apply_params(&mut self, params: &GenParams) {
        self.set_input(DIMENSIONS, "width", json!(params.width));
        self.set_input(DIMENSIONS, "height", json!(params.height));
        self.set_input(SAMPLER, "steps", json!(params.steps));
        self.set_input(SAMPLER, "sampler_name", json!(params.sampler));

        let advanced = self
            .nodes
            .get(SAMPLER)
            .map(|n| n.class_type == "KSamplerAdvanced")
            .unwrap_or(false);
        if advanced {
            self.set_input(SAMPLER, "noise_seed", json!(params.seed));
            self.set_input(SAMPLER, "denoise", json!(params.denoise));
            self.set_input(SAMPLER, "end_at_step", json!(params.steps));
        } else {
            self.set_input(SAMPLER, "seed", json!(params.seed));
        }
    }

    fn set_input(&mut self, id: &str, key: &str, value: Value) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.inputs.insert(key.to_string(), value);
        }
    }

    pub(crate) fn node_class(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).map(|n| n.class_type.as_str())
    }

    /// The node map in the shape the submission endpoint expects.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.nodes).unwrap_or_else(|_| json!({}))
    }
}
