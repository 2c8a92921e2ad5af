//! Image generation against a local ComfyUI server: build or load a
//! workflow, submit it, poll the job history until an output image shows up,
//! and hand back a viewable URL. A bounded cache makes repeated prompts an
//! at-most-once generation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LimnerConfig;
use crate::error::{LimnerError, Result};

pub mod cache;
pub mod workflow;

use cache::ImageCache;
use workflow::{GenParams, Workflow, WorkflowTemplate};

/// Port the orchestrator generates images through.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Returns a viewable URL for an image matching `prompt`. `avatar` is the
    /// active character's image, used as the img2img base when configured.
    async fn generate(
        &self,
        prompt: &str,
        style: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<String>;
}

pub struct ComfyGenerator {
    client: Client,
    config: Arc<LimnerConfig>,
    template: WorkflowTemplate,
    cache: Mutex<ImageCache>,
}

impl ComfyGenerator {
    pub fn new(config: Arc<LimnerConfig>) -> Result<Self> {
        let client = config.http_client()?;
        let template = WorkflowTemplate::parse(&config.workflow_template).unwrap_or_else(|| {
            warn!(
                name = %config.workflow_template,
                "unknown workflow template, using basic txt2img"
            );
            WorkflowTemplate::Basic
        });
        let cache = Mutex::new(ImageCache::new(config.cache_capacity));
        Ok(Self {
            client,
            config,
            template,
            cache,
        })
    }

    fn resolve_base_image<'a>(&'a self, avatar: Option<&'a str>) -> Option<&'a str> {
        if !self.config.custom_base_image.is_empty() {
            return Some(&self.config.custom_base_image);
        }
        if self.config.use_role_image {
            return avatar.filter(|a| !a.is_empty());
        }
        None
    }

    fn gen_params(&self) -> GenParams {
        let seed = if self.config.gen_seed < 0 {
            rand::rng().random::<u32>() as u64
        } else {
            self.config.gen_seed as u64
        };
        GenParams {
            steps: self.config.gen_steps,
            width: self.config.gen_width,
            height: self.config.gen_height,
            seed,
            sampler: self.config.gen_sampler.clone(),
            denoise: self.config.img_strength,
        }
    }

    async fn load_workflow(&self, base_image: Option<&str>) -> Result<Workflow> {
        let path = &self.config.workflow_path;
        if path.is_empty() {
            return Workflow::from_template(self.template, base_image);
        }

        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            let response = self.client.get(path).send().await?;
            if !response.status().is_success() {
                return Err(LimnerError::WorkflowLoad {
                    path: path.clone(),
                    reason: format!("status {}", response.status()),
                });
            }
            response.text().await?
        } else {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LimnerError::WorkflowLoad {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
        };

        let value: Value =
            serde_json::from_str(&raw).map_err(|e| LimnerError::WorkflowLoad {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Workflow::from_value(value)
    }

    async fn submit(&self, workflow: &Workflow) -> Result<String> {
        let body = json!({
            "prompt": workflow.to_value(),
            "client_id": Uuid::new_v4().to_string(),
        });
        let response = self
            .client
            .post(self.config.comfy_endpoint("/prompt"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LimnerError::Transport {
                service: "ComfyUI",
                status,
                body,
            });
        }

        let value: Value = response.json().await?;
        value["prompt_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                LimnerError::MalformedResponse(
                    "no prompt_id in ComfyUI submission response".to_string(),
                )
            })
    }

    async fn poll(&self, prompt_id: &str) -> Result<String> {
        match timeout(self.config.poll_timeout(), self.poll_until_complete(prompt_id)).await {
            Ok(result) => result,
            Err(_) => Err(LimnerError::PollTimeout {
                prompt_id: prompt_id.to_string(),
                timeout_secs: self.config.poll_timeout_secs,
            }),
        }
    }

    async fn poll_until_complete(&self, prompt_id: &str) -> Result<String> {
        let url = self.config.comfy_endpoint(&format!("/history/{prompt_id}"));
        loop {
            let response = self.client.get(&url).send().await?;
            if response.status().is_success() {
                let history: Value = response.json().await?;
                if let Some(image_url) = self.first_output_image(&history[prompt_id]) {
                    return Ok(image_url);
                }
            }
            sleep(self.config.poll_interval()).await;
        }
    }

    /// First output node carrying an `images` entry wins; user workflows do
    /// not all save from the same node id.
    fn first_output_image(&self, entry: &Value) -> Option<String> {
        let outputs = entry.get("outputs")?.as_object()?;
        for node in outputs.values() {
            let Some(image) = node.get("images").and_then(|images| images.get(0)) else {
                continue;
            };
            let filename = image.get("filename")?.as_str()?;
            let subfolder = image.get("subfolder").and_then(Value::as_str).unwrap_or("");
            let kind = image.get("type").and_then(Value::as_str).unwrap_or("output");
            return Some(format!(
                "{}?filename={}&subfolder={}&type={}",
                self.config.comfy_endpoint("/view"),
                urlencoding::encode(filename),
                urlencoding::encode(subfolder),
                urlencoding::encode(kind),
            ));
        }
        None
    }
}

#[async_trait]
impl ImageService for ComfyGenerator {
    async fn generate(
        &self,
        prompt: &str,
        style: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<String> {
        let key = cache_key(prompt, style);
        if self.config.cache_images {
            let hit = self
                .cache
                .lock()
                .expect("image cache lock poisoned")
                .get(&key);
            if let Some(url) = hit {
                debug!("image cache hit");
                return Ok(url);
            }
        }

        let base_image = self.resolve_base_image(avatar);
        let mut workflow = self.load_workflow(base_image).await?;
        workflow.set_prompt(prompt);
        workflow.apply_params(&self.gen_params());
        debug!(sampler = ?workflow.node_class("6"), "workflow prepared");

        let prompt_id = self.submit(&workflow).await?;
        info!(%prompt_id, "image job submitted");
        let url = self.poll(&prompt_id).await?;

        if self.config.cache_images {
            self.cache
                .lock()
                .expect("image cache lock poisoned")
                .insert(key, url.clone());
        }
        Ok(url)
    }
}

fn cache_key(prompt: &str, style: Option<&str>) -> String {
    format!("{}::{}", prompt, style.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(config: LimnerConfig) -> ComfyGenerator {
        ComfyGenerator::new(Arc::new(config)).unwrap()
    }

    #[test]
    fn cache_key_distinguishes_style() {
        assert_ne!(cache_key("cat", None), cache_key("cat", Some("ink")));
        assert_eq!(cache_key("cat", Some("ink")), cache_key("cat", Some("ink")));
    }

    #[test]
    fn custom_base_image_wins_over_avatar() {
        let mut config = LimnerConfig::default();
        config.custom_base_image = "base.png".to_string();
        let comfy = generator(config);
        assert_eq!(comfy.resolve_base_image(Some("avatar.png")), Some("base.png"));
    }

    #[test]
    fn avatar_used_only_when_role_image_enabled() {
        let mut config = LimnerConfig::default();
        config.use_role_image = false;
        let comfy = generator(config);
        assert_eq!(comfy.resolve_base_image(Some("avatar.png")), None);

        let comfy = generator(LimnerConfig::default());
        assert_eq!(
            comfy.resolve_base_image(Some("avatar.png")),
            Some("avatar.png")
        );
        assert_eq!(comfy.resolve_base_image(Some("")), None);
        assert_eq!(comfy.resolve_base_image(None), None);
    }

    #[test]
    fn fixed_seed_is_passed_through() {
        let mut config = LimnerConfig::default();
        config.gen_seed = 1234;
        let comfy = generator(config);
        assert_eq!(comfy.gen_params().seed, 1234);
    }

    #[test]
    fn history_entry_without_outputs_is_incomplete() {
        let comfy = generator(LimnerConfig::default());
        assert!(comfy.first_output_image(&json!({})).is_none());
        assert!(
            comfy
                .first_output_image(&json!({"outputs": {"9": {"text": []}}}))
                .is_none()
        );
    }

    #[test]
    fn view_url_is_percent_encoded() {
        let comfy = generator(LimnerConfig::default());
        let entry = json!({
            "outputs": {
                "9": {"images": [{"filename": "limner 0001.png", "subfolder": "", "type": "output"}]}
            }
        });
        let url = comfy.first_output_image(&entry).unwrap();
        assert_eq!(
            url,
            "http://127.0.0.1:8188/view?filename=limner%200001.png&subfolder=&type=output"
        );
    }
}
