// src/config/mod.rs
// All tunables live here. Every key has a default; missing or unparsable
// environment values fall back to it. The struct is built once at startup
// and passed by reference into each component.

use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LimnerConfig {
    // ── Pipeline switches
    pub enabled: bool,
    pub auto_trigger: bool,
    pub verbose: bool,
    pub retry_count: u32,

    // ── Analysis model
    pub ai_provider: String,
    pub ai_api_key: String,
    pub ai_model: String,
    pub ai_base_url: String,
    pub proxy_url: String,
    pub prompt_template: String,

    // ── Image server
    pub comfy_url: String,
    pub workflow_path: String,
    pub workflow_template: String,

    // ── Generation parameters
    pub gen_steps: u32,
    pub gen_width: u32,
    pub gen_height: u32,
    pub gen_seed: i64,
    pub gen_sampler: String,
    pub img_strength: f32,

    // ── Selection & caching
    pub min_score: f32,
    pub cache_images: bool,
    pub cache_capacity: usize,
    pub use_role_image: bool,
    pub custom_base_image: String,
    pub default_styles: String,

    // ── ComfyUI polling
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,

    // ── Server Configuration
    pub host: String,
    pub port: u16,

    // ── Logging Configuration
    pub log_level: String,
}

pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"Analyze this chat reply: "{{reply}}". Suggest positions to insert illustrative images (sentence index, 0-based) and write a descriptive image-generation prompt for each, grounded in the reply's content. Add base styles like "masterpiece, best quality, detailed background, high resolution". Output JSON only: {"positions": [{"index": number, "prompt": "string", "style": "optional style", "score": number}]}"#;

fn env_var_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(val) => {
            // Trim whitespace and strip inline comments before parsing
            let clean_val = val.split('#').next().unwrap_or("").trim();
            match clean_val.parse::<T>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    eprintln!("Config: {} = '{}' (parse failed, using default)", key, val);
                    default
                }
            }
        }
        Err(_) => default,
    }
}

impl Default for LimnerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_trigger: true,
            verbose: true,
            retry_count: 2,
            ai_provider: "openai".to_string(),
            ai_api_key: String::new(),
            ai_model: "gpt-4o".to_string(),
            ai_base_url: "https://api.openai.com/v1".to_string(),
            proxy_url: String::new(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            comfy_url: "http://127.0.0.1:8188".to_string(),
            workflow_path: String::new(),
            workflow_template: "basic".to_string(),
            gen_steps: 20,
            gen_width: 512,
            gen_height: 768,
            gen_seed: -1,
            gen_sampler: "euler_ancestral".to_string(),
            img_strength: 0.7,
            min_score: 0.5,
            cache_images: true,
            cache_capacity: 256,
            use_role_image: true,
            custom_base_image: String::new(),
            default_styles: "masterpiece, best quality, detailed".to_string(),
            poll_interval_secs: 5,
            poll_timeout_secs: 300,
            host: "127.0.0.1".to_string(),
            port: 8189,
            log_level: "info".to_string(),
        }
    }
}

impl LimnerConfig {
    pub fn from_env() -> Self {
        // Load from .env file first if it exists
        if dotenvy::dotenv().is_err() {
            eprintln!("Warning: .env file not found. Using environment variables and defaults.");
        }

        let d = Self::default();
        Self {
            enabled: env_var_or("LIMNER_ENABLED", d.enabled),
            auto_trigger: env_var_or("LIMNER_AUTO_TRIGGER", d.auto_trigger),
            verbose: env_var_or("LIMNER_VERBOSE", d.verbose),
            retry_count: env_var_or("LIMNER_RETRY_COUNT", d.retry_count),
            ai_provider: env_var_or("LIMNER_AI_PROVIDER", d.ai_provider),
            ai_api_key: env_var_or("LIMNER_AI_API_KEY", d.ai_api_key),
            ai_model: env_var_or("LIMNER_AI_MODEL", d.ai_model),
            ai_base_url: env_var_or("LIMNER_AI_BASE_URL", d.ai_base_url),
            proxy_url: env_var_or("LIMNER_PROXY_URL", d.proxy_url),
            prompt_template: env_var_or("LIMNER_PROMPT_TEMPLATE", d.prompt_template),
            comfy_url: env_var_or("LIMNER_COMFY_URL", d.comfy_url),
            workflow_path: env_var_or("LIMNER_WORKFLOW_PATH", d.workflow_path),
            workflow_template: env_var_or("LIMNER_WORKFLOW_TEMPLATE", d.workflow_template),
            gen_steps: env_var_or("LIMNER_GEN_STEPS", d.gen_steps),
            gen_width: env_var_or("LIMNER_GEN_WIDTH", d.gen_width),
            gen_height: env_var_or("LIMNER_GEN_HEIGHT", d.gen_height),
            gen_seed: env_var_or("LIMNER_GEN_SEED", d.gen_seed),
            gen_sampler: env_var_or("LIMNER_GEN_SAMPLER", d.gen_sampler),
            img_strength: env_var_or("LIMNER_IMG_STRENGTH", d.img_strength),
            min_score: env_var_or("LIMNER_MIN_SCORE", d.min_score),
            cache_images: env_var_or("LIMNER_CACHE_IMAGES", d.cache_images),
            cache_capacity: env_var_or("LIMNER_CACHE_CAPACITY", d.cache_capacity),
            use_role_image: env_var_or("LIMNER_USE_ROLE_IMAGE", d.use_role_image),
            custom_base_image: env_var_or("LIMNER_CUSTOM_BASE_IMAGE", d.custom_base_image),
            default_styles: env_var_or("LIMNER_DEFAULT_STYLES", d.default_styles),
            poll_interval_secs: env_var_or("LIMNER_POLL_INTERVAL", d.poll_interval_secs),
            poll_timeout_secs: env_var_or("LIMNER_POLL_TIMEOUT", d.poll_timeout_secs),
            host: env_var_or("LIMNER_HOST", d.host),
            port: env_var_or("LIMNER_PORT", d.port),
            log_level: env_var_or("LIMNER_LOG_LEVEL", d.log_level),
        }
    }

    // --- Convenience Methods for Common Operations ---

    /// Full URL for a ComfyUI endpoint
    pub fn comfy_endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.comfy_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// HTTP client honoring the optional proxy. Shared by analyzer and generator.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if !self.proxy_url.is_empty() {
            builder = builder.proxy(reqwest::Proxy::all(&self.proxy_url)?);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LimnerConfig::default();

        assert!(config.enabled);
        assert!(config.auto_trigger);
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.ai_provider, "openai");
        assert_eq!(config.min_score, 0.5);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.poll_timeout_secs, 300);
        assert!(config.prompt_template.contains("{{reply}}"));
        assert!(config.prompt_template.contains("positions"));
    }

    #[test]
    fn test_convenience_methods() {
        let config = LimnerConfig::default();

        assert_eq!(
            config.comfy_endpoint("/prompt"),
            "http://127.0.0.1:8188/prompt"
        );
        assert_eq!(config.bind_address(), "127.0.0.1:8189");
        assert_eq!(config.poll_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_env_var_fallback_on_parse_failure() {
        // SAFETY: test-only env mutation, key is unique to this test
        unsafe { std::env::set_var("LIMNER_TEST_BOGUS_NUM", "not-a-number") };
        let parsed: u32 = env_var_or("LIMNER_TEST_BOGUS_NUM", 7);
        assert_eq!(parsed, 7);
        unsafe { std::env::remove_var("LIMNER_TEST_BOGUS_NUM") };
    }
}
