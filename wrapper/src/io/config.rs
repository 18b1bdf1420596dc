//! Tool configuration stored under `.wrapper/config.yaml`.
//!
//! Every field can be overridden by the same-named environment variable; the
//! resolution lives in [`crate::io::llm`]. A missing file is an empty config.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Wrapper configuration (YAML). Intended to be edited by humans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapperConfig {
    pub llm_provider: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub deepseek_model: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
}

/// Load config from a YAML file. Missing file returns the default.
pub fn load_config(path: &Path) -> Result<WrapperConfig> {
    if !path.exists() {
        return Ok(WrapperConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: WrapperConfig =
        serde_yaml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(config)
}

/// Template written by `wrapper init`.
pub const CONFIG_TEMPLATE: &str = "\
# Wrapper Configuration
# LLM settings - environment variables take precedence

# LLM provider: deepseek, openai, or anthropic
llm_provider: deepseek

# API keys (prefer environment variables for security)
# deepseek_api_key: your-key-here
# openai_api_key: your-key-here
# anthropic_api_key: your-key-here

# Model overrides (optional)
# deepseek_model: deepseek-chat
# openai_model: gpt-4o
# anthropic_model: claude-sonnet-4-20250514
";
