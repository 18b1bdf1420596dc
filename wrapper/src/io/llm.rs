//! Remote text-generation client.
//!
//! One interface, three hosted backends (DeepSeek, OpenAI, Anthropic)
//! selected by an ordered-preference resolution: environment variables beat
//! config-file fields, an explicit provider beats auto-detection, and
//! auto-detection takes the first vendor with a credential. Every call is a
//! single blocking POST with low temperature; failures are surfaced to the
//! operator, never retried.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::io::config::WrapperConfig;

const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 4096;

/// Which fixed system preamble a call runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    StepProposer,
    PromptCompiler,
    Verifier,
    /// Default preamble for everything else (guided init formatting).
    Assistant,
}

impl Role {
    fn system_prompt(self) -> &'static str {
        match self {
            Self::StepProposer => {
                "You are a CONSERVATIVE architecture enforcer. \
                 You propose the SMALLEST, SAFEST next step. \
                 ALWAYS prefer verification over implementation. \
                 ALWAYS prefer cleanup over features. \
                 NEVER propose cross-repo changes. \
                 BLOCK feature work if dependencies are unverified. \
                 When in doubt, propose a verification step. \
                 Output ONLY valid YAML for a step definition. No explanations."
            }
            Self::PromptCompiler => {
                "You are a coding-assistant prompt compiler. \
                 You generate strict, imperative prompts that enforce architectural constraints. \
                 Output ONLY the prompt text. No explanations or markdown."
            }
            Self::Verifier => {
                "You are a strict code verification assistant. \
                 You analyze git diffs against architectural constraints. \
                 Be STRICT. FAIL if any violation is found. \
                 Report violations clearly. Output structured analysis."
            }
            Self::Assistant => "You are a helpful assistant.",
        }
    }
}

/// Typed failure of a model call. Callers must not retry; verify degrades to
/// rule-based checks on it and accept silently skips deviation resolution.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error(
        "No LLM API key configured.\n\
         Set one of:\n\
         \x20 - DEEPSEEK_API_KEY environment variable\n\
         \x20 - OPENAI_API_KEY environment variable\n\
         \x20 - ANTHROPIC_API_KEY environment variable\n\
         Or add to .wrapper/config.yaml:\n\
         \x20 deepseek_api_key: your-key-here"
    )]
    NoCredentials,
    #[error("{vendor} API error {status}: {body}")]
    Api {
        vendor: &'static str,
        status: u16,
        body: String,
    },
    #[error("network error talking to {vendor}: {message}")]
    Transport {
        vendor: &'static str,
        message: String,
    },
    #[error("{vendor} returned an unexpected response: {message}")]
    Malformed {
        vendor: &'static str,
        message: String,
    },
}

/// Abstraction over hosted text-generation backends.
pub trait LlmClient {
    /// Send a role-tagged prompt and return the raw response text.
    fn generate(&self, prompt: &str, role: Role) -> Result<String, LlmError>;
}

fn http_client(vendor: &'static str) -> Result<reqwest::blocking::Client, LlmError> {
    reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|err| LlmError::Transport {
            vendor,
            message: err.to_string(),
        })
}

// OpenAI-style chat completions, shared by DeepSeek and OpenAI.

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[instrument(skip_all, fields(vendor, model))]
fn post_chat(
    http: &reqwest::blocking::Client,
    vendor: &'static str,
    url: &str,
    api_key: &str,
    model: &str,
    prompt: &str,
    role: Role,
) -> Result<String, LlmError> {
    let payload = ChatRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: role.system_prompt(),
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    };

    let response = http
        .post(url)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .map_err(|err| LlmError::Transport {
            vendor,
            message: err.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(LlmError::Api {
            vendor,
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }

    let parsed: ChatResponse = response.json().map_err(|err| LlmError::Malformed {
        vendor,
        message: err.to_string(),
    })?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(LlmError::Malformed {
            vendor,
            message: "empty choices array".to_string(),
        })?;
    debug!(bytes = content.len(), "model response received");
    Ok(content)
}

/// DeepSeek chat-completions backend.
pub struct DeepSeekClient {
    api_key: String,
    model: String,
    http: reqwest::blocking::Client,
}

impl DeepSeekClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEEPSEEK_DEFAULT_MODEL.to_string()),
            http: http_client("DeepSeek")?,
        })
    }
}

impl LlmClient for DeepSeekClient {
    fn generate(&self, prompt: &str, role: Role) -> Result<String, LlmError> {
        post_chat(
            &self.http,
            "DeepSeek",
            DEEPSEEK_API_URL,
            &self.api_key,
            &self.model,
            prompt,
            role,
        )
    }
}

/// OpenAI chat-completions backend.
pub struct OpenAiClient {
    api_key: String,
    model: String,
    http: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            http: http_client("OpenAI")?,
        })
    }
}

impl LlmClient for OpenAiClient {
    fn generate(&self, prompt: &str, role: Role) -> Result<String, LlmError> {
        post_chat(
            &self.http,
            "OpenAI",
            OPENAI_API_URL,
            &self.api_key,
            &self.model,
            prompt,
            role,
        )
    }
}

// Anthropic messages API has its own request/response shape.

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

/// Anthropic messages backend.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    http: reqwest::blocking::Client,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, LlmError> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| ANTHROPIC_DEFAULT_MODEL.to_string()),
            http: http_client("Anthropic")?,
        })
    }
}

impl LlmClient for AnthropicClient {
    #[instrument(skip_all)]
    fn generate(&self, prompt: &str, role: Role) -> Result<String, LlmError> {
        let vendor = "Anthropic";
        let payload = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: role.system_prompt(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .map_err(|err| LlmError::Transport {
                vendor,
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Api {
                vendor,
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let parsed: AnthropicResponse = response.json().map_err(|err| LlmError::Malformed {
            vendor,
            message: err.to_string(),
        })?;
        parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or(LlmError::Malformed {
                vendor,
                message: "empty content array".to_string(),
            })
    }
}

/// Credentials and preferences after env/config merging. Separated from the
/// environment read so selection stays unit-testable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub provider: Option<String>,
    pub deepseek_key: Option<String>,
    pub openai_key: Option<String>,
    pub anthropic_key: Option<String>,
    pub deepseek_model: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
}

/// The vendor a resolution settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    DeepSeek,
    OpenAi,
    Anthropic,
}

/// Merge environment variables over config-file fields.
pub fn gather_credentials(config: &WrapperConfig) -> Credentials {
    let env = |name: &str| std::env::var(name).ok().filter(|value| !value.is_empty());
    Credentials {
        provider: env("LLM_PROVIDER").or_else(|| config.llm_provider.clone()),
        deepseek_key: env("DEEPSEEK_API_KEY").or_else(|| config.deepseek_api_key.clone()),
        openai_key: env("OPENAI_API_KEY").or_else(|| config.openai_api_key.clone()),
        anthropic_key: env("ANTHROPIC_API_KEY").or_else(|| config.anthropic_api_key.clone()),
        deepseek_model: config.deepseek_model.clone(),
        openai_model: config.openai_model.clone(),
        anthropic_model: config.anthropic_model.clone(),
    }
}

/// Ordered-preference selection: explicit provider with a key, then the
/// first available credential (deepseek, openai, anthropic).
pub fn select_provider(credentials: &Credentials) -> Result<Provider, LlmError> {
    match credentials.provider.as_deref() {
        Some("deepseek") if credentials.deepseek_key.is_some() => return Ok(Provider::DeepSeek),
        Some("openai") if credentials.openai_key.is_some() => return Ok(Provider::OpenAi),
        Some("anthropic") if credentials.anthropic_key.is_some() => return Ok(Provider::Anthropic),
        _ => {}
    }
    if credentials.deepseek_key.is_some() {
        Ok(Provider::DeepSeek)
    } else if credentials.openai_key.is_some() {
        Ok(Provider::OpenAi)
    } else if credentials.anthropic_key.is_some() {
        Ok(Provider::Anthropic)
    } else {
        Err(LlmError::NoCredentials)
    }
}

/// Construct the configured client. Fails with a descriptive error before any
/// network call when no credential is available.
pub fn resolve_client(config: &WrapperConfig) -> Result<Box<dyn LlmClient>, LlmError> {
    let credentials = gather_credentials(config);
    let provider = select_provider(&credentials)?;
    debug!(?provider, "resolved model backend");
    let client: Box<dyn LlmClient> = match provider {
        Provider::DeepSeek => Box::new(DeepSeekClient::new(
            credentials.deepseek_key.unwrap_or_default(),
            credentials.deepseek_model,
        )?),
        Provider::OpenAi => Box::new(OpenAiClient::new(
            credentials.openai_key.unwrap_or_default(),
            credentials.openai_model,
        )?),
        Provider::Anthropic => Box::new(AnthropicClient::new(
            credentials.anthropic_key.unwrap_or_default(),
            credentials.anthropic_model,
        )?),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_keys(
        provider: Option<&str>,
        deepseek: bool,
        openai: bool,
        anthropic: bool,
    ) -> Credentials {
        Credentials {
            provider: provider.map(str::to_string),
            deepseek_key: deepseek.then(|| "dk".to_string()),
            openai_key: openai.then(|| "ok".to_string()),
            anthropic_key: anthropic.then(|| "ak".to_string()),
            ..Credentials::default()
        }
    }

    #[test]
    fn explicit_provider_with_key_wins() {
        let creds = with_keys(Some("anthropic"), true, true, true);
        assert_eq!(select_provider(&creds).expect("select"), Provider::Anthropic);
    }

    #[test]
    fn explicit_provider_without_key_falls_back_to_detection() {
        let creds = with_keys(Some("openai"), true, false, false);
        assert_eq!(select_provider(&creds).expect("select"), Provider::DeepSeek);
    }

    #[test]
    fn auto_detection_prefers_deepseek_then_openai() {
        assert_eq!(
            select_provider(&with_keys(None, true, true, true)).expect("select"),
            Provider::DeepSeek
        );
        assert_eq!(
            select_provider(&with_keys(None, false, true, true)).expect("select"),
            Provider::OpenAi
        );
        assert_eq!(
            select_provider(&with_keys(None, false, false, true)).expect("select"),
            Provider::Anthropic
        );
    }

    #[test]
    fn no_credentials_is_a_descriptive_error() {
        let err = select_provider(&with_keys(None, false, false, false)).unwrap_err();
        assert!(err.to_string().contains("DEEPSEEK_API_KEY"));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn verifier_role_has_strict_preamble() {
        assert!(Role::Verifier.system_prompt().contains("STRICT"));
        assert_eq!(Role::Assistant.system_prompt(), "You are a helpful assistant.");
    }
}
