use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChalklineError, ChalklineResult};

/// Ordered narration for one topic. Produced once per run, immutable after.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub topic: String,
    pub scenes: Vec<ScriptScene>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptScene {
    pub scene_id: u32,
    pub text: String,
}

impl Script {
    pub fn from_lines(topic: impl Into<String>, lines: impl IntoIterator<Item = String>) -> Self {
        Self {
            topic: topic.into(),
            scenes: lines
                .into_iter()
                .enumerate()
                .map(|(i, text)| ScriptScene {
                    scene_id: i as u32 + 1,
                    text,
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> ChalklineResult<()> {
        if self.topic.trim().is_empty() {
            return Err(ChalklineError::validation("script topic must be non-empty"));
        }
        if self.scenes.is_empty() {
            return Err(ChalklineError::validation(
                "script must contain at least one scene",
            ));
        }
        for (i, scene) in self.scenes.iter().enumerate() {
            if scene.scene_id != i as u32 + 1 {
                return Err(ChalklineError::validation(format!(
                    "scene ids must be 1-based and contiguous (index {i} has id {})",
                    scene.scene_id
                )));
            }
            if scene.text.trim().is_empty() {
                return Err(ChalklineError::validation(format!(
                    "scene {} has empty text",
                    scene.scene_id
                )));
            }
        }
        Ok(())
    }
}

/// Which path produced the script. The fallback is a first-class outcome, not
/// an error the caller has to intercept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptOrigin {
    Remote,
    Fallback,
}

#[derive(Clone, Debug)]
pub struct GeneratedScript {
    pub script: Script,
    pub origin: ScriptOrigin,
}

/// Remote chat-completions configuration.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    /// Environment variable holding the bearer token. Absence selects the
    /// offline fallback without contacting the endpoint.
    pub api_key_env: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout: Duration::from_secs(15),
            temperature: 0.2,
            max_tokens: 200,
        }
    }
}

// Wire types for the OpenAI-compatible chat endpoint. Only the fields we
// send/read; unknown response fields are ignored.

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Clone, Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Clone, Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Script generator with a remote-first, fallback-always contract.
///
/// One synchronous request per invocation; no retries, no caching.
pub struct ScriptGenerator {
    client: reqwest::blocking::Client,
    cfg: LlmConfig,
}

impl ScriptGenerator {
    pub fn new(cfg: LlmConfig) -> ChalklineResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("chalkline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChalklineError::script(format!("failed to build http client: {e}")))?;
        Ok(Self { client, cfg })
    }

    /// Generate a script for `topic`. Never fails: missing credential or any
    /// remote error routes to [`fallback_script`].
    pub fn generate(&self, topic: &str) -> GeneratedScript {
        let Ok(api_key) = std::env::var(&self.cfg.api_key_env) else {
            tracing::info!(env = %self.cfg.api_key_env, "no api key configured, using fallback script");
            return GeneratedScript {
                script: fallback_script(topic),
                origin: ScriptOrigin::Fallback,
            };
        };

        match self.request_remote(topic, &api_key) {
            Ok(script) => GeneratedScript {
                script,
                origin: ScriptOrigin::Remote,
            },
            Err(err) => {
                tracing::warn!(error = %err, "remote script generation failed, using fallback");
                GeneratedScript {
                    script: fallback_script(topic),
                    origin: ScriptOrigin::Fallback,
                }
            }
        }
    }

    /// The remote path on its own, for callers (and tests) that want the
    /// error instead of the fallback.
    pub fn request_remote(&self, topic: &str, api_key: &str) -> ChalklineResult<Script> {
        let request = ChatRequest {
            model: &self.cfg.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You generate short educational explanations.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!(
                        "Explain '{topic}' in 3 to 5 short sentences each sentence no more that 8 words, one per line."
                    ),
                },
            ],
            temperature: self.cfg.temperature,
            max_tokens: self.cfg.max_tokens,
        };

        let response = self
            .client
            .post(&self.cfg.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .map_err(|e| ChalklineError::script(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ChalklineError::script(format!(
                "chat endpoint returned {status}: {}",
                body.trim()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ChalklineError::script(format!("malformed chat response: {e}")))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ChalklineError::script("chat response contained no choices"))?;

        script_from_content(topic, content)
    }

    pub fn config(&self) -> &LlmConfig {
        &self.cfg
    }
}

/// Split model output into scenes: one sentence per line, trimmed, empties
/// dropped, capped at five.
pub fn script_from_content(topic: &str, content: &str) -> ChalklineResult<Script> {
    let lines: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(5)
        .map(str::to_string)
        .collect();

    if lines.is_empty() {
        return Err(ChalklineError::script(
            "chat response content contained no usable lines",
        ));
    }

    Ok(Script::from_lines(topic, lines))
}

/// Deterministic offline script: four templated sentences.
///
/// Sentence 3 says "connected", which the blueprint classifier's "connection"
/// substring does not match, so that scene renders as a generic concept box.
pub fn fallback_script(topic: &str) -> Script {
    Script::from_lines(
        topic,
        [
            format!("{topic} is an important concept in modern systems."),
            "It enables efficient communication between components.".to_string(),
            format!("In {topic}, entities remain connected for continuous interaction."),
            "This improves real-time performance and reliability.".to_string(),
        ],
    )
}
