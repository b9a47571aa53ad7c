//! Chat-completions interpreter with tool calling.

use command_supervisor::{Interpretation, InterpreterClient, InterpreterError, Invocation};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const SYSTEM_PROMPT: &str = "Don't make assumptions about what values to plug into functions. \
Ask for clarification if a user request is ambiguous.";

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub system_prompt: String,
    /// Clarification exchanges kept between turns.
    pub max_history: usize,
    pub request_timeout: Duration,
    /// Write the raw last completion here, if set.
    pub dump_path: Option<PathBuf>,
}

impl OpenAiConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_history: 4,
            request_timeout: Duration::from_secs(30),
            dump_path: None,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_history", &self.max_history)
            .field("request_timeout", &self.request_timeout)
            .field("dump_path", &self.dump_path)
            .finish()
    }
}

fn mask_api_key(key: &str) -> String {
    if key.len() <= 8 {
        return "***".to_string();
    }
    match (key.get(..3), key.get(key.len() - 4..)) {
        (Some(head), Some(tail)) => format!("{head}...{tail}"),
        _ => "***".to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<&'a ChatMessage>,
    tools: &'a [Value],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    finish_reason: Option<String>,
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Map a raw chat-completions body onto an [`Interpretation`].
pub fn parse_completion(body: &Value, raw_text: &str) -> Result<Interpretation, InterpreterError> {
    let response: ChatResponse = serde_json::from_value(body.clone())
        .map_err(|e| InterpreterError::Malformed(format!("unexpected body: {e}")))?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InterpreterError::Malformed("no choices".to_string()))?;

    let wants_tool = choice.finish_reason.as_deref() == Some("tool_calls");
    if let Some(call) = choice.message.tool_calls.into_iter().next() {
        let arguments = if call.function.arguments.trim().is_empty() {
            serde_json::Map::new()
        } else {
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(InterpreterError::Malformed(format!(
                        "arguments for {} are not an object: {other}",
                        call.function.name
                    )))
                }
                Err(e) => {
                    return Err(InterpreterError::Malformed(format!(
                        "arguments for {} are not JSON: {e}",
                        call.function.name
                    )))
                }
            }
        };
        return Ok(Interpretation::Invocation(Invocation::new(
            &call.function.name,
            arguments,
            raw_text,
        )));
    }
    if wants_tool {
        return Err(InterpreterError::Malformed(
            "finish_reason is tool_calls but no tool call was returned".to_string(),
        ));
    }

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(Interpretation::PlainText(text)),
        _ => Err(InterpreterError::Malformed(format!(
            "no content or tool call (finish_reason {:?})",
            choice.finish_reason
        ))),
    }
}

pub struct OpenAiInterpreter {
    config: OpenAiConfig,
    tools: Vec<Value>,
    client: Client,
    system: ChatMessage,
    history: Vec<ChatMessage>,
}

impl OpenAiInterpreter {
    /// `tools` is the catalog advertised to the model, usually `registry.tools()`.
    pub fn new(config: OpenAiConfig, tools: Vec<Value>) -> Result<Self, InterpreterError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InterpreterError::Transport(e.to_string()))?;
        info!(model = %config.model, tools = tools.len(), "OpenAI interpreter ready");
        Ok(Self {
            system: ChatMessage {
                role: "system",
                content: config.system_prompt.clone(),
            },
            config,
            tools,
            client,
            history: Vec::new(),
        })
    }

    /// Clarification exchanges currently carried into the next request.
    pub fn history_len(&self) -> usize {
        self.history.len() / 2
    }

    fn request(&self, user: &ChatMessage) -> Result<Value, InterpreterError> {
        let mut messages = vec![&self.system];
        messages.extend(self.history.iter());
        messages.push(user);
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            tools: &self.tools,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(|e| InterpreterError::Transport(e.to_string()))?;

        let status = resp.status();
        let value: Value = resp
            .json()
            .map_err(|e| InterpreterError::Malformed(format!("HTTP {status}: {e}")))?;
        if !status.is_success() {
            let message = value["error"]["message"]
                .as_str()
                .unwrap_or("no error message")
                .to_string();
            return Err(InterpreterError::Api(format!("HTTP {status}: {message}")));
        }
        Ok(value)
    }

    fn dump(&self, value: &Value) {
        let Some(path) = &self.config.dump_path else {
            return;
        };
        let write = || -> std::io::Result<()> {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let json = serde_json::to_string_pretty(value)?;
            std::fs::write(path, json)
        };
        if let Err(e) = write() {
            warn!("failed to write completion to {}: {}", path.display(), e);
        }
    }

    fn remember(&mut self, user: ChatMessage, reply: &str) {
        self.history.push(user);
        self.history.push(ChatMessage {
            role: "assistant",
            content: reply.to_string(),
        });
        let max = self.config.max_history * 2;
        if self.history.len() > max {
            let excess = self.history.len() - max;
            self.history.drain(..excess);
        }
    }
}

impl InterpreterClient for OpenAiInterpreter {
    fn interpret(&mut self, text: &str) -> Result<Interpretation, InterpreterError> {
        let user = ChatMessage {
            role: "user",
            content: text.to_string(),
        };
        let value = self.request(&user)?;
        self.dump(&value);

        let interpretation = parse_completion(&value, text)?;
        match &interpretation {
            Interpretation::PlainText(reply) => {
                debug!("model asked for clarification");
                self.remember(user, reply);
            }
            Interpretation::Invocation(invocation) => {
                debug!(command = %invocation.name, "model chose a tool");
                self.history.clear();
            }
        }
        Ok(interpretation)
    }
}
