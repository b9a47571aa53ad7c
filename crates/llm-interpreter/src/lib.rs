//! llm-interpreter: turn free text into command invocations
//!
//! Two [`InterpreterClient`](command_supervisor::InterpreterClient) backends:
//! [`OpenAiInterpreter`] asks a chat-completions model to pick one of the
//! registry's tools, and [`KeywordInterpreter`] matches a handful of phrasings
//! offline.

mod keyword;
pub use keyword::KeywordInterpreter;

mod openai;
pub use openai::{parse_completion, OpenAiConfig, OpenAiInterpreter, DEFAULT_MODEL, SYSTEM_PROMPT};
