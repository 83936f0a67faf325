//! Terminal chat agent.
//!
//! - [`ConversationLoop`] drives a strictly alternating operator/[`Responder`] exchange
//! - [`Agent`] is the responder: model + tools + bounded history, optionally
//!   persisted through a [`FileSession`]
//! - [`AnthropicModel`] is the inference backend
//! - [`WorkshopConfig`] is parsed once at startup and passed down

pub mod agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod repl;
pub mod responder;
pub mod session;
pub mod tools;

pub use agent::{Agent, AgentBuilder, AgentConfig, AgentEvent};
pub use config::WorkshopConfig;
pub use conversation::ConversationManager;
pub use error::{
    AgentError, ConfigError, ProviderError, ReplError, SchemaError, SessionError, ToolError,
};
pub use llm::{
    AnthropicModel, AnthropicModelConfig, ChatModel, ModelCompletion, ModelMessage, ModelToolCall,
    ModelToolChoice, ModelToolDefinition,
};
pub use repl::{
    BufReadReader, ChannelReader, ConversationLoop, LineReader, LoopExit, ReadEvent, TerminalReader,
};
pub use responder::Responder;
pub use session::FileSession;
pub use tools::{ToolSpec, builtin_tools};
