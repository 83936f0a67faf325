use std::collections::HashMap;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::conversation::ConversationManager;
use crate::error::AgentError;
use crate::llm::{
    ChatModel, ModelCompletion, ModelMessage, ModelToolCall, ModelToolChoice, ModelToolDefinition,
};
use crate::responder::Responder;
use crate::session::FileSession;
use crate::tools::ToolSpec;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_iterations: u32,
    pub system_prompt: Option<String>,
    pub conversation_manager: ConversationManager,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 24,
            system_prompt: None,
            conversation_manager: ConversationManager::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Thinking {
        content: String,
    },
    Text {
        content: String,
    },
    ToolCall {
        tool: String,
        args_json: serde_json::Value,
        tool_call_id: String,
    },
    ToolResult {
        tool: String,
        result_text: String,
        tool_call_id: String,
        is_error: bool,
    },
    FinalResponse {
        content: String,
    },
}

#[derive(Default)]
pub struct AgentBuilder {
    model: Option<Arc<dyn ChatModel>>,
    tools: Vec<ToolSpec>,
    config: AgentConfig,
    session: Option<FileSession>,
}

impl AgentBuilder {
    pub fn model<M>(mut self, model: M) -> Self
    where
        M: ChatModel + 'static,
    {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn conversation_manager(mut self, manager: ConversationManager) -> Self {
        self.config.conversation_manager = manager;
        self
    }

    /// Persist history to `session` after every turn and resume from it at build time.
    pub fn session(mut self, session: FileSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let Some(model) = self.model else {
            return Err(AgentError::Config(
                "agent model must be configured via AgentBuilder::model(...)".to_string(),
            ));
        };

        let mut tool_map = HashMap::new();
        for tool in &self.tools {
            if tool_map
                .insert(tool.name().to_string(), tool.clone())
                .is_some()
            {
                return Err(AgentError::Config(format!(
                    "duplicate tool registered: {}",
                    tool.name()
                )));
            }
        }

        let history = match &self.session {
            Some(session) => session.load()?,
            None => Vec::new(),
        };

        let mut agent = Agent {
            model,
            tools: self.tools,
            tool_map,
            config: self.config,
            session: self.session,
            history,
        };
        agent.seed_system_prompt();
        Ok(agent)
    }
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Vec<ToolSpec>,
    tool_map: HashMap<String, ToolSpec>,
    config: AgentConfig,
    session: Option<FileSession>,
    history: Vec<ModelMessage>,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// Forgets the conversation but keeps the system prompt.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.seed_system_prompt();
    }

    pub fn messages(&self) -> &[ModelMessage] {
        &self.history
    }

    pub fn messages_len(&self) -> usize {
        self.history.len()
    }

    pub fn session(&self) -> Option<&FileSession> {
        self.session.as_ref()
    }

    /// Runs one turn to completion. On failure the history is restored to
    /// what it was before the turn started.
    pub async fn query(&mut self, user_message: impl Into<String>) -> Result<String, AgentError> {
        let checkpoint = self.history.len();
        let outcome = {
            let stream = self.query_stream(user_message);
            futures_util::pin_mut!(stream);

            let mut final_response = None;
            let mut failure = None;
            while let Some(event) = stream.next().await {
                match event {
                    Ok(AgentEvent::FinalResponse { content }) => final_response = Some(content),
                    Ok(_) => {}
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }

            match failure {
                Some(err) => Err(err),
                None => final_response.ok_or(AgentError::MissingFinalResponse),
            }
        };

        if outcome.is_err() {
            self.history.truncate(checkpoint);
        }
        outcome
    }

    pub fn query_stream(
        &mut self,
        user_message: impl Into<String>,
    ) -> impl Stream<Item = Result<AgentEvent, AgentError>> + '_ {
        let user_message = user_message.into();

        try_stream! {
            self.history.push(ModelMessage::User(user_message));

            let tool_definitions = self
                .tools
                .iter()
                .map(|tool| ModelToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.json_schema().clone(),
                })
                .collect::<Vec<_>>();

            let tool_choice = if tool_definitions.is_empty() {
                ModelToolChoice::None
            } else {
                ModelToolChoice::Auto
            };

            for iteration in 0..self.config.max_iterations {
                let completion = self
                    .model
                    .invoke(&self.history, &tool_definitions, tool_choice)
                    .await?;

                if let Some(usage) = &completion.usage {
                    debug!(
                        iteration,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "model completion"
                    );
                }

                if let Some(thinking) = completion.thinking.clone() {
                    yield AgentEvent::Thinking { content: thinking };
                }

                self.append_assistant_message(&completion);

                if let Some(text) = completion.text.clone().filter(|text| !text.is_empty()) {
                    yield AgentEvent::Text { content: text };
                }

                if completion.tool_calls.is_empty() {
                    self.finish_turn();
                    yield AgentEvent::FinalResponse {
                        content: completion.text.unwrap_or_default(),
                    };
                    return;
                }

                for tool_call in completion.tool_calls {
                    yield AgentEvent::ToolCall {
                        tool: tool_call.name.clone(),
                        args_json: tool_call.arguments.clone(),
                        tool_call_id: tool_call.id.clone(),
                    };

                    let execution = self.execute_tool_call(&tool_call).await;
                    self.history.push(ModelMessage::ToolResult {
                        tool_call_id: tool_call.id.clone(),
                        tool_name: tool_call.name.clone(),
                        content: execution.result_text.clone(),
                        is_error: execution.is_error,
                    });

                    yield AgentEvent::ToolResult {
                        tool: tool_call.name,
                        result_text: execution.result_text,
                        tool_call_id: tool_call.id,
                        is_error: execution.is_error,
                    };
                }
            }

            Err::<(), AgentError>(AgentError::MaxIterationsReached {
                max_iterations: self.config.max_iterations,
            })?;
        }
    }

    fn seed_system_prompt(&mut self) {
        if self.history.iter().any(ModelMessage::is_system) {
            return;
        }
        if let Some(system_prompt) = &self.config.system_prompt {
            self.history
                .insert(0, ModelMessage::System(system_prompt.clone()));
        }
    }

    fn append_assistant_message(&mut self, completion: &ModelCompletion) {
        self.history.push(ModelMessage::Assistant {
            content: completion.text.clone(),
            tool_calls: completion.tool_calls.clone(),
        });
    }

    /// Trims the window and persists. Persistence failures only cost durability.
    fn finish_turn(&mut self) {
        self.config.conversation_manager.apply(&mut self.history);

        if let Some(session) = &self.session {
            if let Err(err) = session.save(&self.history) {
                warn!(session = session.session_id(), error = %err, "failed to persist session");
            }
        }
    }

    async fn execute_tool_call(&self, tool_call: &ModelToolCall) -> ToolExecutionResult {
        let Some(tool) = self.tool_map.get(&tool_call.name) else {
            warn!(tool = %tool_call.name, "model requested an unknown tool");
            return ToolExecutionResult {
                result_text: format!("Unknown tool '{}'.", tool_call.name),
                is_error: true,
            };
        };

        debug!(tool = %tool_call.name, id = %tool_call.id, "executing tool");
        match tool.execute(tool_call.arguments.clone()).await {
            Ok(text) => ToolExecutionResult {
                result_text: text,
                is_error: false,
            },
            Err(err) => ToolExecutionResult {
                result_text: err.to_string(),
                is_error: true,
            },
        }
    }
}

struct ToolExecutionResult {
    result_text: String,
    is_error: bool,
}

#[async_trait]
impl Responder for Agent {
    type Error = AgentError;

    async fn respond(&mut self, text: &str) -> Result<String, AgentError> {
        self.query(text).await
    }
}
