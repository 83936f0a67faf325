use anthropic_ai_sdk::client::AnthropicClient;
use anthropic_ai_sdk::types::message::{
    ContentBlock, CreateMessageParams, CreateMessageResponse, Message, MessageClient, MessageError,
    RequiredMessageParams, Role, Tool, ToolChoice,
};
use async_trait::async_trait;
use tracing::debug;

use crate::error::ProviderError;
use crate::llm::{
    ChatModel, ModelCompletion, ModelMessage, ModelToolCall, ModelToolChoice, ModelToolDefinition,
    ModelUsage,
};

#[derive(Debug, Clone)]
/// Connection and sampling settings for [`AnthropicModel`].
pub struct AnthropicModelConfig {
    pub api_key: String,
    /// Model id, e.g. `claude-sonnet-4-5`.
    pub model: String,
    pub api_version: String,
    /// Proxy or compatible endpoint; `None` uses the public API.
    pub api_base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl AnthropicModelConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_version: AnthropicClient::DEFAULT_API_VERSION.to_string(),
            api_base_url: None,
            max_tokens: 4096,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone)]
/// [`ChatModel`] backed by the Anthropic Messages API.
pub struct AnthropicModel {
    client: AnthropicClient,
    config: AnthropicModelConfig,
}

impl AnthropicModel {
    pub fn new(config: AnthropicModelConfig) -> Result<Self, ProviderError> {
        let mut builder =
            AnthropicClient::builder(config.api_key.clone(), config.api_version.clone());
        if let Some(url) = &config.api_base_url {
            builder = builder.with_api_base_url(url.clone());
        }

        let client = builder
            .build::<MessageError>()
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn model_id(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ChatModel for AnthropicModel {
    async fn invoke(
        &self,
        messages: &[ModelMessage],
        tools: &[ModelToolDefinition],
        tool_choice: ModelToolChoice,
    ) -> Result<ModelCompletion, ProviderError> {
        let (history, system) = split_system(messages);
        if history.is_empty() {
            return Err(ProviderError::Request(
                "conversation has no user message to answer".to_string(),
            ));
        }

        let mut request = CreateMessageParams::new(RequiredMessageParams {
            model: self.config.model.clone(),
            messages: history,
            max_tokens: self.config.max_tokens,
        })
        .with_stream(false);

        if let Some(system_prompt) = system {
            request = request.with_system(system_prompt);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if !tools.is_empty() {
            request = request
                .with_tools(tools.iter().map(to_anthropic_tool).collect())
                .with_tool_choice(to_anthropic_choice(tool_choice));
        }

        debug!(
            model = %self.config.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending anthropic request"
        );

        let response = self
            .client
            .create_message(Some(&request))
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;

        Ok(completion_from_response(&response))
    }
}

fn to_anthropic_tool(tool: &ModelToolDefinition) -> Tool {
    Tool {
        name: tool.name.clone(),
        description: Some(tool.description.clone()),
        input_schema: tool.parameters.clone(),
    }
}

fn to_anthropic_choice(choice: ModelToolChoice) -> ToolChoice {
    match choice {
        ModelToolChoice::Auto => ToolChoice::Auto,
        ModelToolChoice::None => ToolChoice::None,
    }
}

/// Separates system prompts (the API takes them out of band) from the turn list.
fn split_system(messages: &[ModelMessage]) -> (Vec<Message>, Option<String>) {
    let mut system = Vec::new();
    let mut turns = Vec::new();

    for message in messages {
        match message {
            ModelMessage::System(content) => system.push(content.as_str()),
            ModelMessage::User(content) => {
                turns.push(Message::new_text(Role::User, content.clone()));
            }
            ModelMessage::Assistant {
                content,
                tool_calls,
            } => {
                let text = content
                    .iter()
                    .filter(|text| !text.is_empty())
                    .map(|text| ContentBlock::Text { text: text.clone() });
                let calls = tool_calls.iter().map(|call| ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                });
                let blocks = text.chain(calls).collect::<Vec<_>>();
                if !blocks.is_empty() {
                    turns.push(Message::new_blocks(Role::Assistant, blocks));
                }
            }
            ModelMessage::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                let content = if *is_error {
                    format!("Error: {content}")
                } else {
                    content.clone()
                };
                turns.push(Message::new_blocks(
                    Role::User,
                    vec![ContentBlock::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content,
                    }],
                ));
            }
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (turns, system)
}

fn completion_from_response(response: &CreateMessageResponse) -> ModelCompletion {
    let mut text = Vec::new();
    let mut thinking = Vec::new();
    let mut tool_calls = Vec::new();

    for block in &response.content {
        match block {
            ContentBlock::Text { text: part } => text.push(part.clone()),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ModelToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: input.clone(),
            }),
            ContentBlock::Thinking { thinking: part, .. } => thinking.push(part.clone()),
            _ => {}
        }
    }

    ModelCompletion {
        text: (!text.is_empty()).then(|| text.join("\n")),
        thinking: (!thinking.is_empty()).then(|| thinking.join("\n")),
        tool_calls,
        usage: Some(ModelUsage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        }),
    }
}
