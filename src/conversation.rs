//! Bounds how much history an agent resends to the model each turn.

use crate::llm::ModelMessage;

pub const DEFAULT_WINDOW_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationManager {
    /// Keep every message.
    Null,
    /// Keep leading system prompts plus roughly the newest `window_size` messages.
    SlidingWindow { window_size: usize },
}

impl Default for ConversationManager {
    fn default() -> Self {
        Self::SlidingWindow {
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl ConversationManager {
    /// `0` means "never trim".
    pub fn from_window_size(window_size: usize) -> Self {
        if window_size == 0 {
            Self::Null
        } else {
            Self::SlidingWindow { window_size }
        }
    }

    /// Trims `history` in place. The kept window always starts at a user
    /// message so tool results are never separated from their calls.
    pub fn apply(&self, history: &mut Vec<ModelMessage>) {
        let Self::SlidingWindow { window_size } = *self else {
            return;
        };

        let leading = history.iter().take_while(|m| m.is_system()).count();
        let body = history.len() - leading;
        if body <= window_size {
            return;
        }

        let earliest = leading + (body - window_size);
        let cut = history[earliest..]
            .iter()
            .position(ModelMessage::is_user)
            .map(|offset| earliest + offset)
            .or_else(|| {
                // A single turn longer than the window: keep it whole.
                history[leading..]
                    .iter()
                    .rposition(ModelMessage::is_user)
                    .map(|offset| leading + offset)
            });

        if let Some(cut) = cut {
            history.drain(leading..cut);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::llm::ModelToolCall;

    fn user(text: &str) -> ModelMessage {
        ModelMessage::User(text.to_string())
    }

    fn reply(text: &str) -> ModelMessage {
        ModelMessage::Assistant {
            content: Some(text.to_string()),
            tool_calls: vec![],
        }
    }

    fn sum_call(id: &str) -> ModelMessage {
        ModelMessage::Assistant {
            content: None,
            tool_calls: vec![ModelToolCall {
                id: id.to_string(),
                name: "calculate_sum".to_string(),
                arguments: json!({"a": 1, "b": 2}),
            }],
        }
    }

    fn sum_result(id: &str) -> ModelMessage {
        ModelMessage::ToolResult {
            tool_call_id: id.to_string(),
            tool_name: "calculate_sum".to_string(),
            content: "3".to_string(),
            is_error: false,
        }
    }

    #[test]
    fn null_manager_keeps_everything() {
        let mut history = vec![user("a"), reply("b"), user("c"), reply("d")];
        ConversationManager::Null.apply(&mut history);
        assert_eq!(history.len(), 4);
    }

    #[test]
    fn window_drops_oldest_turns_and_keeps_system_prompt() {
        let mut history = vec![
            ModelMessage::System("sys".to_string()),
            user("my name is Ana"),
            reply("hi Ana"),
            user("what is rust"),
            reply("a language"),
            user("what is my name"),
            reply("Ana"),
        ];

        ConversationManager::SlidingWindow { window_size: 4 }.apply(&mut history);

        assert_eq!(
            history,
            vec![
                ModelMessage::System("sys".to_string()),
                user("what is rust"),
                reply("a language"),
                user("what is my name"),
                reply("Ana"),
            ]
        );
    }

    #[test]
    fn window_never_starts_with_a_tool_result() {
        let mut history = vec![
            user("add 1 and 2"),
            sum_call("t1"),
            sum_result("t1"),
            reply("3"),
            user("thanks"),
            reply("welcome"),
        ];

        ConversationManager::SlidingWindow { window_size: 4 }.apply(&mut history);

        assert_eq!(history, vec![user("thanks"), reply("welcome")]);
    }

    #[test]
    fn oversized_single_turn_is_kept_whole() {
        let mut history = vec![
            user("old"),
            reply("old reply"),
            user("add twice"),
            sum_call("t1"),
            sum_result("t1"),
            sum_call("t2"),
            sum_result("t2"),
            reply("done"),
        ];

        ConversationManager::SlidingWindow { window_size: 3 }.apply(&mut history);

        assert_eq!(history.len(), 6);
        assert_eq!(history[0], user("add twice"));
    }

    #[test]
    fn zero_window_size_disables_trimming() {
        assert_eq!(
            ConversationManager::from_window_size(0),
            ConversationManager::Null
        );
        assert_eq!(
            ConversationManager::from_window_size(8),
            ConversationManager::SlidingWindow { window_size: 8 }
        );
    }
}
