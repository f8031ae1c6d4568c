//! Prompt assembly for a single assistant turn.

use caller_types::{AppointmentSlot, ChatMessage, Role, ZipCode};

/// What the calendar lookup produced for this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulingContext {
    /// Slots near the caller's ZIP code.
    Slots {
        zip: ZipCode,
        slots: Vec<AppointmentSlot>,
    },
    /// The calendar was checked and nothing is open near the caller.
    NoSlots { zip: ZipCode },
    /// The lookup failed or timed out.
    Unavailable { zip: ZipCode },
}

impl SchedulingContext {
    fn render(&self) -> String {
        match self {
            Self::Slots { zip, slots } => {
                let mut text = format!(
                    "The caller's ZIP code is {zip}. These appointment slots are open near them; \
                     offer them one at a time and never invent other times:"
                );
                for (i, slot) in slots.iter().enumerate() {
                    text.push_str(&format!("\n{}. {}", i + 1, slot.spoken()));
                }
                text
            }
            Self::NoSlots { zip } => format!(
                "The caller's ZIP code is {zip}. There are no open appointment slots near them \
                 in the coming days. Apologise and offer to have someone call them back."
            ),
            Self::Unavailable { zip } => format!(
                "The caller's ZIP code is {zip}. The appointment calendar cannot be checked right \
                 now. Do not promise specific times; offer a callback instead."
            ),
        }
    }
}

/// Builds the message list sent to the model.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
    max_history: usize,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>, max_history: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_history,
        }
    }

    /// System prompt, then scheduling context, then the most recent
    /// `max_history` non-system messages of `history`.
    pub fn build(
        &self,
        history: &[ChatMessage],
        scheduling: Option<&SchedulingContext>,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.max_history + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        if let Some(context) = scheduling {
            messages.push(ChatMessage::system(context.render()));
        }

        let conversation: Vec<&ChatMessage> =
            history.iter().filter(|m| m.role != Role::System).collect();
        let skip = conversation.len().saturating_sub(self.max_history);
        messages.extend(conversation.into_iter().skip(skip).cloned());
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn zip() -> ZipCode {
        ZipCode::parse("77002").unwrap()
    }

    #[test]
    fn history_is_windowed_but_system_prompt_kept() {
        let builder = PromptBuilder::new("You are a receptionist.", 2);
        let history = vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("two"),
            ChatMessage::user("three"),
        ];

        let messages = builder.build(&history, None);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], ChatMessage::system("You are a receptionist."));
        assert_eq!(messages[1], ChatMessage::assistant("two"));
        assert_eq!(messages[2], ChatMessage::user("three"));
    }

    #[test]
    fn scheduling_context_follows_system_prompt() {
        let tz = FixedOffset::west_opt(6 * 3600).unwrap();
        let slot = AppointmentSlot {
            start: tz.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap(),
            end: tz.with_ymd_and_hms(2026, 10, 20, 10, 0, 0).unwrap(),
            anchor_location: None,
        };
        let context = SchedulingContext::Slots {
            zip: zip(),
            slots: vec![slot],
        };

        let builder = PromptBuilder::new("sys", 10);
        let messages = builder.build(&[ChatMessage::user("hi")], Some(&context));

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::System);
        assert!(messages[1].content.contains("77002"));
        assert!(messages[1].content.contains("1. Tuesday, October 20 at 9:00 AM"));
        assert_eq!(messages[2], ChatMessage::user("hi"));
    }

    #[test]
    fn unavailable_calendar_discourages_promises() {
        let text = SchedulingContext::Unavailable { zip: zip() }.render();
        assert!(text.contains("cannot be checked"));
        let text = SchedulingContext::NoSlots { zip: zip() }.render();
        assert!(text.contains("no open appointment slots"));
    }

    #[test]
    fn stray_system_messages_in_history_are_dropped() {
        let builder = PromptBuilder::new("sys", 10);
        let history = vec![ChatMessage::system("old"), ChatMessage::user("hello")];
        let messages = builder.build(&history, None);
        assert_eq!(messages, vec![ChatMessage::system("sys"), ChatMessage::user("hello")]);
    }
}
