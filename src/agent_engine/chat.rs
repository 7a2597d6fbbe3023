use serde::{Deserialize, Serialize};

use crate::agent_engine::action::SheetAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Agent => "agent",
            Sender::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub sender: Sender,
    pub text: String,
    /// The action batch this entry reports on, viewable on demand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<SheetAction>>,
}

impl ChatEntry {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            actions: None,
        }
    }
}

/// One user/agent exchange as shown to the model on the next pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextLine {
    pub sender: Sender,
    pub text: String,
}

/// Conversation shown in the task pane, plus the last action batch.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    entries: Vec<ChatEntry>,
    last_actions: Option<Vec<SheetAction>>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: ChatEntry) {
        if let Some(actions) = &entry.actions {
            self.last_actions = Some(actions.clone());
        }
        self.entries.push(entry);
    }

    pub fn last_actions(&self) -> Option<&[SheetAction]> {
        self.last_actions.as_deref()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_actions = None;
    }

    /// User and agent messages only; system notices are not model context.
    pub fn context(&self) -> Vec<ContextLine> {
        self.entries
            .iter()
            .filter(|e| matches!(e.sender, Sender::User | Sender::Agent))
            .map(|e| ContextLine {
                sender: e.sender,
                text: e.text.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::action::ActionKind;
    use crate::sheet::cell::CellPatch;

    #[test]
    fn context_skips_system_messages() {
        let mut log = ChatLog::new();
        log.push(ChatEntry::new(Sender::User, "fill B2"));
        log.push(ChatEntry::new(Sender::System, "Skipped action"));
        log.push(ChatEntry::new(Sender::Agent, "done"));
        let ctx = log.context();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx[0].sender, Sender::User);
        assert_eq!(ctx[1].text, "done");
    }

    #[test]
    fn entries_with_actions_update_last_actions() {
        let mut log = ChatLog::new();
        let batch = vec![SheetAction {
            kind: ActionKind::Set,
            address: "B2".into(),
            data: CellPatch::value(1.0),
        }];
        let mut entry = ChatEntry::new(Sender::System, "Executed 1 actions.");
        entry.actions = Some(batch.clone());
        log.push(entry);
        assert_eq!(log.last_actions(), Some(batch.as_slice()));

        log.clear();
        assert!(log.entries().is_empty());
        assert!(log.last_actions().is_none());
    }

    #[test]
    fn sender_serializes_lowercase() {
        let json = serde_json::to_string(&ChatEntry::new(Sender::Agent, "hi")).unwrap();
        assert_eq!(json, r#"{"sender":"agent","text":"hi"}"#);
    }
}
