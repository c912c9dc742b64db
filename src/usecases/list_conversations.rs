use std::collections::HashSet;

use crate::domain::{
    conversation::ConversationSummary, conversation_list_state::ConversationListState,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListConversationsOutput {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationSourceError {
    Unauthorized,
    Unavailable,
    InvalidData,
}

pub trait ConversationSource {
    fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ConversationSourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListConversationsError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

impl ListConversationsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "CONVERSATIONS_UNAUTHORIZED",
            Self::TemporarilyUnavailable => "CONVERSATIONS_UNAVAILABLE",
            Self::DataContractViolation => "CONVERSATIONS_INVALID_DATA",
        }
    }
}

/// Fetches the conversation list. Repeated ids keep their first entry.
pub fn list_conversations(
    source: &dyn ConversationSource,
) -> Result<ListConversationsOutput, ListConversationsError> {
    let mut conversations = source.list_conversations().map_err(map_source_error)?;

    let mut seen = HashSet::new();
    conversations.retain(|conversation| seen.insert(conversation.conversation_id.clone()));

    Ok(ListConversationsOutput { conversations })
}

/// Loads the list into `state`, moving it through loading to ready or error.
pub fn refresh_conversation_list(
    source: &dyn ConversationSource,
    state: &mut ConversationListState,
) -> Result<(), ListConversationsError> {
    state.set_loading();

    match list_conversations(source) {
        Ok(output) => {
            tracing::info!(
                count = output.conversations.len(),
                "conversation list loaded"
            );
            state.set_ready(output.conversations);
            Ok(())
        }
        Err(error) => {
            tracing::warn!(code = error.code(), "conversation list load failed");
            state.set_error();
            Err(error)
        }
    }
}

fn map_source_error(error: ConversationSourceError) -> ListConversationsError {
    match error {
        ConversationSourceError::Unauthorized => ListConversationsError::Unauthorized,
        ConversationSourceError::Unavailable => ListConversationsError::TemporarilyUnavailable,
        ConversationSourceError::InvalidData => ListConversationsError::DataContractViolation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation_list_state::ConversationListUiState;

    struct StubSource {
        result: Result<Vec<ConversationSummary>, ConversationSourceError>,
    }

    impl ConversationSource for StubSource {
        fn list_conversations(
            &self,
        ) -> Result<Vec<ConversationSummary>, ConversationSourceError> {
            self.result.clone()
        }
    }

    fn summary(id: &str, last_at: Option<i64>) -> ConversationSummary {
        ConversationSummary {
            conversation_id: id.to_owned(),
            peer_id: format!("peer-{id}"),
            title: format!("Chat {id}"),
            unread_count: 0,
            last_message_preview: Some("hello".to_owned()),
            last_message_unix_ms: last_at,
        }
    }

    #[test]
    fn keeps_source_payload() {
        let conversations = vec![summary("c1", Some(10)), summary("c2", None)];
        let source = StubSource {
            result: Ok(conversations.clone()),
        };

        let output = list_conversations(&source).expect("list should succeed");

        assert_eq!(output.conversations, conversations);
    }

    #[test]
    fn drops_repeated_conversation_ids() {
        let source = StubSource {
            result: Ok(vec![summary("c1", Some(10)), summary("c1", Some(5))]),
        };

        let output = list_conversations(&source).expect("list should succeed");

        assert_eq!(output.conversations.len(), 1);
        assert_eq!(output.conversations[0].last_message_unix_ms, Some(10));
    }

    #[test]
    fn maps_unauthorized_error() {
        let source = StubSource {
            result: Err(ConversationSourceError::Unauthorized),
        };

        let err = list_conversations(&source).expect_err("must fail");

        assert_eq!(err, ListConversationsError::Unauthorized);
    }

    #[test]
    fn maps_unavailable_error_to_temporarily_unavailable() {
        let source = StubSource {
            result: Err(ConversationSourceError::Unavailable),
        };

        let err = list_conversations(&source).expect_err("must fail");

        assert_eq!(err, ListConversationsError::TemporarilyUnavailable);
    }

    #[test]
    fn maps_invalid_data_error_to_contract_violation() {
        let source = StubSource {
            result: Err(ConversationSourceError::InvalidData),
        };

        let err = list_conversations(&source).expect_err("must fail");

        assert_eq!(err, ListConversationsError::DataContractViolation);
    }

    #[test]
    fn refresh_moves_state_to_ready() {
        let source = StubSource {
            result: Ok(vec![summary("c1", Some(10))]),
        };
        let mut state = ConversationListState::default();

        refresh_conversation_list(&source, &mut state).expect("refresh should succeed");

        assert_eq!(state.ui_state(), ConversationListUiState::Ready);
        assert_eq!(state.conversations().len(), 1);
    }

    #[test]
    fn refresh_failure_moves_state_to_error() {
        let source = StubSource {
            result: Err(ConversationSourceError::Unavailable),
        };
        let mut state = ConversationListState::default();

        let err = refresh_conversation_list(&source, &mut state).expect_err("must fail");

        assert_eq!(err.code(), "CONVERSATIONS_UNAVAILABLE");
        assert_eq!(state.ui_state(), ConversationListUiState::Error);
    }
}
