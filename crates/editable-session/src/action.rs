//! Client-originated edit intents awaiting an engine acknowledgement.

use std::fmt;
use std::sync::Arc;

use editable_core::text::{SpanId, SpanObject, SpannedText};
use editable_core::EditError;

use crate::executor::Executor;

/// Action kind, for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Event,
    ReplaceText,
    SetSpan,
    RemoveSpan,
    SetHandler,
}

#[derive(Clone)]
pub(crate) enum ActionKind {
    Event,
    ReplaceText {
        start: usize,
        end: usize,
        text: SpannedText,
    },
    SetSpan {
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    },
    RemoveSpan {
        id: SpanId,
    },
    SetHandler {
        executor: Arc<dyn Executor>,
    },
}

/// One action. Ranges are validated on construction, so a constructed
/// action never carries `start > end`.
#[derive(Clone)]
pub struct Action(pub(crate) ActionKind);

fn check_range(start: usize, end: usize) -> Result<(), EditError> {
    if start > end {
        return Err(EditError::InvalidRange {
            start,
            end,
            len: end,
        });
    }
    Ok(())
}

impl Action {
    /// A key event was sent; asks the engine to synchronize.
    pub fn event() -> Self {
        Self(ActionKind::Event)
    }

    pub fn replace_text(
        start: usize,
        end: usize,
        text: impl Into<SpannedText>,
    ) -> Result<Self, EditError> {
        check_range(start, end)?;
        Ok(Self(ActionKind::ReplaceText {
            start,
            end,
            text: text.into(),
        }))
    }

    pub fn set_span(
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<Self, EditError> {
        check_range(start, end)?;
        Ok(Self(ActionKind::SetSpan {
            object,
            start,
            end,
            flags,
        }))
    }

    pub fn remove_span(id: SpanId) -> Self {
        Self(ActionKind::RemoveSpan { id })
    }

    pub fn set_handler(executor: Arc<dyn Executor>) -> Self {
        Self(ActionKind::SetHandler { executor })
    }

    pub fn action_type(&self) -> ActionType {
        match self.0 {
            ActionKind::Event => ActionType::Event,
            ActionKind::ReplaceText { .. } => ActionType::ReplaceText,
            ActionKind::SetSpan { .. } => ActionType::SetSpan,
            ActionKind::RemoveSpan { .. } => ActionType::RemoveSpan,
            ActionKind::SetHandler { .. } => ActionType::SetHandler,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ActionKind::Event => f.write_str("Event"),
            ActionKind::ReplaceText { start, end, text } => f
                .debug_struct("ReplaceText")
                .field("start", start)
                .field("end", end)
                .field("text", &text.as_string())
                .finish(),
            ActionKind::SetSpan {
                object,
                start,
                end,
                flags,
            } => f
                .debug_struct("SetSpan")
                .field("id", &object.id())
                .field("start", start)
                .field("end", end)
                .field("flags", &format_args!("{flags:#x}"))
                .finish(),
            ActionKind::RemoveSpan { id } => f.debug_struct("RemoveSpan").field("id", id).finish(),
            ActionKind::SetHandler { .. } => f.write_str("SetHandler"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_range() {
        assert_eq!(
            Action::replace_text(5, 2, "x").unwrap_err(),
            EditError::InvalidRange {
                start: 5,
                end: 2,
                len: 2
            }
        );
        assert!(Action::set_span(SpanObject::marker(), 3, 1, 0).is_err());
        assert_eq!(
            Action::replace_text(2, 2, "x").unwrap().action_type(),
            ActionType::ReplaceText
        );
    }
}
