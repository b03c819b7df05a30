//! The editable view handed to the input method.

use std::sync::Arc;

use editable_core::text::{
    Span, SpanId, SpanObject, SpannedText, SPAN_INTERMEDIATE, SPAN_POINT_POINT,
};
use editable_core::EditError;

use crate::action::Action;
use crate::editable::Editable;

/// Editable text operations available to the input method. Reads observe the
/// client buffer; writes become actions.
pub trait EditableText {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn text(&self) -> String;

    fn substring(&self, start: usize, end: usize) -> Result<String, EditError>;

    fn selection(&self) -> Option<(usize, usize)>;

    fn spans(&self) -> Vec<Span>;

    fn composing_range(&self) -> Option<(usize, usize)>;

    fn replace(&self, start: usize, end: usize, text: &str) -> Result<(), EditError>;

    fn replace_spanned(&self, start: usize, end: usize, text: SpannedText)
        -> Result<(), EditError>;

    fn set_span(
        &self,
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), EditError>;

    fn remove_span(&self, id: SpanId) -> Result<(), EditError>;

    fn set_selection(&self, start: usize, end: usize) -> Result<(), EditError>;
}

/// [`EditableText`] backed by an [`Editable`].
#[derive(Clone)]
pub struct EditableProxy {
    editable: Arc<Editable>,
}

impl EditableProxy {
    pub(crate) fn new(editable: Arc<Editable>) -> Self {
        Self { editable }
    }
}

impl EditableText for EditableProxy {
    fn len(&self) -> usize {
        self.editable.store().with_client(SpannedText::len)
    }

    fn text(&self) -> String {
        self.editable.store().with_client(SpannedText::as_string)
    }

    fn substring(&self, start: usize, end: usize) -> Result<String, EditError> {
        self.editable
            .store()
            .with_client(|t| t.substring(start, end))
    }

    fn selection(&self) -> Option<(usize, usize)> {
        self.editable.store().with_client(SpannedText::selection)
    }

    fn spans(&self) -> Vec<Span> {
        self.editable
            .store()
            .with_client(|t| t.spans().cloned().collect())
    }

    fn composing_range(&self) -> Option<(usize, usize)> {
        self.editable
            .store()
            .with_client(SpannedText::composing_range)
    }

    fn replace(&self, start: usize, end: usize, text: &str) -> Result<(), EditError> {
        self.editable.offer(Action::replace_text(start, end, text)?)
    }

    fn replace_spanned(
        &self,
        start: usize,
        end: usize,
        text: SpannedText,
    ) -> Result<(), EditError> {
        self.editable.offer(Action::replace_text(start, end, text)?)
    }

    fn set_span(
        &self,
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), EditError> {
        self.editable
            .offer(Action::set_span(object, start, end, flags)?)
    }

    fn remove_span(&self, id: SpanId) -> Result<(), EditError> {
        self.editable.offer(Action::remove_span(id))
    }

    fn set_selection(&self, start: usize, end: usize) -> Result<(), EditError> {
        self.set_span(
            SpanObject::SELECTION_START,
            start,
            start,
            SPAN_POINT_POINT | SPAN_INTERMEDIATE,
        )?;
        self.set_span(SpanObject::SELECTION_END, end, end, SPAN_POINT_POINT)
    }
}
