//! Foreign traits implemented by the host, and their adapters to the
//! session-side traits.

use std::sync::Arc;

use editable_core::composition::CompositionSegment;
use editable_core::context::{ImeContext, InputType};
use editable_core::keys::{EngineKeyEvent, KeyEvent};
use editable_core::store::TextChange;
use editable_session::{EditableListener, EngineChannel, ImeNotification, Rect, TransportError};

use super::types::{
    range, to_u32, BridgeEngineKeyEvent, BridgeImeContext, BridgeInputType, BridgeKeyEvent,
    BridgeRange, BridgeRect, BridgeSegment, BridgeTextChange,
};

/// Channel to the engine editable. Each method returns false when the
/// request could not be delivered. Every accepted `synchronize` and
/// `replace_text` must later be answered with a reply notification.
#[uniffi::export(with_foreign)]
pub trait BridgeEngine: Send + Sync {
    fn synchronize(&self) -> bool;
    fn replace_text(&self, start: u32, end: u32, text: String) -> bool;
    fn add_composition_range(&self, segment: BridgeSegment) -> bool;
    fn update_composition(&self, start: u32, end: u32, flags: u32) -> bool;
    fn request_commit(&self) -> bool;
    fn request_cursor_updates(&self, mode: u32) -> bool;
    fn send_key_event(&self, event: BridgeEngineKeyEvent) -> bool;
}

/// Input-method side callbacks.
#[uniffi::export(with_foreign)]
pub trait BridgeListener: Send + Sync {
    fn on_text_change(&self, change: BridgeTextChange);
    fn on_selection_change(&self, selection: Option<BridgeRange>);
    fn on_discard_composition(&self);
    fn notify_ime(&self, code: i32);
    fn notify_ime_context(&self, context: BridgeImeContext, input_type: BridgeInputType);
    fn on_default_key_event(&self, event: BridgeKeyEvent);
    fn update_composition_rects(&self, rects: Vec<BridgeRect>);
    fn show_soft_input(&self);
    fn hide_soft_input(&self);
    fn restart_input(&self, input_type: BridgeInputType);
}

// ---------------------------------------------------------------------------
// Adapters
// ---------------------------------------------------------------------------

pub(super) struct HostEngine(pub Arc<dyn BridgeEngine>);

fn delivered(ok: bool, what: &str) -> Result<(), TransportError> {
    if ok {
        Ok(())
    } else {
        Err(TransportError::Rejected(what.to_string()))
    }
}

impl EngineChannel for HostEngine {
    fn synchronize(&self) -> Result<(), TransportError> {
        delivered(self.0.synchronize(), "synchronize")
    }

    fn replace_text(&self, start: usize, end: usize, text: &str) -> Result<(), TransportError> {
        delivered(
            self.0.replace_text(to_u32(start), to_u32(end), text.to_string()),
            "replace_text",
        )
    }

    fn add_composition_range(&self, segment: &CompositionSegment) -> Result<(), TransportError> {
        delivered(
            self.0.add_composition_range(segment.into()),
            "add_composition_range",
        )
    }

    fn update_composition(
        &self,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), TransportError> {
        delivered(
            self.0.update_composition(to_u32(start), to_u32(end), flags),
            "update_composition",
        )
    }

    fn request_commit(&self) -> Result<(), TransportError> {
        delivered(self.0.request_commit(), "request_commit")
    }

    fn request_cursor_updates(&self, mode: u32) -> Result<(), TransportError> {
        delivered(self.0.request_cursor_updates(mode), "request_cursor_updates")
    }

    fn send_key_event(&self, event: &EngineKeyEvent) -> Result<(), TransportError> {
        delivered(self.0.send_key_event(event.into()), "send_key_event")
    }
}

pub(super) struct HostListener(pub Arc<dyn BridgeListener>);

impl EditableListener for HostListener {
    fn on_text_change(&self, change: TextChange) {
        self.0.on_text_change(change.into());
    }

    fn on_selection_change(&self, selection: Option<(usize, usize)>) {
        self.0.on_selection_change(selection.map(range));
    }

    fn on_discard_composition(&self) {
        self.0.on_discard_composition();
    }

    fn notify_ime(&self, kind: ImeNotification) {
        self.0.notify_ime(kind.code());
    }

    fn notify_ime_context(&self, context: &ImeContext, input_type: InputType) {
        self.0
            .notify_ime_context(context.into(), input_type.into());
    }

    fn on_default_key_event(&self, event: &KeyEvent) {
        self.0.on_default_key_event(event.into());
    }

    fn update_composition_rects(&self, rects: &[Rect]) {
        self.0
            .update_composition_rects(rects.iter().map(BridgeRect::from).collect());
    }

    fn show_soft_input(&self) {
        self.0.show_soft_input();
    }

    fn hide_soft_input(&self) {
        self.0.hide_soft_input();
    }

    fn restart_input(&self, input_type: InputType) {
        self.0.restart_input(input_type.into());
    }
}
