//! Host-facing callbacks.

use std::sync::{Arc, Mutex, PoisonError};

use editable_core::context::{ImeContext, InputType};
use editable_core::keys::KeyEvent;
use editable_core::store::{SyncListener, TextChange};

use crate::engine::{ImeNotification, Rect};

/// Callbacks into the platform input-method adapter. Text and selection
/// callbacks run on the input-method executor; keyboard visibility callbacks
/// run on the UI executor.
pub trait EditableListener: Send + Sync {
    fn on_text_change(&self, change: TextChange);

    fn on_selection_change(&self, selection: Option<(usize, usize)>);

    /// The client composition was dropped by the engine.
    fn on_discard_composition(&self) {}

    fn notify_ime(&self, _kind: ImeNotification) {}

    fn notify_ime_context(&self, _context: &ImeContext, _input_type: InputType) {}

    /// A key event the engine did not consume.
    fn on_default_key_event(&self, _event: &KeyEvent) {}

    fn update_composition_rects(&self, _rects: &[Rect]) {}

    fn show_soft_input(&self) {}

    fn hide_soft_input(&self) {}

    /// The input type changed while the keyboard stays visible.
    fn restart_input(&self, _input_type: InputType) {}
}

/// The session that owns an editable. Held weakly and only used to find the
/// current listener.
pub trait SessionOwner: Send + Sync {
    fn editable_listener(&self) -> Option<Arc<dyn EditableListener>>;
}

/// A session owner whose listener can be attached and detached.
#[derive(Default)]
pub struct ListenerSlot {
    listener: Mutex<Option<Arc<dyn EditableListener>>>,
}

impl ListenerSlot {
    pub fn new(listener: Option<Arc<dyn EditableListener>>) -> Arc<Self> {
        Arc::new(Self {
            listener: Mutex::new(listener),
        })
    }

    pub fn set(&self, listener: Option<Arc<dyn EditableListener>>) {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = listener;
    }
}

impl SessionOwner for ListenerSlot {
    fn editable_listener(&self) -> Option<Arc<dyn EditableListener>> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

pub(crate) struct SyncAdapter<'a>(pub &'a dyn EditableListener);

impl SyncListener for SyncAdapter<'_> {
    fn on_discard_composition(&self) {
        self.0.on_discard_composition();
    }

    fn on_text_change(&self, change: TextChange) {
        self.0.on_text_change(change);
    }

    fn on_selection_change(&self, selection: Option<(usize, usize)>) {
        self.0.on_selection_change(selection);
    }
}
