//! Key listeners: the first consumer of host key events before they reach
//! the engine.

use std::sync::{Arc, Mutex, PoisonError};

use editable_core::keys::{
    keycode, modifier_meta, KeyCharMap, KeyEvent, META_CAPS_LOCK_ON,
};
use tracing::debug;

use crate::proxy::EditableText;

/// Handles a key against the editable view. Returning `false` forwards the
/// key to the engine.
pub trait KeyListener: Send + Sync {
    fn on_key_down(&self, text: &dyn EditableText, event: &KeyEvent) -> bool;

    fn on_key_up(&self, text: &dyn EditableText, event: &KeyEvent) -> bool;

    /// Modifier state tracked by the listener, merged into forwarded events.
    fn meta_state(&self) -> u32 {
        0
    }

    /// Called after a key bypassed the listener, so one-shot modifiers clear.
    fn adjust_meta_after_keypress(&self) {}
}

#[derive(Default)]
struct MetaState {
    /// Modifiers physically held.
    pressed: u32,
    /// Modifiers tapped without another key; apply to the next key only.
    sticky: u32,
    locked: u32,
    /// A non-modifier key went down while modifiers were held.
    used: bool,
}

/// Default listener: types printable characters and handles delete through
/// the editable view, tracking held, sticky and locked modifiers.
pub struct TextKeyListener {
    map: Arc<dyn KeyCharMap>,
    meta: Mutex<MetaState>,
}

impl TextKeyListener {
    pub fn new(map: Arc<dyn KeyCharMap>) -> Self {
        Self {
            map,
            meta: Mutex::new(MetaState::default()),
        }
    }

    fn meta(&self) -> std::sync::MutexGuard<'_, MetaState> {
        self.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delete(&self, text: &dyn EditableText, forward: bool) -> bool {
        let Some((a, b)) = text.selection() else {
            return false;
        };
        let (start, end) = (a.min(b), a.max(b));
        let range = if start != end {
            (start, end)
        } else if forward && end < text.len() {
            (end, end + 1)
        } else if !forward && start > 0 {
            (start - 1, start)
        } else {
            return false;
        };
        text.replace(range.0, range.1, "").is_ok()
    }

    fn insert(&self, text: &dyn EditableText, ch: char) -> bool {
        let (start, end) = match text.selection() {
            Some((a, b)) => (a.min(b), a.max(b)),
            None => (text.len(), text.len()),
        };
        let mut buf = [0u8; 4];
        text.replace(start, end, ch.encode_utf8(&mut buf)).is_ok()
    }
}

impl KeyListener for TextKeyListener {
    fn on_key_down(&self, text: &dyn EditableText, event: &KeyEvent) -> bool {
        if event.key_code == keycode::CAPS_LOCK {
            self.meta().locked ^= META_CAPS_LOCK_ON;
            return false;
        }
        let bits = modifier_meta(event.key_code);
        if bits != 0 {
            let mut meta = self.meta();
            meta.pressed |= bits;
            meta.used = false;
            return false;
        }
        {
            let mut meta = self.meta();
            if meta.pressed != 0 {
                meta.used = true;
            }
        }

        let handled = match event.key_code {
            keycode::DEL => self.delete(text, false),
            keycode::FORWARD_DEL => self.delete(text, true),
            code => {
                let unicode = self
                    .map
                    .unicode_char(code, event.meta_state | self.meta_state());
                match char::from_u32(unicode).filter(|c| *c >= ' ') {
                    Some(ch) => self.insert(text, ch),
                    None => false,
                }
            }
        };
        debug!(key = event.key_code, handled, "text key listener");
        if handled {
            self.adjust_meta_after_keypress();
        }
        handled
    }

    fn on_key_up(&self, _text: &dyn EditableText, event: &KeyEvent) -> bool {
        let bits = modifier_meta(event.key_code);
        if bits != 0 {
            let mut meta = self.meta();
            meta.pressed &= !bits;
            if !meta.used {
                meta.sticky |= bits;
            }
        }
        false
    }

    fn meta_state(&self) -> u32 {
        let meta = self.meta();
        meta.pressed | meta.sticky | meta.locked
    }

    fn adjust_meta_after_keypress(&self) {
        self.meta().sticky = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use editable_core::keys::{KeyAction, UsKeyCharMap, META_SHIFT_ON};
    use editable_core::text::{Span, SpanId, SpanObject, SpannedText};
    use editable_core::EditError;
    use std::cell::RefCell;

    /// Plain in-memory view for exercising the listener without a bridge.
    struct LocalText(RefCell<SpannedText>);

    impl LocalText {
        fn new(s: &str, caret: usize) -> Self {
            let mut t = SpannedText::from(s);
            t.set_selection(caret, caret).unwrap();
            Self(RefCell::new(t))
        }
    }

    impl EditableText for LocalText {
        fn len(&self) -> usize {
            self.0.borrow().len()
        }
        fn text(&self) -> String {
            self.0.borrow().as_string()
        }
        fn substring(&self, start: usize, end: usize) -> Result<String, EditError> {
            self.0.borrow().substring(start, end)
        }
        fn selection(&self) -> Option<(usize, usize)> {
            self.0.borrow().selection()
        }
        fn spans(&self) -> Vec<Span> {
            self.0.borrow().spans().cloned().collect()
        }
        fn composing_range(&self) -> Option<(usize, usize)> {
            self.0.borrow().composing_range()
        }
        fn replace(&self, start: usize, end: usize, text: &str) -> Result<(), EditError> {
            self.0.borrow_mut().replace(start, end, text)
        }
        fn replace_spanned(
            &self,
            start: usize,
            end: usize,
            text: SpannedText,
        ) -> Result<(), EditError> {
            self.0.borrow_mut().replace_spanned(start, end, &text)
        }
        fn set_span(
            &self,
            object: SpanObject,
            start: usize,
            end: usize,
            flags: u32,
        ) -> Result<(), EditError> {
            self.0.borrow_mut().set_span(object, start, end, flags)
        }
        fn remove_span(&self, id: SpanId) -> Result<(), EditError> {
            self.0.borrow_mut().remove_span(id);
            Ok(())
        }
        fn set_selection(&self, start: usize, end: usize) -> Result<(), EditError> {
            self.0.borrow_mut().set_selection(start, end)
        }
    }

    fn listener() -> TextKeyListener {
        TextKeyListener::new(Arc::new(UsKeyCharMap))
    }

    fn down(code: u16) -> KeyEvent {
        KeyEvent::new(KeyAction::Down, code, 0)
    }

    fn up(code: u16) -> KeyEvent {
        KeyEvent::new(KeyAction::Up, code, 0)
    }

    #[test]
    fn test_types_printable_at_caret() {
        let text = LocalText::new("ac", 1);
        let l = listener();
        assert!(l.on_key_down(&text, &down(keycode::A + 1)));
        assert_eq!(text.text(), "abc");
        assert_eq!(text.selection(), Some((2, 2)));
        assert!(!l.on_key_up(&text, &up(keycode::A + 1)));
    }

    #[test]
    fn test_delete_and_forward_delete() {
        let text = LocalText::new("abc", 1);
        let l = listener();
        assert!(l.on_key_down(&text, &down(keycode::DEL)));
        assert_eq!(text.text(), "bc");
        assert!(!l.on_key_down(&text, &down(keycode::DEL)));
        assert!(l.on_key_down(&text, &down(keycode::FORWARD_DEL)));
        assert_eq!(text.text(), "c");
    }

    #[test]
    fn test_held_shift_applies() {
        let text = LocalText::new("", 0);
        let l = listener();
        assert!(!l.on_key_down(&text, &down(keycode::SHIFT_LEFT)));
        assert_ne!(l.meta_state() & META_SHIFT_ON, 0);
        l.on_key_down(&text, &down(keycode::A));
        l.on_key_up(&text, &up(keycode::SHIFT_LEFT));
        assert_eq!(l.meta_state(), 0);
        l.on_key_down(&text, &down(keycode::A));
        assert_eq!(text.text(), "Aa");
    }

    #[test]
    fn test_tapped_shift_is_one_shot() {
        let text = LocalText::new("", 0);
        let l = listener();
        l.on_key_down(&text, &down(keycode::SHIFT_LEFT));
        l.on_key_up(&text, &up(keycode::SHIFT_LEFT));
        assert_ne!(l.meta_state() & META_SHIFT_ON, 0);
        l.on_key_down(&text, &down(keycode::A));
        l.on_key_down(&text, &down(keycode::A));
        assert_eq!(text.text(), "Aa");
    }

    #[test]
    fn test_caps_lock_toggles() {
        let text = LocalText::new("", 0);
        let l = listener();
        l.on_key_down(&text, &down(keycode::CAPS_LOCK));
        assert_eq!(l.meta_state(), META_CAPS_LOCK_ON);
        l.on_key_down(&text, &down(keycode::CAPS_LOCK));
        assert_eq!(l.meta_state(), 0);
    }
}
