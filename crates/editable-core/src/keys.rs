//! Platform key events and their translation into engine key messages.

/// Platform key codes used by the bridge.
pub mod keycode {
    pub const NUM_0: u16 = 7;
    pub const NUM_9: u16 = 16;
    pub const A: u16 = 29;
    pub const Z: u16 = 54;
    pub const COMMA: u16 = 55;
    pub const PERIOD: u16 = 56;
    pub const ALT_LEFT: u16 = 57;
    pub const ALT_RIGHT: u16 = 58;
    pub const SHIFT_LEFT: u16 = 59;
    pub const SHIFT_RIGHT: u16 = 60;
    pub const TAB: u16 = 61;
    pub const SPACE: u16 = 62;
    pub const SYM: u16 = 63;
    pub const ENTER: u16 = 66;
    pub const DEL: u16 = 67;
    pub const GRAVE: u16 = 68;
    pub const MINUS: u16 = 69;
    pub const EQUALS: u16 = 70;
    pub const LEFT_BRACKET: u16 = 71;
    pub const RIGHT_BRACKET: u16 = 72;
    pub const BACKSLASH: u16 = 73;
    pub const SEMICOLON: u16 = 74;
    pub const APOSTROPHE: u16 = 75;
    pub const SLASH: u16 = 76;
    pub const NUM: u16 = 78;
    pub const FORWARD_DEL: u16 = 112;
    pub const CTRL_LEFT: u16 = 113;
    pub const CTRL_RIGHT: u16 = 114;
    pub const CAPS_LOCK: u16 = 115;
    pub const META_LEFT: u16 = 117;
    pub const META_RIGHT: u16 = 118;
    pub const FUNCTION: u16 = 119;
}

// Meta state bits
pub const META_SHIFT_ON: u32 = 0x1;
pub const META_ALT_ON: u32 = 0x2;
pub const META_SYM_ON: u32 = 0x4;
pub const META_ALT_LEFT_ON: u32 = 0x10;
pub const META_ALT_RIGHT_ON: u32 = 0x20;
pub const META_SHIFT_LEFT_ON: u32 = 0x40;
pub const META_SHIFT_RIGHT_ON: u32 = 0x80;
pub const META_CTRL_ON: u32 = 0x1000;
pub const META_CTRL_LEFT_ON: u32 = 0x2000;
pub const META_CTRL_RIGHT_ON: u32 = 0x4000;
pub const META_META_ON: u32 = 0x10000;
pub const META_META_LEFT_ON: u32 = 0x20000;
pub const META_META_RIGHT_ON: u32 = 0x40000;
pub const META_CAPS_LOCK_ON: u32 = 0x100000;

pub const META_SHIFT_MASK: u32 = META_SHIFT_ON | META_SHIFT_LEFT_ON | META_SHIFT_RIGHT_ON;
pub const META_ALT_MASK: u32 = META_ALT_ON | META_ALT_LEFT_ON | META_ALT_RIGHT_ON;
pub const META_CTRL_MASK: u32 = META_CTRL_ON | META_CTRL_LEFT_ON | META_CTRL_RIGHT_ON;
pub const META_META_MASK: u32 = META_META_ON | META_META_LEFT_ON | META_META_RIGHT_ON;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
    Multiple,
}

/// A platform key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub key_code: u16,
    pub scan_code: u32,
    pub meta_state: u32,
    pub time: i64,
    pub repeat_count: u32,
    pub flags: u32,
}

impl KeyEvent {
    pub fn new(action: KeyAction, key_code: u16, meta_state: u32) -> Self {
        Self {
            action,
            key_code,
            scan_code: 0,
            meta_state,
            time: 0,
            repeat_count: 0,
            flags: 0,
        }
    }

    pub fn is_modifier(&self) -> bool {
        is_modifier_key(self.key_code)
    }
}

pub fn is_modifier_key(key_code: u16) -> bool {
    matches!(
        key_code,
        keycode::SHIFT_LEFT
            | keycode::SHIFT_RIGHT
            | keycode::ALT_LEFT
            | keycode::ALT_RIGHT
            | keycode::CTRL_LEFT
            | keycode::CTRL_RIGHT
            | keycode::META_LEFT
            | keycode::META_RIGHT
            | keycode::SYM
            | keycode::NUM
            | keycode::FUNCTION
    )
}

/// Meta bit a modifier key contributes while held.
pub fn modifier_meta(key_code: u16) -> u32 {
    match key_code {
        keycode::SHIFT_LEFT => META_SHIFT_ON | META_SHIFT_LEFT_ON,
        keycode::SHIFT_RIGHT => META_SHIFT_ON | META_SHIFT_RIGHT_ON,
        keycode::ALT_LEFT => META_ALT_ON | META_ALT_LEFT_ON,
        keycode::ALT_RIGHT => META_ALT_ON | META_ALT_RIGHT_ON,
        keycode::CTRL_LEFT => META_CTRL_ON | META_CTRL_LEFT_ON,
        keycode::CTRL_RIGHT => META_CTRL_ON | META_CTRL_RIGHT_ON,
        keycode::META_LEFT => META_META_ON | META_META_LEFT_ON,
        keycode::META_RIGHT => META_META_ON | META_META_RIGHT_ON,
        keycode::SYM => META_SYM_ON,
        _ => 0,
    }
}

/// Character produced by a key under a meta state; 0 when none.
pub trait KeyCharMap: Send + Sync {
    fn unicode_char(&self, key_code: u16, meta_state: u32) -> u32;

    /// Events (modifier presses included) that would type `ch`.
    fn synthesize(&self, ch: char) -> Option<Vec<KeyEvent>> {
        for meta in [0, META_SHIFT_ON, META_ALT_ON] {
            let Some(code) = (0..=keycode::FUNCTION).find(|&k| {
                !is_modifier_key(k) && self.unicode_char(k, meta) == ch as u32
            }) else {
                continue;
            };
            let modifier = match meta {
                META_SHIFT_ON => Some((keycode::SHIFT_LEFT, META_SHIFT_ON | META_SHIFT_LEFT_ON)),
                META_ALT_ON => Some((keycode::ALT_LEFT, META_ALT_ON | META_ALT_LEFT_ON)),
                _ => None,
            };
            let held = modifier.map_or(0, |(_, m)| m);
            let mut events = Vec::with_capacity(4);
            if let Some((mod_code, _)) = modifier {
                events.push(KeyEvent::new(KeyAction::Down, mod_code, held));
            }
            events.push(KeyEvent::new(KeyAction::Down, code, held));
            events.push(KeyEvent::new(KeyAction::Up, code, held));
            if let Some((mod_code, _)) = modifier {
                events.push(KeyEvent::new(KeyAction::Up, mod_code, 0));
            }
            return Some(events);
        }
        None
    }
}

/// US QWERTY layout with Alt producing a handful of Latin-1 letters.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsKeyCharMap;

const SHIFTED_DIGITS: [char; 10] = [')', '!', '@', '#', '$', '%', '^', '&', '*', '('];

impl KeyCharMap for UsKeyCharMap {
    fn unicode_char(&self, key_code: u16, meta_state: u32) -> u32 {
        if meta_state & (META_CTRL_MASK | META_META_MASK) != 0 {
            return 0;
        }
        let shift = meta_state & META_SHIFT_MASK != 0;
        let caps = meta_state & META_CAPS_LOCK_ON != 0;
        let alt = meta_state & META_ALT_MASK != 0;

        let ch = match key_code {
            keycode::A..=keycode::Z => {
                let base = (b'a' + (key_code - keycode::A) as u8) as char;
                if alt {
                    match base {
                        's' => 'ß',
                        'e' => 'é',
                        'n' => 'ñ',
                        'u' => 'ü',
                        _ => return 0,
                    }
                } else if shift ^ caps {
                    base.to_ascii_uppercase()
                } else {
                    base
                }
            }
            _ if alt => return 0,
            keycode::NUM_0..=keycode::NUM_9 => {
                let digit = (key_code - keycode::NUM_0) as usize;
                if shift {
                    SHIFTED_DIGITS[digit]
                } else {
                    (b'0' + digit as u8) as char
                }
            }
            keycode::SPACE => ' ',
            keycode::TAB => '\t',
            keycode::ENTER => '\n',
            _ => {
                let (plain, shifted) = match key_code {
                    keycode::COMMA => (',', '<'),
                    keycode::PERIOD => ('.', '>'),
                    keycode::GRAVE => ('`', '~'),
                    keycode::MINUS => ('-', '_'),
                    keycode::EQUALS => ('=', '+'),
                    keycode::LEFT_BRACKET => ('[', '{'),
                    keycode::RIGHT_BRACKET => (']', '}'),
                    keycode::BACKSLASH => ('\\', '|'),
                    keycode::SEMICOLON => (';', ':'),
                    keycode::APOSTROPHE => ('\'', '"'),
                    keycode::SLASH => ('/', '?'),
                    _ => return 0,
                };
                if shift {
                    shifted
                } else {
                    plain
                }
            }
        };
        ch as u32
    }
}

/// Key message delivered to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineKeyEvent {
    pub action: KeyAction,
    pub key_code: u16,
    pub scan_code: u32,
    /// Meta state for keydown/keyup.
    pub meta_state: u32,
    /// Meta state for the generated keypress.
    pub key_press_meta_state: u32,
    pub time: i64,
    /// Printable DOM key value, 0 when the key is not printable.
    pub printable_key: u32,
    pub repeat_count: u32,
    pub flags: u32,
    pub synthesized: bool,
}

/// Translate `event` for the engine. `action` overrides the event's own action
/// (e.g. `Multiple` delivered as `Down`); `saved_meta` is modifier state tracked
/// outside the event.
pub fn translate_key_event(
    event: &KeyEvent,
    action: KeyAction,
    saved_meta: u32,
    synthesized: bool,
    map: &dyn KeyCharMap,
) -> EngineKeyEvent {
    let meta = event.meta_state | saved_meta;
    let unmodified_meta = meta & !(META_ALT_MASK | META_CTRL_MASK | META_META_MASK);
    let unicode = map.unicode_char(event.key_code, meta);
    let unicode_unmodified = map.unicode_char(event.key_code, unmodified_meta);

    let printable_key = if unicode >= ' ' as u32 {
        unicode
    } else if unmodified_meta != meta {
        unicode_unmodified
    } else {
        0
    };

    // A modifier that produced a different character is dropped from the keypress.
    let key_press_meta_state = if unicode >= ' ' as u32 && unicode != unicode_unmodified {
        unmodified_meta
    } else {
        meta
    };

    // Synthesized modifier bits do not reflect keys the user holds.
    let meta_state = if synthesized {
        (event.meta_state & !(META_ALT_MASK | META_CTRL_MASK | META_META_MASK)) | saved_meta
    } else {
        meta
    };

    EngineKeyEvent {
        action,
        key_code: event.key_code,
        scan_code: event.scan_code,
        meta_state,
        key_press_meta_state,
        time: event.time,
        printable_key,
        repeat_count: event.repeat_count,
        flags: event.flags,
        synthesized,
    }
}
