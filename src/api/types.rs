use editable_core::composition::{CompositionSegment, LineStyle, RangeType};
use editable_core::context::{ImeContext, InputType};
use editable_core::keys::{EngineKeyEvent, KeyAction, KeyEvent};
use editable_core::store::TextChange;
use editable_core::text::TextStyle;
use editable_core::{EditError, SettingsError};
use editable_session::Rect;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum BridgeError {
    #[error("invalid range: {msg}")]
    InvalidRange { msg: String },
    #[error("invalid data: {msg}")]
    InvalidData { msg: String },
    #[error("internal error: {msg}")]
    Internal { msg: String },
}

impl From<EditError> for BridgeError {
    fn from(e: EditError) -> Self {
        match e {
            EditError::InvalidRange { .. } => Self::InvalidRange { msg: e.to_string() },
            EditError::UnknownSpan(_) => Self::InvalidData { msg: e.to_string() },
        }
    }
}

impl From<SettingsError> for BridgeError {
    fn from(e: SettingsError) -> Self {
        Self::InvalidData { msg: e.to_string() }
    }
}

// ---------------------------------------------------------------------------
// Records (value types, copied across FFI boundary)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct BridgeRange {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct BridgeTextChange {
    pub start: u32,
    pub old_end: u32,
    pub new_end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct BridgeRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct BridgeKeyEvent {
    pub action: BridgeKeyAction,
    pub key_code: u16,
    pub scan_code: u32,
    pub meta_state: u32,
    pub time: i64,
    pub repeat_count: u32,
    pub flags: u32,
}

/// Key message for the engine, including the keypress meta state and the
/// printable key value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct BridgeEngineKeyEvent {
    pub action: BridgeKeyAction,
    pub key_code: u16,
    pub scan_code: u32,
    pub meta_state: u32,
    pub key_press_meta_state: u32,
    pub time: i64,
    pub printable_key: u32,
    pub repeat_count: u32,
    pub flags: u32,
    pub synthesized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct BridgeSegment {
    pub start: u32,
    pub end: u32,
    pub range_type: BridgeRangeType,
    pub styles: u32,
    pub line_style: BridgeLineStyle,
    pub bold_line: bool,
    pub foreground: u32,
    pub background: u32,
    pub line_color: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct BridgeImeContext {
    pub state: i32,
    pub type_hint: String,
    pub mode_hint: String,
    pub action_hint: String,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, uniffi::Record)]
pub struct BridgeTextStyle {
    pub underline: bool,
    pub underline_color: u32,
    pub underline_thickness: f32,
    pub foreground: u32,
    pub background: u32,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum BridgeKeyAction {
    Down,
    Up,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum BridgeRangeType {
    CaretPosition,
    RawInput,
    SelectedRawText,
    ConvertedText,
    SelectedConvertedText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum BridgeLineStyle {
    None,
    Solid,
    Dotted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum BridgeInputType {
    None,
    Text,
    Password,
    Number,
    Decimal,
    Phone,
    Email,
    Url,
    Search,
    DateTime,
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Offsets cross the boundary as u32; anything larger saturates.
pub(super) fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

pub(super) fn range(r: (usize, usize)) -> BridgeRange {
    BridgeRange {
        start: to_u32(r.0),
        end: to_u32(r.1),
    }
}

impl From<KeyAction> for BridgeKeyAction {
    fn from(a: KeyAction) -> Self {
        match a {
            KeyAction::Down => Self::Down,
            KeyAction::Up => Self::Up,
            KeyAction::Multiple => Self::Multiple,
        }
    }
}

impl From<BridgeKeyAction> for KeyAction {
    fn from(a: BridgeKeyAction) -> Self {
        match a {
            BridgeKeyAction::Down => Self::Down,
            BridgeKeyAction::Up => Self::Up,
            BridgeKeyAction::Multiple => Self::Multiple,
        }
    }
}

impl From<BridgeKeyEvent> for KeyEvent {
    fn from(e: BridgeKeyEvent) -> Self {
        Self {
            action: e.action.into(),
            key_code: e.key_code,
            scan_code: e.scan_code,
            meta_state: e.meta_state,
            time: e.time,
            repeat_count: e.repeat_count,
            flags: e.flags,
        }
    }
}

impl From<&KeyEvent> for BridgeKeyEvent {
    fn from(e: &KeyEvent) -> Self {
        Self {
            action: e.action.into(),
            key_code: e.key_code,
            scan_code: e.scan_code,
            meta_state: e.meta_state,
            time: e.time,
            repeat_count: e.repeat_count,
            flags: e.flags,
        }
    }
}

impl From<&EngineKeyEvent> for BridgeEngineKeyEvent {
    fn from(e: &EngineKeyEvent) -> Self {
        Self {
            action: e.action.into(),
            key_code: e.key_code,
            scan_code: e.scan_code,
            meta_state: e.meta_state,
            key_press_meta_state: e.key_press_meta_state,
            time: e.time,
            printable_key: e.printable_key,
            repeat_count: e.repeat_count,
            flags: e.flags,
            synthesized: e.synthesized,
        }
    }
}

impl From<&CompositionSegment> for BridgeSegment {
    fn from(s: &CompositionSegment) -> Self {
        Self {
            start: to_u32(s.start),
            end: to_u32(s.end),
            range_type: match s.range_type {
                RangeType::CaretPosition => BridgeRangeType::CaretPosition,
                RangeType::RawInput => BridgeRangeType::RawInput,
                RangeType::SelectedRawText => BridgeRangeType::SelectedRawText,
                RangeType::ConvertedText => BridgeRangeType::ConvertedText,
                RangeType::SelectedConvertedText => BridgeRangeType::SelectedConvertedText,
            },
            styles: s.styles,
            line_style: match s.line_style {
                LineStyle::None => BridgeLineStyle::None,
                LineStyle::Solid => BridgeLineStyle::Solid,
                LineStyle::Dotted => BridgeLineStyle::Dotted,
            },
            bold_line: s.bold_line,
            foreground: s.foreground,
            background: s.background,
            line_color: s.line_color,
        }
    }
}

impl From<TextChange> for BridgeTextChange {
    fn from(c: TextChange) -> Self {
        Self {
            start: to_u32(c.start),
            old_end: to_u32(c.old_end),
            new_end: to_u32(c.new_end),
        }
    }
}

impl From<BridgeRect> for Rect {
    fn from(r: BridgeRect) -> Self {
        Self {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        }
    }
}

impl From<&Rect> for BridgeRect {
    fn from(r: &Rect) -> Self {
        Self {
            left: r.left,
            top: r.top,
            right: r.right,
            bottom: r.bottom,
        }
    }
}

impl From<BridgeImeContext> for ImeContext {
    fn from(c: BridgeImeContext) -> Self {
        Self {
            state: c.state,
            type_hint: c.type_hint,
            mode_hint: c.mode_hint,
            action_hint: c.action_hint,
            flags: c.flags,
        }
    }
}

impl From<&ImeContext> for BridgeImeContext {
    fn from(c: &ImeContext) -> Self {
        Self {
            state: c.state,
            type_hint: c.type_hint.clone(),
            mode_hint: c.mode_hint.clone(),
            action_hint: c.action_hint.clone(),
            flags: c.flags,
        }
    }
}

impl From<InputType> for BridgeInputType {
    fn from(t: InputType) -> Self {
        match t {
            InputType::None => Self::None,
            InputType::Text => Self::Text,
            InputType::Password => Self::Password,
            InputType::Number => Self::Number,
            InputType::Decimal => Self::Decimal,
            InputType::Phone => Self::Phone,
            InputType::Email => Self::Email,
            InputType::Url => Self::Url,
            InputType::Search => Self::Search,
            InputType::DateTime => Self::DateTime,
        }
    }
}

impl From<BridgeTextStyle> for TextStyle {
    fn from(s: BridgeTextStyle) -> Self {
        Self {
            underline: s.underline,
            underline_color: s.underline_color,
            underline_thickness: s.underline_thickness,
            foreground: s.foreground,
            background: s.background,
        }
    }
}
