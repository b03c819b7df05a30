//! Outbound requests to the rendering engine and the inbound notification kinds.

use editable_core::composition::CompositionSegment;
use editable_core::keys::EngineKeyEvent;

/// Identity of the focused remote editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FocusToken(pub u64);

/// `update_composition` flag: keep the engine's current composition string
/// and only restyle it.
pub const COMPOSITION_KEEP_CURRENT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("engine channel closed")]
    Closed,
    #[error("engine rejected request: {0}")]
    Rejected(String),
}

/// Ordered channel to the focused engine editable.
///
/// Every `synchronize` and `replace_text` call is answered by exactly one
/// [`ImeNotification::ReplyEvent`], in send order. The other requests carry
/// no reply.
pub trait EngineChannel: Send + Sync {
    fn synchronize(&self) -> Result<(), TransportError>;

    fn replace_text(&self, start: usize, end: usize, text: &str) -> Result<(), TransportError>;

    /// Offsets are relative to the composition start passed to the
    /// following `update_composition`.
    fn add_composition_range(&self, segment: &CompositionSegment) -> Result<(), TransportError>;

    /// Without preceding ranges, `[start, end)` is a selection and any
    /// composition ends.
    fn update_composition(&self, start: usize, end: usize, flags: u32)
        -> Result<(), TransportError>;

    fn request_commit(&self) -> Result<(), TransportError>;

    fn request_cursor_updates(&self, mode: u32) -> Result<(), TransportError>;

    fn send_key_event(&self, event: &EngineKeyEvent) -> Result<(), TransportError>;
}

/// Notification kinds delivered through `notify_ime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImeNotification {
    Token,
    OpenVkb,
    ReplyEvent,
    Focus,
    Blur,
    CommitComposition,
    CancelComposition,
}

impl ImeNotification {
    pub fn code(self) -> i32 {
        match self {
            Self::Token => -3,
            Self::OpenVkb => -2,
            Self::ReplyEvent => -1,
            Self::Focus => 1,
            Self::Blur => 2,
            Self::CommitComposition => 8,
            Self::CancelComposition => 9,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -3 => Self::Token,
            -2 => Self::OpenVkb,
            -1 => Self::ReplyEvent,
            1 => Self::Focus,
            2 => Self::Blur,
            8 => Self::CommitComposition,
            9 => Self::CancelComposition,
            _ => return None,
        })
    }
}

/// Screen rectangle of one composition character, in host pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}
