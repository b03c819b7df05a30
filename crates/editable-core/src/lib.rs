//! Core data model of the editable bridge: span-annotated text, the dual
//! text store with its sync merge, composition projection, key translation
//! and the input-method context.

pub mod composition;
pub mod context;
pub mod delta;
pub mod error;
pub mod keys;
pub mod settings;
pub mod store;
pub mod text;

pub use composition::{project_composition, CompositionPlan, CompositionSegment, ProjectMode};
pub use context::{ImeContext, InputType, KeyboardRequest};
pub use delta::PendingDelta;
pub use error::EditError;
pub use keys::{translate_key_event, EngineKeyEvent, KeyAction, KeyCharMap, KeyEvent, UsKeyCharMap};
pub use settings::{parse_settings_toml, Settings, SettingsError};
pub use store::{DualTextStore, SyncListener, SyncOutcome, TextChange};
pub use text::{Span, SpanId, SpanObject, SpannedText, TextStyle};
