//! Synchronization between an engine-side editable and the platform input
//! method.
//!
//! [`Editable`] owns the dual text store and the action queue. Input-method
//! edits go through [`EditableProxy`] and become actions; engine events
//! reconcile them and schedule syncs back to the client buffer.

mod action;
mod editable;
pub mod engine;
pub mod executor;
mod handoff;
pub mod keys;
pub mod listener;
pub mod loopback;
mod proxy;
mod queue;

#[cfg(test)]
mod tests;

pub use action::{Action, ActionType};
pub use editable::{Editable, EditableContext};
pub use engine::{EngineChannel, FocusToken, ImeNotification, Rect, TransportError};
pub use executor::{Executor, ManualExecutor, Task, ThreadExecutor};
pub use keys::{KeyListener, TextKeyListener};
pub use listener::{EditableListener, ListenerSlot, SessionOwner};
pub use loopback::{HeadlessBridge, LoopbackEngine};
pub use proxy::{EditableProxy, EditableText};
