//! UniFFI export layer: bindings for the platform input-method adapter.
//!
//! Each public type here maps to a generated Kotlin class, record, enum or
//! callback interface.

mod editable;
mod host;
mod types;

pub use editable::{BridgeEditable, OLD_END_UNBOUNDED};
pub use host::{BridgeEngine, BridgeListener};
pub use types::{
    BridgeEngineKeyEvent, BridgeError, BridgeImeContext, BridgeInputType, BridgeKeyAction,
    BridgeKeyEvent, BridgeLineStyle, BridgeRange, BridgeRangeType, BridgeRect, BridgeSegment,
    BridgeTextChange, BridgeTextStyle,
};

use std::path::Path;

// ---------------------------------------------------------------------------
// Top-level functions
// ---------------------------------------------------------------------------

#[uniffi::export]
fn bridge_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[uniffi::export]
fn settings_default_config() -> String {
    editable_core::settings::DEFAULT_SETTINGS_TOML.to_string()
}

/// Parse and validate a settings file without applying it.
#[uniffi::export]
fn settings_validate(path: String) -> Result<(), BridgeError> {
    let content = std::fs::read_to_string(&path).map_err(|e| BridgeError::InvalidData {
        msg: format!("{path}: {e}"),
    })?;
    editable_core::settings::parse_settings_toml(&content)?;
    Ok(())
}

#[uniffi::export]
fn trace_init(log_dir: String) {
    crate::trace_init::init_tracing(Path::new(&log_dir));
}
