//! Diagnostics for the editable bridge: replay edit scripts against the
//! loopback engine and check settings files.

pub mod commands;
pub mod script;
