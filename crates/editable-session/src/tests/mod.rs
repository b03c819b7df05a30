mod handoff;
mod proptest_sync;
mod reconcile;

use editable_core::settings::Settings;

use crate::loopback::HeadlessBridge;

/// Bridge focused on `text` with default settings.
pub(super) fn focused(text: &str) -> HeadlessBridge {
    HeadlessBridge::focused(Settings::default(), text)
}

/// Both buffers and the engine document hold the same content.
pub(super) fn assert_converged(bridge: &HeadlessBridge) {
    let client = bridge.editable.store().client_snapshot();
    let engine = bridge.editable.store().engine_snapshot();
    assert!(
        client.content_eq(&engine),
        "client {client:?} != engine {engine:?}"
    );
    assert_eq!(engine.as_string(), bridge.engine.document());
}
