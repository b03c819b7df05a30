use editable_core::composition::{CompositionSegment, RangeType};
use editable_core::text::{SpanObject, SpannedText, SPAN_COMPOSING, SPAN_EXCLUSIVE_EXCLUSIVE};

use super::{assert_converged, focused};
use crate::engine::{ImeNotification, COMPOSITION_KEEP_CURRENT};
use crate::loopback::{EngineRequest, Notification};
use crate::proxy::EditableText;

fn composing(text: &str) -> SpannedText {
    let mut spanned = SpannedText::from(text);
    let len = spanned.len();
    spanned
        .set_span(
            SpanObject::marker(),
            0,
            len,
            SPAN_COMPOSING | SPAN_EXCLUSIVE_EXCLUSIVE,
        )
        .unwrap();
    spanned
}

#[test]
fn test_stale_replace_reverts_client() {
    let bridge = focused("hello");
    let proxy = bridge.editable.editable();
    proxy.replace(0, 5, "world").unwrap();
    assert_eq!(proxy.text(), "world");

    // The page rewrites the text before the replace is processed, and the
    // engine then answers the replace without applying it.
    bridge.engine.engine_edit(0, 5, "hi");
    assert!(bridge.engine.reply_only());
    bridge.settle();

    assert_eq!(bridge.client_text(), "hi");
    assert_eq!(bridge.engine.document(), "hi");
    assert_converged(&bridge);
}

#[test]
fn test_replies_correlate_in_order() {
    let bridge = focused("abcdef");
    let proxy = bridge.editable.editable();
    let a = SpanObject::marker();
    let b = SpanObject::marker();
    let c = SpanObject::marker();
    proxy.set_span(a.clone(), 0, 1, SPAN_EXCLUSIVE_EXCLUSIVE).unwrap();
    proxy.set_span(b.clone(), 2, 3, SPAN_EXCLUSIVE_EXCLUSIVE).unwrap();
    proxy.set_span(c.clone(), 4, 5, SPAN_EXCLUSIVE_EXCLUSIVE).unwrap();
    assert_eq!(bridge.editable.pending_actions(), 3);

    assert!(bridge.engine.pump_one());
    // The text under B changes before B is answered.
    bridge.engine.engine_edit(2, 3, "X");
    assert!(bridge.engine.pump_one());
    assert!(bridge.engine.pump_one());

    let engine = bridge.editable.store().engine_snapshot();
    assert!(engine.span(a.id()).is_some());
    assert!(engine.span(b.id()).is_none());
    assert!(engine.span(c.id()).is_some());

    bridge.settle();
    let client = bridge.editable.store().client_snapshot();
    assert_eq!(client.as_string(), "abXdef");
    assert!(client.span(b.id()).is_none());
    assert_converged(&bridge);
}

#[test]
fn test_selection_ignored_once_after_remote_replace() {
    let bridge = focused("hello");
    let proxy = bridge.editable.editable();
    proxy.set_selection(0, 0).unwrap();
    bridge.settle();
    assert_eq!(bridge.client_selection(), Some((0, 0)));

    proxy.replace(5, 5, "!").unwrap();
    bridge.settle();
    assert_eq!(bridge.client_text(), "hello!");
    assert_eq!(bridge.client_selection(), Some((0, 0)));

    // Only the echo of the replace was skipped.
    bridge.engine.engine_select(2, 2);
    bridge.settle();
    assert_eq!(bridge.client_selection(), Some((2, 2)));
}

#[test]
fn test_selection_move_sends_one_update() {
    let bridge = focused("hello");
    let proxy = bridge.editable.editable();
    proxy.set_selection(0, 0).unwrap();
    bridge.settle();
    bridge.engine.take_log();

    proxy.set_selection(3, 4).unwrap();
    let updates: Vec<EngineRequest> = bridge
        .engine
        .take_log()
        .into_iter()
        .filter(|r| matches!(r, EngineRequest::UpdateComposition { .. }))
        .collect();
    assert_eq!(
        updates,
        vec![EngineRequest::UpdateComposition {
            start: 3,
            end: 4,
            flags: COMPOSITION_KEEP_CURRENT
        }]
    );

    bridge.settle();
    assert_eq!(bridge.client_selection(), Some((3, 4)));
    assert_eq!(bridge.engine.selection(), (3, 4));
    assert_converged(&bridge);
}

#[test]
fn test_composing_replace_sends_composition() {
    let bridge = focused("hello");
    bridge.engine.take_log();
    let proxy = bridge.editable.editable();
    proxy.replace_spanned(5, 5, composing("ka")).unwrap();

    assert_eq!(
        bridge.engine.take_log(),
        vec![
            EngineRequest::AddCompositionRange(CompositionSegment::caret(2)),
            EngineRequest::AddCompositionRange(CompositionSegment {
                start: 0,
                end: 2,
                range_type: RangeType::RawInput,
                ..CompositionSegment::caret(0)
            }),
            EngineRequest::UpdateComposition {
                start: 5,
                end: 7,
                flags: 0
            },
            EngineRequest::ReplaceText {
                start: 5,
                end: 5,
                text: "ka".into()
            },
        ]
    );
    assert_eq!(bridge.engine.composition(), Some((5, 7)));

    bridge.settle();
    assert_eq!(proxy.composing_range(), Some((5, 7)));
    assert_eq!(
        bridge.editable.store().with_engine(SpannedText::composing_range),
        Some((5, 7))
    );
    assert_converged(&bridge);
}

#[test]
fn test_commit_notification_ends_composition() {
    let bridge = focused("hello");
    let proxy = bridge.editable.editable();
    proxy.replace_spanned(5, 5, composing("ka")).unwrap();
    bridge.settle();
    bridge.engine.take_log();
    bridge.recorder.take();

    bridge.engine.notify(ImeNotification::CommitComposition);
    bridge.settle();

    assert_eq!(
        bridge.engine.take_log(),
        vec![EngineRequest::Synchronize, EngineRequest::RequestCommit]
    );
    assert_eq!(proxy.composing_range(), None);
    assert!(!bridge.editable.store().with_engine(SpannedText::has_composing));
    assert!(bridge
        .recorder
        .take()
        .contains(&Notification::Ime(ImeNotification::CommitComposition)));
    assert_eq!(bridge.client_text(), "helloka");
    assert_converged(&bridge);
}

#[test]
fn test_engine_delete_discards_composition() {
    let bridge = focused("hello");
    let proxy = bridge.editable.editable();
    proxy.replace_spanned(5, 5, composing("ka")).unwrap();
    bridge.settle();
    bridge.recorder.take();

    bridge.engine.engine_edit(5, 7, "");
    bridge.settle();

    let seen = bridge.recorder.take();
    assert_eq!(seen.first(), Some(&Notification::DiscardComposition));
    assert!(matches!(seen.get(1), Some(Notification::TextChange(_))));
    assert_eq!(proxy.composing_range(), None);
    assert_eq!(bridge.client_text(), "hello");
    assert_converged(&bridge);
}
