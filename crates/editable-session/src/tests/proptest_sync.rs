//! Property-based convergence test for the editable bridge.
//!
//! Interleaves random client edits, engine edits, replies and batches, then
//! drains everything and checks that the client buffer, the engine buffer and
//! the engine's own document agree.

use proptest::prelude::*;

use editable_core::settings::Settings;
use editable_core::text::{SpanObject, SPAN_COMPOSING, SPAN_EXCLUSIVE_EXCLUSIVE};

use super::assert_converged;
use crate::loopback::HeadlessBridge;
use crate::proxy::EditableText;

// ---------------------------------------------------------------------------
// Step enum: one thing that can happen to a focused editable
// ---------------------------------------------------------------------------

/// Positions are taken modulo the current length, so every step is valid.
#[derive(Debug, Clone)]
enum Step {
    Insert(usize, String),
    Delete(usize, usize),
    Select(usize, usize),
    Compose(usize, usize),
    Uncompose,
    EngineEdit(usize, usize, String),
    EngineSelect(usize, usize),
    PumpOne,
    RunIc,
    BeginBatch,
    EndBatch,
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-c]",
        1 => "[a-c ]{2,4}",
        1 => Just(String::new()),
    ]
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        10 => (any::<usize>(), arb_text()).prop_map(|(p, t)| Step::Insert(p, t)),
        4 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::Delete(a, b)),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::Select(a, b)),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::Compose(a, b)),
        2 => Just(Step::Uncompose),
        6 => (any::<usize>(), any::<usize>(), arb_text())
            .prop_map(|(a, b, t)| Step::EngineEdit(a, b, t)),
        2 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::EngineSelect(a, b)),
        8 => Just(Step::PumpOne),
        6 => Just(Step::RunIc),
        2 => Just(Step::BeginBatch),
        2 => Just(Step::EndBatch),
    ]
}

/// Ordered range inside `[0, len]`.
fn range(len: usize, a: usize, b: usize) -> (usize, usize) {
    let (a, b) = (a % (len + 1), b % (len + 1));
    (a.min(b), a.max(b))
}

fn apply(bridge: &HeadlessBridge, batch_depth: &mut u32, step: &Step) {
    let proxy = bridge.editable.editable();
    let len = proxy.len();
    match step {
        Step::Insert(p, text) => {
            let p = p % (len + 1);
            proxy.replace(p, p, text).unwrap();
        }
        Step::Delete(a, b) => {
            let (start, end) = range(len, *a, *b);
            proxy.replace(start, end, "").unwrap();
        }
        Step::Select(a, b) => {
            let (start, end) = range(len, *a, *b);
            proxy.set_selection(start, end).unwrap();
        }
        Step::Compose(a, b) => {
            let (start, end) = range(len, *a, *b);
            if start < end {
                proxy
                    .set_span(
                        SpanObject::marker(),
                        start,
                        end,
                        SPAN_COMPOSING | SPAN_EXCLUSIVE_EXCLUSIVE,
                    )
                    .unwrap();
            }
        }
        Step::Uncompose => {
            for span in proxy.spans().into_iter().filter(|s| s.is_composing()) {
                proxy.remove_span(span.object.id()).unwrap();
            }
        }
        Step::EngineEdit(a, b, text) => {
            let doc_len = bridge.engine.document().chars().count();
            let (start, end) = range(doc_len, *a, *b);
            bridge.engine.engine_edit(start, end, text);
        }
        Step::EngineSelect(a, b) => {
            let doc_len = bridge.engine.document().chars().count();
            let (start, end) = range(doc_len, *a, *b);
            bridge.engine.engine_select(start, end);
        }
        Step::PumpOne => {
            bridge.engine.pump_one();
        }
        Step::RunIc => {
            bridge.ic.run_pending();
            bridge.ui.run_pending();
        }
        Step::BeginBatch => {
            bridge.editable.set_batch_mode(true);
            *batch_depth += 1;
        }
        Step::EndBatch => {
            if *batch_depth > 0 {
                bridge.editable.set_batch_mode(false);
                *batch_depth -= 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// proptest entry point
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn buffers_converge_after_drain(
        initial in "[a-c]{0,6}",
        steps in prop::collection::vec(arb_step(), 1..60),
    ) {
        let bridge = HeadlessBridge::focused(Settings::default(), &initial);
        let mut batch_depth = 0;
        for step in &steps {
            apply(&bridge, &mut batch_depth, step);
        }

        bridge.settle();
        for _ in 0..batch_depth {
            bridge.editable.set_batch_mode(false);
        }
        bridge.settle();
        bridge.editable.sync_text();

        prop_assert_eq!(bridge.editable.pending_actions(), 0);
        assert_converged(&bridge);
    }
}
