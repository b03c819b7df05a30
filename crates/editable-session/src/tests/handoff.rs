use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::time::Duration;

use editable_core::settings::Settings;

use crate::editable::{Editable, EditableContext};
use crate::engine::{FocusToken, ImeNotification};
use crate::executor::{same_executor, Executor, ManualExecutor, ThreadExecutor};
use crate::listener::{EditableListener, ListenerSlot, SessionOwner};
use crate::loopback::{HeadlessBridge, LoopbackEngine, Notification, RecordingListener};
use crate::proxy::EditableText;

const WAIT: Duration = Duration::from_secs(5);
const BRIEF: Duration = Duration::from_millis(50);

/// Run `f` on `executor` and wait for its result.
fn run_on<T: Send + 'static>(
    executor: &Arc<ThreadExecutor>,
    f: impl FnOnce() -> T + Send + 'static,
) -> T {
    let (tx, rx) = mpsc::channel();
    executor.post(Box::new(move || {
        let _ = tx.send(f());
    }));
    rx.recv_timeout(WAIT).expect("executor did not run the task")
}

struct Threaded {
    editable: Arc<Editable>,
    engine: Arc<LoopbackEngine>,
    ic: Arc<ThreadExecutor>,
    _owner: Arc<ListenerSlot>,
}

/// Editable owned by a real input-method thread; the test thread plays the
/// engine.
fn threaded(text: &str) -> Threaded {
    let engine = LoopbackEngine::new(FocusToken(7));
    let ic = ThreadExecutor::new("ic-a").unwrap();
    let owner = ListenerSlot::new(Some(RecordingListener::new() as Arc<dyn EditableListener>));
    let ctx = EditableContext::new(engine.clone(), ManualExecutor::new());
    let weak_owner: Weak<dyn SessionOwner> = Arc::downgrade(&owner) as Weak<dyn SessionOwner>;
    let editable = Editable::new(ctx, ic.clone(), weak_owner);
    engine.attach(&editable);
    engine.focus(text);
    run_on(&ic, || ());
    Threaded {
        editable,
        engine,
        ic,
        _owner: owner,
    }
}

#[test]
fn test_handoff_waits_for_in_flight_actions() {
    let t = threaded("hello");
    let b = ThreadExecutor::new("ic-b").unwrap();

    let editable = t.editable.clone();
    run_on(&t.ic, move || editable.editable().replace(5, 5, "!").unwrap());
    assert_eq!(t.engine.pending(), 1);

    t.editable.set_executor(b.clone());
    let (ran_tx, ran_rx) = mpsc::channel();
    b.post(Box::new(move || {
        let _ = ran_tx.send(());
    }));
    // The handoff action goes out from the old thread.
    run_on(&t.ic, || ());
    assert_eq!(t.engine.pending(), 2);
    assert!(ran_rx.recv_timeout(BRIEF).is_err());

    // Reply to the replace: the handoff is still in flight.
    assert!(t.engine.pump_one());
    assert!(ran_rx.recv_timeout(BRIEF).is_err());

    // Reply to the handoff's synchronize: B is released.
    assert!(t.engine.pump_one());
    ran_rx.recv_timeout(WAIT).unwrap();

    let b_dyn: Arc<dyn Executor> = b.clone();
    assert!(same_executor(&t.editable.executor(), &b_dyn));

    let editable = t.editable.clone();
    let text = run_on(&b, move || {
        editable.sync_text();
        editable.editable().text()
    });
    assert_eq!(text, "hello!");
    assert_eq!(t.engine.document(), "hello!");
}

#[test]
fn test_handoffs_release_in_order() {
    let t = threaded("");
    let b = ThreadExecutor::new("ic-b").unwrap();
    let c = ThreadExecutor::new("ic-c").unwrap();

    t.editable.set_executor(b.clone());
    run_on(&t.ic, || ());
    assert!(t.engine.pump_one());
    run_on(&b, || ());

    t.editable.set_executor(c.clone());
    run_on(&b, || ());
    assert!(t.engine.pump_one());
    run_on(&c, || ());

    let c_dyn: Arc<dyn Executor> = c.clone();
    assert!(same_executor(&t.editable.executor(), &c_dyn));
}

#[test]
fn test_handoff_without_engine_completes_immediately() {
    let bridge = HeadlessBridge::new(Settings::default());
    let next = ManualExecutor::new();
    bridge.editable.set_executor(next.clone());

    // Old executor first: it acknowledges and releases the barrier.
    bridge.ic.run_pending();
    assert_eq!(next.run_pending(), 1);
    assert!(bridge.engine.log().is_empty());

    let next_dyn: Arc<dyn Executor> = next.clone();
    assert!(same_executor(&bridge.editable.executor(), &next_dyn));
}

#[test]
fn test_blur_completes_pending_handoff() {
    let bridge = HeadlessBridge::focused(Settings::default(), "hello");
    let next = ManualExecutor::new();
    bridge.editable.set_executor(next.clone());
    bridge.ic.run_pending();
    assert_eq!(bridge.editable.pending_actions(), 1);

    bridge.engine.blur();
    assert_eq!(bridge.editable.pending_actions(), 0);
    bridge.ic.run_pending();
    next.run_pending();

    let next_dyn: Arc<dyn Executor> = next.clone();
    assert!(same_executor(&bridge.editable.executor(), &next_dyn));
    assert!(bridge
        .recorder
        .take()
        .contains(&Notification::Ime(ImeNotification::Blur)));
}

#[test]
fn test_handoff_to_current_executor_is_noop() {
    let bridge = HeadlessBridge::focused(Settings::default(), "hello");
    bridge.engine.take_log();
    bridge.editable.set_executor(bridge.ic.clone());
    assert_eq!(bridge.ic.pending(), 0);
    assert!(bridge.engine.log().is_empty());
}
