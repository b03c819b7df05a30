//! Dual text store: the engine-side (authoritative) buffer, the client-side
//! (input-method visible) buffer, and the merge that brings the client side
//! back in line with the engine side.
//!
//! Engine-side mutators run on the engine thread; client-side mutators run on
//! the current input-method thread. Both buffers sit behind mutexes so that
//! readers on other threads see a consistent snapshot. Lock order is always
//! client before engine.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, debug_span, warn};

use crate::delta::PendingDelta;
use crate::error::EditError;
use crate::text::{Span, SpanId, SpanObject, SpannedText};

/// Range reported to the host after a sync, in client coordinates:
/// `[start, old_end)` of the previous client text became `[start, new_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChange {
    pub start: usize,
    pub old_end: usize,
    pub new_end: usize,
}

/// Receives the notifications produced by [`DualTextStore::sync`].
pub trait SyncListener {
    /// The client had a composition and the engine text no longer has one.
    fn on_discard_composition(&self) {}
    fn on_text_change(&self, change: TextChange);
    fn on_selection_change(&self, selection: Option<(usize, usize)>);
}

/// What a sync pass did, in notification order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub discarded_composition: bool,
    pub text_change: Option<TextChange>,
    pub selection_changed: bool,
    pub selection: Option<(usize, usize)>,
}

impl SyncOutcome {
    pub fn dispatch(&self, listener: &dyn SyncListener) {
        if self.discarded_composition {
            listener.on_discard_composition();
        }
        if let Some(change) = self.text_change {
            listener.on_text_change(change);
        }
        if self.selection_changed {
            listener.on_selection_change(self.selection);
        }
    }
}

#[derive(Default)]
struct Side {
    text: SpannedText,
    delta: PendingDelta,
}

impl Side {
    fn replace(&mut self, start: usize, end: usize, text: &SpannedText) -> Result<(), EditError> {
        self.text.replace_spanned(start, end, text)?;
        self.delta.merge(start, end, start + text.len());
        Ok(())
    }

    fn set_span(
        &mut self,
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), EditError> {
        if object.is_selection() {
            self.text.set_span(object, start, end, flags)?;
            self.delta.mark_selection_changed();
            return Ok(());
        }
        let previous = self.text.span(object.id()).map(|s| (s.start, s.end));
        self.text.set_span(object, start, end, flags)?;
        if let Some((old_start, old_end)) = previous {
            self.delta.merge(old_start, old_end, old_end);
        }
        self.delta.merge(start, end, end);
        Ok(())
    }

    fn remove_span(&mut self, id: SpanId) -> Option<Span> {
        let span = self.text.remove_span(id)?;
        if span.object.is_selection() {
            self.delta.mark_selection_changed();
        } else {
            self.delta.merge(span.start, span.end, span.end);
        }
        Some(span)
    }
}

pub struct DualTextStore {
    client: Mutex<Side>,
    engine: Mutex<Side>,
    check_consistency: bool,
}

fn lock(side: &Mutex<Side>) -> MutexGuard<'_, Side> {
    side.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DualTextStore {
    /// `check_consistency` enables the post-sync equality assertion in debug builds.
    pub fn new(check_consistency: bool) -> Self {
        Self {
            client: Mutex::new(Side::default()),
            engine: Mutex::new(Side::default()),
            check_consistency,
        }
    }

    // -----------------------------------------------------------------------
    // Client side (input-method thread)
    // -----------------------------------------------------------------------

    pub fn with_client<R>(&self, f: impl FnOnce(&SpannedText) -> R) -> R {
        f(&lock(&self.client).text)
    }

    pub fn client_snapshot(&self) -> SpannedText {
        self.with_client(SpannedText::clone)
    }

    pub fn client_replace(
        &self,
        start: usize,
        end: usize,
        text: &SpannedText,
    ) -> Result<(), EditError> {
        lock(&self.client).replace(start, end, text)
    }

    pub fn client_set_span(
        &self,
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), EditError> {
        lock(&self.client).set_span(object, start, end, flags)
    }

    pub fn client_remove_span(&self, id: SpanId) -> Option<Span> {
        lock(&self.client).remove_span(id)
    }

    // -----------------------------------------------------------------------
    // Engine side (engine thread)
    // -----------------------------------------------------------------------

    pub fn with_engine<R>(&self, f: impl FnOnce(&SpannedText) -> R) -> R {
        f(&lock(&self.engine).text)
    }

    pub fn engine_snapshot(&self) -> SpannedText {
        self.with_engine(SpannedText::clone)
    }

    pub fn engine_len(&self) -> usize {
        self.with_engine(SpannedText::len)
    }

    pub fn engine_replace(
        &self,
        start: usize,
        end: usize,
        text: &SpannedText,
    ) -> Result<(), EditError> {
        lock(&self.engine).replace(start, end, text)
    }

    pub fn engine_set_span(
        &self,
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), EditError> {
        lock(&self.engine).set_span(object, start, end, flags)
    }

    pub fn engine_remove_span(&self, id: SpanId) -> Option<Span> {
        lock(&self.engine).remove_span(id)
    }

    pub fn engine_set_selection(&self, start: usize, end: usize) -> Result<(), EditError> {
        let mut engine = lock(&self.engine);
        engine.text.set_selection(start, end)?;
        engine.delta.mark_selection_changed();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Merge engine-side changes into the client buffer. Notifications are
    /// delivered after both locks are released.
    pub fn sync(&self, listener: Option<&dyn SyncListener>) -> SyncOutcome {
        let _span = debug_span!("sync").entered();
        let outcome = {
            let mut client = lock(&self.client);
            let mut engine = lock(&self.engine);
            self.sync_locked(&mut client, &mut engine)
        };
        debug!(?outcome);
        if let Some(listener) = listener {
            outcome.dispatch(listener);
        }
        outcome
    }

    fn sync_locked(&self, client: &mut Side, engine: &mut Side) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        if client.delta.is_empty() && engine.delta.is_empty() {
            if engine.delta.selection_changed() {
                let selection = engine.text.selection();
                apply_selection(&mut client.text, selection);
                outcome.selection_changed = true;
                outcome.selection = selection;
            }
            client.delta.reset();
            engine.delta.reset();
            return outcome;
        }

        let had_composing = client.text.has_composing();
        let start = client.delta.start().min(engine.delta.start());
        // Each side's end is widened by the part of the other side's old range
        // that extends past its own.
        let client_end = client.delta.new_end()
            + engine
                .delta
                .old_end()
                .saturating_sub(client.delta.old_end());
        let engine_end = engine.delta.new_end()
            + client
                .delta
                .old_end()
                .saturating_sub(engine.delta.old_end());

        let change = match copy_range(&mut client.text, &engine.text, start, client_end, engine_end)
        {
            Ok(()) => TextChange {
                start,
                old_end: client_end,
                new_end: engine_end,
            },
            Err(e) => {
                warn!("range sync failed, copying whole text: {e}");
                let old_len = client.text.len();
                client.text = engine.text.clone();
                TextChange {
                    start: 0,
                    old_end: old_len,
                    new_end: engine.text.len(),
                }
            }
        };

        // The buffer's own selection fix-up during replace is not trusted.
        let selection = engine.text.selection();
        apply_selection(&mut client.text, selection);

        if self.check_consistency {
            debug_assert!(
                client.text.content_eq(&engine.text),
                "failed to sync: client {:?} != engine {:?}",
                client.text,
                engine.text
            );
        }

        let engine_start = engine.delta.start();
        outcome.discarded_composition = had_composing && !engine.text.has_composing();
        outcome.text_change = Some(change);
        outcome.selection_changed = engine.delta.selection_changed()
            || (engine.delta.old_end() != engine.delta.new_end()
                && selection.is_some_and(|(s, e)| s >= engine_start || e >= engine_start));
        outcome.selection = selection;

        client.delta.reset();
        engine.delta.reset();
        outcome
    }

    /// Drop every pending change on both sides and make both buffers `text`.
    pub fn reset(&self, text: &SpannedText) {
        let mut client = lock(&self.client);
        let mut engine = lock(&self.engine);
        client.text = text.clone();
        engine.text = text.clone();
        client.delta.reset();
        engine.delta.reset();
    }
}

fn copy_range(
    client: &mut SpannedText,
    engine: &SpannedText,
    start: usize,
    client_end: usize,
    engine_end: usize,
) -> Result<(), EditError> {
    let stale: Vec<SpanId> = client
        .spans_touching(start, client_end)
        .map(|s| s.object.id())
        .collect();
    for id in stale {
        client.remove_span(id);
    }
    let replacement = engine.substring(start, engine_end)?;
    client.replace(start, client_end, &replacement)?;
    for span in engine.spans_touching(start, engine_end) {
        client.set_span(span.object.clone(), span.start, span.end, span.flags)?;
    }
    Ok(())
}

fn apply_selection(text: &mut SpannedText, selection: Option<(usize, usize)>) {
    match selection {
        Some((start, end)) => {
            let len = text.len();
            // Clamped values are always in range.
            let _ = text.set_selection(start.min(len), end.min(len));
        }
        None => text.clear_selection(),
    }
}
