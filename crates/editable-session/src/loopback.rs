//! In-process engine stand-in and a headless driver around it.
//!
//! `LoopbackEngine` keeps its own document, answers `synchronize` and
//! `replace_text` in order when pumped, and echoes text and selection
//! changes back like a real engine would. `HeadlessBridge` wires an
//! `Editable` to it with manual executors so a single thread can drive
//! every side.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use editable_core::composition::CompositionSegment;
use editable_core::context::{ImeContext, InputType, IME_STATE_ENABLED};
use editable_core::keys::{EngineKeyEvent, KeyEvent};
use editable_core::settings::Settings;
use editable_core::store::TextChange;

use crate::editable::{Editable, EditableContext};
use crate::engine::{EngineChannel, FocusToken, ImeNotification, Rect, TransportError};
use crate::executor::ManualExecutor;
use crate::listener::{EditableListener, ListenerSlot, SessionOwner};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One outbound request, as logged by the loopback engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineRequest {
    Synchronize,
    ReplaceText {
        start: usize,
        end: usize,
        text: String,
    },
    AddCompositionRange(CompositionSegment),
    UpdateComposition {
        start: usize,
        end: usize,
        flags: u32,
    },
    RequestCommit,
    RequestCursorUpdates(u32),
    KeyEvent(EngineKeyEvent),
}

enum Inbound {
    TextChange {
        start: usize,
        old_end: usize,
        text: String,
    },
    SelectionChange(usize, usize),
    Notify(ImeNotification),
    Context(ImeContext),
}

struct LoopbackState {
    editable: Weak<Editable>,
    text: Vec<char>,
    selection: (usize, usize),
    composition: Option<(usize, usize)>,
    pending_ranges: Vec<CompositionSegment>,
    /// Requests awaiting a reply, in send order.
    inbox: VecDeque<EngineRequest>,
    log: Vec<EngineRequest>,
    failing: bool,
}

pub struct LoopbackEngine {
    token: FocusToken,
    state: Mutex<LoopbackState>,
}

impl LoopbackEngine {
    pub fn new(token: FocusToken) -> Arc<Self> {
        Arc::new(Self {
            token,
            state: Mutex::new(LoopbackState {
                editable: Weak::new(),
                text: Vec::new(),
                selection: (0, 0),
                composition: None,
                pending_ranges: Vec::new(),
                inbox: VecDeque::new(),
                log: Vec::new(),
                failing: false,
            }),
        })
    }

    pub fn attach(&self, editable: &Arc<Editable>) {
        lock(&self.state).editable = Arc::downgrade(editable);
    }

    pub fn token(&self) -> FocusToken {
        self.token
    }

    pub fn document(&self) -> String {
        lock(&self.state).text.iter().collect()
    }

    pub fn selection(&self) -> (usize, usize) {
        lock(&self.state).selection
    }

    pub fn composition(&self) -> Option<(usize, usize)> {
        lock(&self.state).composition
    }

    /// Requests waiting for a reply.
    pub fn pending(&self) -> usize {
        lock(&self.state).inbox.len()
    }

    pub fn log(&self) -> Vec<EngineRequest> {
        lock(&self.state).log.clone()
    }

    pub fn take_log(&self) -> Vec<EngineRequest> {
        std::mem::take(&mut lock(&self.state).log)
    }

    pub fn key_events(&self) -> Vec<EngineKeyEvent> {
        lock(&self.state)
            .log
            .iter()
            .filter_map(|r| match r {
                EngineRequest::KeyEvent(e) => Some(*e),
                _ => None,
            })
            .collect()
    }

    /// Make every request fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    // -----------------------------------------------------------------------
    // Engine-initiated events
    // -----------------------------------------------------------------------

    /// Focus an editable holding `text` with the caret at its end.
    pub fn focus(&self, text: &str) {
        let len = {
            let mut st = lock(&self.state);
            st.text = text.chars().collect();
            st.selection = (st.text.len(), st.text.len());
            st.composition = None;
            st.text.len()
        };
        self.deliver(vec![
            Inbound::Notify(ImeNotification::Token),
            Inbound::Context(ImeContext {
                state: IME_STATE_ENABLED,
                type_hint: "text".into(),
                ..ImeContext::default()
            }),
            Inbound::TextChange {
                start: 0,
                old_end: usize::MAX,
                text: text.into(),
            },
            Inbound::SelectionChange(len, len),
            Inbound::Notify(ImeNotification::Focus),
        ]);
    }

    pub fn blur(&self) {
        {
            let mut st = lock(&self.state);
            st.inbox.clear();
            st.composition = None;
        }
        self.deliver(vec![Inbound::Notify(ImeNotification::Blur)]);
    }

    pub fn notify(&self, kind: ImeNotification) {
        if kind == ImeNotification::CommitComposition || kind == ImeNotification::CancelComposition
        {
            lock(&self.state).composition = None;
        }
        self.deliver(vec![Inbound::Notify(kind)]);
    }

    pub fn set_context(&self, context: ImeContext) {
        self.deliver(vec![Inbound::Context(context)]);
    }

    /// A page script edits the document.
    pub fn engine_edit(&self, start: usize, end: usize, text: &str) {
        let events = {
            let mut st = lock(&self.state);
            st.apply_replace(start, end, text)
        };
        self.deliver(events);
    }

    pub fn engine_select(&self, start: usize, end: usize) {
        let selection = {
            let mut st = lock(&self.state);
            let len = st.text.len();
            st.selection = (start.min(len), end.min(len));
            st.selection
        };
        self.deliver(vec![Inbound::SelectionChange(selection.0, selection.1)]);
    }

    pub fn default_key_event(&self, event: KeyEvent) {
        let editable = lock(&self.state).editable.upgrade();
        if let Some(editable) = editable {
            editable.on_default_key_event(Some(self.token), event);
        }
    }

    pub fn composition_rects(&self, rects: Vec<Rect>) {
        let editable = lock(&self.state).editable.upgrade();
        if let Some(editable) = editable {
            editable.update_composition_rects(Some(self.token), rects);
        }
    }

    // -----------------------------------------------------------------------
    // Request processing
    // -----------------------------------------------------------------------

    /// Process the oldest pending request. Returns false when none is pending.
    pub fn pump_one(&self) -> bool {
        let events = {
            let mut st = lock(&self.state);
            let Some(request) = st.inbox.pop_front() else {
                return false;
            };
            let mut events = match request {
                EngineRequest::ReplaceText { start, end, text } => {
                    st.apply_replace(start, end, &text)
                }
                _ => Vec::new(),
            };
            events.push(Inbound::Notify(ImeNotification::ReplyEvent));
            events
        };
        self.deliver(events);
        true
    }

    /// Process every pending request. Returns how many were processed.
    pub fn pump(&self) -> usize {
        let mut n = 0;
        while self.pump_one() {
            n += 1;
        }
        n
    }

    /// Answer the oldest pending request without applying it, as an engine
    /// that rejected the edit would.
    pub fn reply_only(&self) -> bool {
        if lock(&self.state).inbox.pop_front().is_none() {
            return false;
        }
        self.deliver(vec![Inbound::Notify(ImeNotification::ReplyEvent)]);
        true
    }

    fn deliver(&self, events: Vec<Inbound>) {
        let Some(editable) = lock(&self.state).editable.upgrade() else {
            return;
        };
        let token = Some(self.token);
        for event in events {
            match event {
                Inbound::TextChange {
                    start,
                    old_end,
                    text,
                } => editable.on_text_change(token, start, old_end, &text),
                Inbound::SelectionChange(start, end) => {
                    editable.on_selection_change(token, start, end)
                }
                Inbound::Notify(kind) => editable.notify_ime(token, kind),
                Inbound::Context(context) => editable.notify_ime_context(token, context),
            }
        }
    }

    fn request(&self, request: EngineRequest, needs_reply: bool) -> Result<(), TransportError> {
        let mut st = lock(&self.state);
        if st.failing {
            return Err(TransportError::Closed);
        }
        st.log.push(request.clone());
        if needs_reply {
            st.inbox.push_back(request);
        }
        Ok(())
    }
}

impl LoopbackState {
    fn apply_replace(&mut self, start: usize, end: usize, text: &str) -> Vec<Inbound> {
        let len = self.text.len();
        let start = start.min(len);
        let end = end.clamp(start, len);
        let inserted: Vec<char> = text.chars().collect();
        let caret = start + inserted.len();
        self.text.splice(start..end, inserted);
        self.selection = (caret, caret);
        if self.composition.is_some() {
            self.composition = Some((start, caret));
        }
        vec![
            Inbound::TextChange {
                start,
                old_end: end,
                text: text.into(),
            },
            Inbound::SelectionChange(caret, caret),
        ]
    }
}

impl EngineChannel for LoopbackEngine {
    fn synchronize(&self) -> Result<(), TransportError> {
        self.request(EngineRequest::Synchronize, true)
    }

    fn replace_text(&self, start: usize, end: usize, text: &str) -> Result<(), TransportError> {
        self.request(
            EngineRequest::ReplaceText {
                start,
                end,
                text: text.into(),
            },
            true,
        )
    }

    fn add_composition_range(&self, segment: &CompositionSegment) -> Result<(), TransportError> {
        self.request(EngineRequest::AddCompositionRange(*segment), false)?;
        lock(&self.state).pending_ranges.push(*segment);
        Ok(())
    }

    fn update_composition(
        &self,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), TransportError> {
        self.request(EngineRequest::UpdateComposition { start, end, flags }, false)?;
        let mut st = lock(&self.state);
        if st.pending_ranges.is_empty() {
            st.composition = None;
            let len = st.text.len();
            st.selection = (start.min(len), end.min(len));
        } else {
            st.pending_ranges.clear();
            st.composition = Some((start, end));
        }
        Ok(())
    }

    fn request_commit(&self) -> Result<(), TransportError> {
        self.request(EngineRequest::RequestCommit, false)?;
        lock(&self.state).composition = None;
        Ok(())
    }

    fn request_cursor_updates(&self, mode: u32) -> Result<(), TransportError> {
        self.request(EngineRequest::RequestCursorUpdates(mode), false)
    }

    fn send_key_event(&self, event: &EngineKeyEvent) -> Result<(), TransportError> {
        self.request(EngineRequest::KeyEvent(*event), false)
    }
}

// ---------------------------------------------------------------------------
// Listener plumbing
// ---------------------------------------------------------------------------

/// What the host saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    TextChange(TextChange),
    SelectionChange(Option<(usize, usize)>),
    DiscardComposition,
    Ime(ImeNotification),
    Context(InputType),
    DefaultKey(u16),
    CompositionRects(Vec<Rect>),
    ShowSoftInput,
    HideSoftInput,
    RestartInput(InputType),
}

/// Listener that records every callback.
#[derive(Default)]
pub struct RecordingListener {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut lock(&self.seen))
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        lock(&self.seen).clone()
    }

    pub fn text_changes(&self) -> Vec<TextChange> {
        lock(&self.seen)
            .iter()
            .filter_map(|n| match n {
                Notification::TextChange(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    fn push(&self, n: Notification) {
        lock(&self.seen).push(n);
    }
}

impl EditableListener for RecordingListener {
    fn on_text_change(&self, change: TextChange) {
        self.push(Notification::TextChange(change));
    }

    fn on_selection_change(&self, selection: Option<(usize, usize)>) {
        self.push(Notification::SelectionChange(selection));
    }

    fn on_discard_composition(&self) {
        self.push(Notification::DiscardComposition);
    }

    fn notify_ime(&self, kind: ImeNotification) {
        self.push(Notification::Ime(kind));
    }

    fn notify_ime_context(&self, _context: &ImeContext, input_type: InputType) {
        self.push(Notification::Context(input_type));
    }

    fn on_default_key_event(&self, event: &KeyEvent) {
        self.push(Notification::DefaultKey(event.key_code));
    }

    fn update_composition_rects(&self, rects: &[Rect]) {
        self.push(Notification::CompositionRects(rects.to_vec()));
    }

    fn show_soft_input(&self) {
        self.push(Notification::ShowSoftInput);
    }

    fn hide_soft_input(&self) {
        self.push(Notification::HideSoftInput);
    }

    fn restart_input(&self, input_type: InputType) {
        self.push(Notification::RestartInput(input_type));
    }
}

// ---------------------------------------------------------------------------
// HeadlessBridge
// ---------------------------------------------------------------------------

/// An editable, a loopback engine and manual executors, driven from one thread.
pub struct HeadlessBridge {
    pub editable: Arc<Editable>,
    pub engine: Arc<LoopbackEngine>,
    pub ic: Arc<ManualExecutor>,
    pub ui: Arc<ManualExecutor>,
    pub recorder: Arc<RecordingListener>,
    pub owner: Arc<ListenerSlot>,
}

impl HeadlessBridge {
    pub fn new(settings: Settings) -> Self {
        let engine = LoopbackEngine::new(FocusToken(1));
        let ic = ManualExecutor::new();
        let ui = ManualExecutor::new();
        let recorder = RecordingListener::new();
        let owner = ListenerSlot::new(Some(recorder.clone() as Arc<dyn EditableListener>));
        let ctx = EditableContext::new(engine.clone(), ui.clone()).with_settings(Arc::new(settings));
        let weak_owner: Weak<dyn SessionOwner> = Arc::downgrade(&owner) as Weak<dyn SessionOwner>;
        let editable = Editable::new(ctx, ic.clone(), weak_owner);
        engine.attach(&editable);
        Self {
            editable,
            engine,
            ic,
            ui,
            recorder,
            owner,
        }
    }

    /// Focus `text`, settle, and forget the notifications focusing produced.
    pub fn focused(settings: Settings, text: &str) -> Self {
        let bridge = Self::new(settings);
        bridge.engine.focus(text);
        bridge.settle();
        bridge.recorder.take();
        bridge
    }

    /// Run engine replies and posted tasks until nothing is left.
    pub fn settle(&self) {
        loop {
            let n = self.engine.pump() + self.ic.run_pending() + self.ui.run_pending();
            if n == 0 {
                break;
            }
        }
    }

    pub fn client_text(&self) -> String {
        self.editable.store().with_client(|t| t.as_string())
    }

    pub fn engine_text(&self) -> String {
        self.editable.store().with_engine(|t| t.as_string())
    }

    pub fn client_selection(&self) -> Option<(usize, usize)> {
        self.editable.store().with_client(|t| t.selection())
    }
}
