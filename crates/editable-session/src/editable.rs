//! The editable bridge between one engine editable and the input method.
//!
//! Thread roles:
//! - engine thread: `on_text_change`, `on_selection_change`, `notify_ime`,
//!   `notify_ime_context`, `on_default_key_event`, `update_composition_rects`
//! - input-method executor: `offer` (through the proxy), `set_batch_mode`,
//!   `send_key_event`, and every posted sync
//! - UI executor: soft keyboard decisions
//!
//! Lock order: ic state, client buffer, queue, engine buffer, remote state.
//! No lock is held across an engine request or a listener callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use editable_core::composition::{
    project_composition, CompositionPlan, CompositionSegment, ProjectMode,
};
use editable_core::context::{ImeContext, KeyboardRequest};
use editable_core::keys::{
    keycode, translate_key_event, KeyAction, KeyCharMap, KeyEvent, UsKeyCharMap,
};
use editable_core::settings::Settings;
use editable_core::store::DualTextStore;
use editable_core::text::{SpanId, SpannedText, SPAN_COMPOSING, SPAN_INTERMEDIATE};
use editable_core::EditError;
use tracing::{debug, debug_span, warn};

use crate::action::{Action, ActionKind};
use crate::engine::{
    EngineChannel, FocusToken, ImeNotification, Rect, TransportError, COMPOSITION_KEEP_CURRENT,
};
use crate::executor::{same_executor, Executor};
use crate::handoff::HandoffBarrier;
use crate::keys::{KeyListener, TextKeyListener};
use crate::listener::{EditableListener, SessionOwner, SyncAdapter};
use crate::proxy::EditableProxy;
use crate::queue::{ActionQueue, Queued, Recorded};

/// Collaborators shared by every editable of a session.
#[derive(Clone)]
pub struct EditableContext {
    pub engine: Arc<dyn EngineChannel>,
    pub settings: Arc<Settings>,
    pub ui_executor: Arc<dyn Executor>,
    pub key_map: Arc<dyn KeyCharMap>,
}

impl EditableContext {
    pub fn new(engine: Arc<dyn EngineChannel>, ui_executor: Arc<dyn Executor>) -> Self {
        Self {
            engine,
            settings: Arc::new(Settings::default()),
            ui_executor,
            key_map: Arc::new(UsKeyCharMap),
        }
    }

    pub fn with_settings(mut self, settings: Arc<Settings>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_key_map(mut self, key_map: Arc<dyn KeyCharMap>) -> Self {
        self.key_map = key_map;
        self
    }
}

struct Executors {
    /// Executor that owns the client buffer.
    current: Arc<dyn Executor>,
    /// Executor engine-thread work is posted to. Runs ahead of `current`
    /// during a handoff.
    post_target: Arc<dyn Executor>,
}

/// State owned by the input-method executor.
#[derive(Default)]
struct IcState {
    batch_depth: u32,
    need_sync: bool,
    need_update_composition: bool,
    suppress_key_up: bool,
}

/// State owned by the engine thread.
#[derive(Default)]
struct RemoteState {
    focused_token: Option<FocusToken>,
    focused: bool,
    ignore_selection_change: bool,
    context: ImeContext,
}

enum LocalEcho {
    /// Nothing changed locally and nothing needs sending.
    Skip,
    Send(Option<Recorded>),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Editable {
    me: Weak<Editable>,
    ctx: EditableContext,
    store: DualTextStore,
    owner: Weak<dyn SessionOwner>,
    executors: Mutex<Executors>,
    ic: Mutex<IcState>,
    queue: Mutex<ActionQueue>,
    remote: Mutex<RemoteState>,
    handoff: Arc<HandoffBarrier>,
    key_listener: Mutex<Arc<dyn KeyListener>>,
}

impl Editable {
    pub fn new(
        ctx: EditableContext,
        ic_executor: Arc<dyn Executor>,
        owner: Weak<dyn SessionOwner>,
    ) -> Arc<Self> {
        let store = DualTextStore::new(ctx.settings.sync.check_consistency);
        let key_listener: Arc<dyn KeyListener> =
            Arc::new(TextKeyListener::new(Arc::clone(&ctx.key_map)));
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            ctx,
            store,
            owner,
            executors: Mutex::new(Executors {
                current: Arc::clone(&ic_executor),
                post_target: ic_executor,
            }),
            ic: Mutex::new(IcState::default()),
            queue: Mutex::new(ActionQueue::default()),
            remote: Mutex::new(RemoteState::default()),
            handoff: Arc::new(HandoffBarrier::default()),
            key_listener: Mutex::new(key_listener),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// View handed to the input method.
    pub fn editable(self: &Arc<Self>) -> EditableProxy {
        EditableProxy::new(Arc::clone(self))
    }

    pub fn store(&self) -> &DualTextStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    /// Executor that input-method work should be posted to.
    pub fn executor(&self) -> Arc<dyn Executor> {
        Arc::clone(&lock(&self.executors).post_target)
    }

    pub fn ime_context(&self) -> ImeContext {
        lock(&self.remote).context.clone()
    }

    pub fn is_focused(&self) -> bool {
        lock(&self.remote).focused
    }

    /// True on the executor that currently owns the client buffer. During a
    /// handoff this is still the old executor.
    pub fn is_client_thread(&self) -> bool {
        lock(&self.executors).current.is_current()
    }

    pub fn pending_actions(&self) -> usize {
        lock(&self.queue).len()
    }

    pub fn set_key_listener(&self, listener: Arc<dyn KeyListener>) {
        *lock(&self.key_listener) = listener;
    }

    fn key_listener(&self) -> Arc<dyn KeyListener> {
        Arc::clone(&lock(&self.key_listener))
    }

    fn listener(&self) -> Option<Arc<dyn EditableListener>> {
        self.owner.upgrade()?.editable_listener()
    }

    fn is_connected(&self) -> bool {
        let focused = lock(&self.remote).focused;
        focused && self.listener().is_some()
    }

    fn assert_ic_thread(&self) {
        debug_assert!(
            self.is_client_thread(),
            "client buffer used off the input-method executor"
        );
    }

    fn post_ic(&self, f: impl FnOnce(&Editable) + Send + 'static) {
        let target = Arc::clone(&lock(&self.executors).post_target);
        let me = self.me.clone();
        target.post(Box::new(move || {
            if let Some(me) = me.upgrade() {
                f(&me);
            }
        }));
    }

    fn post_ui(&self, f: impl FnOnce(&Editable) + Send + 'static) {
        let me = self.me.clone();
        self.ctx.ui_executor.post(Box::new(move || {
            if let Some(me) = me.upgrade() {
                f(&me);
            }
        }));
    }

    fn notify_listener(&self, kind: ImeNotification) {
        if let Some(listener) = self.listener() {
            listener.notify_ime(kind);
        }
    }

    // -----------------------------------------------------------------------
    // Input-method side
    // -----------------------------------------------------------------------

    /// Apply `action` to the client buffer, then queue and send it when an
    /// engine editable is focused and a listener is attached.
    pub fn offer(&self, action: Action) -> Result<(), EditError> {
        let _span = debug_span!("offer", ?action).entered();
        self.assert_ic_thread();

        let recorded = match self.apply_locally(&action)? {
            LocalEcho::Skip => return Ok(()),
            LocalEcho::Send(recorded) => recorded,
        };

        if !self.is_connected() {
            debug!("not connected, local echo only");
            if let ActionKind::SetHandler { executor } = action.0 {
                self.complete_handoff(executor);
            }
            return Ok(());
        }

        lock(&self.queue).push(Queued {
            action: action.clone(),
            recorded: recorded.clone(),
        });
        if let Err(e) = self.perform(&action, recorded.as_ref()) {
            warn!(%e, "send failed, dropping action");
            lock(&self.queue).pop_back();
            if let ActionKind::SetHandler { executor } = action.0 {
                self.complete_handoff(executor);
            }
        }
        Ok(())
    }

    fn apply_locally(&self, action: &Action) -> Result<LocalEcho, EditError> {
        match &action.0 {
            ActionKind::Event | ActionKind::SetHandler { .. } => Ok(LocalEcho::Send(None)),
            ActionKind::ReplaceText { start, end, text } => {
                self.store.client_replace(*start, *end, text)?;
                Ok(LocalEcho::Send(None))
            }
            ActionKind::SetSpan {
                object,
                start,
                end,
                flags,
            } => {
                self.store
                    .client_set_span(object.clone(), *start, *end, *flags)?;
                let text = self.store.with_client(|t| t.substring(*start, *end))?;
                Ok(LocalEcho::Send(Some(Recorded {
                    start: *start,
                    end: *end,
                    text,
                    flags: *flags,
                })))
            }
            ActionKind::RemoveSpan { id } => {
                let Some(span) = self.store.client_remove_span(*id) else {
                    debug!(id, "span not attached");
                    return Ok(LocalEcho::Skip);
                };
                let text = self
                    .store
                    .with_client(|t| t.substring(span.start, span.end))?;
                Ok(LocalEcho::Send(Some(Recorded {
                    start: span.start,
                    end: span.end,
                    text,
                    flags: span.flags,
                })))
            }
        }
    }

    fn perform(&self, action: &Action, recorded: Option<&Recorded>) -> Result<(), TransportError> {
        let engine = &self.ctx.engine;
        match &action.0 {
            ActionKind::Event | ActionKind::SetHandler { .. } => engine.synchronize(),
            ActionKind::SetSpan { object, flags, .. } => {
                if flags & SPAN_INTERMEDIATE == 0
                    && (flags & SPAN_COMPOSING != 0 || object.is_selection())
                {
                    self.update_composition()?;
                }
                engine.synchronize()
            }
            ActionKind::RemoveSpan { .. } => {
                let flags = recorded.map_or(0, |r| r.flags);
                if flags & SPAN_INTERMEDIATE == 0 && flags & SPAN_COMPOSING != 0 {
                    self.update_composition()?;
                }
                engine.synchronize()
            }
            ActionKind::ReplaceText { start, end, text } => {
                // A replace the engine ignores must still revert the client.
                lock(&self.ic).need_sync = true;
                let mode = ProjectMode {
                    whole_text: true,
                    notify_engine: false,
                };
                let composing = self.send_composition(text, *start, mode, 0)?;
                if !composing && self.ctx.settings.keys.synthesize_from_text {
                    self.send_char_key_events(text)?;
                }
                engine.replace_text(*start, *end, &text.as_string())
            }
        }
    }

    /// Send the client composition, or defer it while a batch is open.
    fn update_composition(&self) -> Result<(), TransportError> {
        {
            let mut ic = lock(&self.ic);
            if ic.batch_depth > 0 {
                ic.need_update_composition = true;
                return Ok(());
            }
            ic.need_update_composition = false;
        }
        let text = self.store.client_snapshot();
        let mode = ProjectMode {
            whole_text: false,
            notify_engine: true,
        };
        self.send_composition(&text, 0, mode, COMPOSITION_KEEP_CURRENT)
            .map(|_| ())
    }

    /// Returns whether a composition was sent.
    fn send_composition(
        &self,
        text: &SpannedText,
        base: usize,
        mode: ProjectMode,
        flags: u32,
    ) -> Result<bool, TransportError> {
        let engine_selection = self.store.with_engine(SpannedText::selection);
        let plan = project_composition(
            text,
            base,
            mode,
            engine_selection,
            &self.ctx.settings.composition,
        );
        let engine = &self.ctx.engine;
        match plan {
            CompositionPlan::Nothing => Ok(false),
            CompositionPlan::Selection { start, end } => {
                engine.update_composition(start, end, flags)?;
                Ok(false)
            }
            CompositionPlan::Composition {
                start,
                end,
                caret,
                segments,
            } => {
                if let Some(offset) = caret {
                    engine.add_composition_range(&CompositionSegment::caret(offset))?;
                }
                for segment in &segments {
                    engine.add_composition_range(segment)?;
                }
                engine.update_composition(start, end, flags)?;
                Ok(true)
            }
        }
    }

    /// Key events for a single unstyled character, so pages see typing.
    fn send_char_key_events(&self, text: &SpannedText) -> Result<(), TransportError> {
        if text.len() != 1 || text.spans().next().is_some() {
            return Ok(());
        }
        let Some(events) = self.ctx.key_map.synthesize(text.chars()[0]) else {
            return Ok(());
        };
        let suppress_up = lock(&self.ic).suppress_key_up;
        let saved_meta = self.key_listener().meta_state();
        for event in events.iter().filter(|e| !e.is_modifier()) {
            if event.action == KeyAction::Up && suppress_up {
                continue;
            }
            let translated =
                translate_key_event(event, event.action, saved_meta, true, &*self.ctx.key_map);
            self.ctx.engine.send_key_event(&translated)?;
        }
        Ok(())
    }

    /// Merge engine changes into the client buffer, unless a batch is open
    /// or actions are in flight.
    pub(crate) fn sync_text(&self) {
        let Some(listener) = self.listener() else {
            return;
        };
        {
            let mut ic = lock(&self.ic);
            if ic.batch_depth > 0 || !lock(&self.queue).is_empty() {
                ic.need_sync = true;
                return;
            }
            ic.need_sync = false;
        }
        self.assert_ic_thread();
        self.store.sync(Some(&SyncAdapter(&*listener)));
    }

    fn sync_if_needed(&self) {
        let needed = lock(&self.ic).need_sync;
        if needed {
            self.sync_text();
        }
    }

    /// Batches nest; closing the outermost one sends the deferred composition
    /// and runs the deferred sync.
    pub fn set_batch_mode(&self, in_batch: bool) {
        let _span = debug_span!("set_batch_mode", in_batch).entered();
        self.assert_ic_thread();
        let (update, sync) = {
            let mut ic = lock(&self.ic);
            if in_batch {
                ic.batch_depth += 1;
                return;
            }
            if ic.batch_depth == 0 {
                warn!("batch end without batch start");
                return;
            }
            ic.batch_depth -= 1;
            if ic.batch_depth > 0 {
                return;
            }
            (ic.need_update_composition, ic.need_sync)
        };
        if update && self.is_connected() {
            if let Err(e) = self.update_composition() {
                warn!(%e, "deferred composition update failed");
            }
        }
        if sync {
            self.sync_text();
        }
    }

    pub fn request_cursor_updates(&self, mode: u32) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.ctx.engine.request_cursor_updates(mode) {
            warn!(%e, "cursor update request failed");
        }
    }

    fn end_composition(&self, kind: ImeNotification) {
        let ids: Vec<SpanId> = self.store.with_client(|t| {
            t.spans()
                .filter(|s| s.is_composing())
                .map(|s| s.object.id())
                .collect()
        });
        for id in ids {
            if let Err(e) = self.offer(Action::remove_span(id)) {
                warn!(%e, id, "removing composing span failed");
            }
        }
        if kind == ImeNotification::CommitComposition && self.is_connected() {
            if let Err(e) = self.ctx.engine.request_commit() {
                warn!(%e, "commit request failed");
            }
        }
        self.notify_listener(kind);
    }

    // -----------------------------------------------------------------------
    // Key events
    // -----------------------------------------------------------------------

    pub fn send_key_event(self: &Arc<Self>, event: KeyEvent) {
        let _span = debug_span!("send_key_event", key = event.key_code, action = ?event.action)
            .entered();
        self.assert_ic_thread();
        match event.action {
            KeyAction::Multiple => {
                for _ in 0..event.repeat_count.max(1) {
                    self.process_key(&event, KeyAction::Down);
                    self.process_key(&event, KeyAction::Up);
                }
            }
            action => self.process_key(&event, action),
        }
    }

    fn process_key(self: &Arc<Self>, event: &KeyEvent, action: KeyAction) {
        let listener = self.key_listener();
        let skip = self.skip_key_listener(event.key_code);
        let handled = !skip
            && match action {
                KeyAction::Down => {
                    lock(&self.ic).suppress_key_up = true;
                    let handled = listener.on_key_down(&self.editable(), event);
                    lock(&self.ic).suppress_key_up = false;
                    handled
                }
                _ => listener.on_key_up(&self.editable(), event),
            };
        debug!(skip, handled);
        if handled {
            return;
        }
        self.forward_key(event, action, listener.meta_state());
        if skip && action == KeyAction::Down {
            listener.adjust_meta_after_keypress();
        }
    }

    fn skip_key_listener(&self, key_code: u16) -> bool {
        !lock(&self.remote).context.is_enabled()
            || key_code == keycode::ENTER
            || key_code == keycode::TAB
    }

    fn forward_key(&self, event: &KeyEvent, action: KeyAction, saved_meta: u32) {
        if !self.is_connected() {
            return;
        }
        let translated = translate_key_event(event, action, saved_meta, false, &*self.ctx.key_map);
        if let Err(e) = self.ctx.engine.send_key_event(&translated) {
            warn!(%e, "key event not sent");
            return;
        }
        if let Err(e) = self.offer(Action::event()) {
            warn!(%e, "event action rejected");
        }
    }

    // -----------------------------------------------------------------------
    // Executor handoff
    // -----------------------------------------------------------------------

    /// Move client ownership to `executor`. Work posted to `executor` waits
    /// until every action sent before the switch has been answered.
    pub fn set_executor(&self, executor: Arc<dyn Executor>) {
        let _span = debug_span!("set_executor").entered();
        {
            let ex = lock(&self.executors);
            if same_executor(&ex.current, &executor) && same_executor(&ex.post_target, &executor)
            {
                debug!("already current");
                return;
            }
        }
        let ticket = self.handoff.begin();
        let barrier = Arc::clone(&self.handoff);
        executor.post(Box::new(move || barrier.wait(ticket)));
        self.post_ic(move |me| {
            if let Err(e) = me.offer(Action::set_handler(executor)) {
                warn!(%e, "handoff action rejected");
            }
        });
    }

    fn complete_handoff(&self, new: Arc<dyn Executor>) {
        let old = {
            let mut ex = lock(&self.executors);
            ex.post_target = Arc::clone(&new);
            Arc::clone(&ex.current)
        };
        debug!("handoff acknowledged");
        let me = self.me.clone();
        let barrier = Arc::clone(&self.handoff);
        old.post(Box::new(move || {
            if let Some(me) = me.upgrade() {
                lock(&me.executors).current = new;
            }
            barrier.release_next();
        }));
    }

    // -----------------------------------------------------------------------
    // Engine side
    // -----------------------------------------------------------------------

    fn check_token(&self, token: Option<FocusToken>) -> bool {
        let focused = lock(&self.remote).focused_token;
        if token.is_some() && token != focused {
            debug!(?token, ?focused, "ignoring event from unfocused editable");
            return false;
        }
        true
    }

    fn replace_engine(&self, start: usize, end: usize, text: &SpannedText) {
        if let Err(e) = self.store.engine_replace(start, end, text) {
            warn!(%e, "engine text change rejected");
        }
    }

    /// The engine replaced `[start, unbounded_old_end)` with `text`.
    pub fn on_text_change(
        &self,
        token: Option<FocusToken>,
        start: usize,
        unbounded_old_end: usize,
        text: &str,
    ) {
        let _span = debug_span!("on_text_change", start, unbounded_old_end).entered();
        if !self.check_token(token) {
            return;
        }
        let new_text = SpannedText::from(text);
        let len = self.store.engine_len();

        if start == 0 && unbounded_old_end > len {
            // Newly focused editable: empty first so no span survives.
            self.replace_engine(0, len, &SpannedText::new());
            self.replace_engine(0, 0, &new_text);
            lock(&self.remote).ignore_selection_change = false;
            return;
        }

        let old_end = unbounded_old_end.min(len);
        if start > old_end {
            warn!(start, old_end, "text change outside the engine text");
            return;
        }
        let new_end = start + new_text.len();

        let head = lock(&self.queue).front().and_then(|q| match &q.action.0 {
            ActionKind::ReplaceText { start, end, text } => Some((*start, *end, text.clone())),
            _ => None,
        });
        if let Some((action_start, action_end, action_text)) = head {
            if start <= action_start
                && old_end >= action_end
                && new_end >= action_start + action_text.len()
            {
                if let Some(merged) = merge_action_text(&new_text, start, action_start, &action_text)
                {
                    let replaced_selection = self
                        .store
                        .with_engine(SpannedText::selection)
                        .is_some_and(|(a, b)| a.min(b) <= old_end && a.max(b) >= start);
                    self.replace_engine(start, old_end, &merged);
                    lock(&self.remote).ignore_selection_change = !replaced_selection;
                    return;
                }
                debug!("replace action is stale");
            }
        }
        self.replace_engine(start, old_end, &new_text);
    }

    pub fn on_selection_change(&self, token: Option<FocusToken>, start: usize, end: usize) {
        let _span = debug_span!("on_selection_change", start, end).entered();
        if !self.check_token(token) {
            return;
        }
        let ignore = std::mem::take(&mut lock(&self.remote).ignore_selection_change);
        if ignore {
            debug!("selection change ignored once");
        } else if let Err(e) = self.store.engine_set_selection(start, end) {
            warn!(%e, "engine selection rejected");
        }
        self.post_ic(Self::sync_text);
    }

    pub fn notify_ime(&self, token: Option<FocusToken>, kind: ImeNotification) {
        let _span = debug_span!("notify_ime", ?kind).entered();
        if kind == ImeNotification::Token {
            lock(&self.remote).focused_token = token;
            return;
        }
        if !self.check_token(token) {
            return;
        }
        match kind {
            ImeNotification::Token => {}
            ImeNotification::ReplyEvent => self.on_reply(),
            ImeNotification::Focus => {
                self.clear_queue();
                {
                    let mut remote = lock(&self.remote);
                    remote.focused = true;
                    remote.ignore_selection_change = false;
                }
                self.post_ic(move |me| me.notify_listener(kind));
            }
            ImeNotification::Blur => {
                self.clear_queue();
                lock(&self.remote).focused = false;
                self.reset_engine_text();
                self.post_ic(move |me| {
                    me.sync_text();
                    me.notify_listener(kind);
                });
            }
            ImeNotification::OpenVkb => self.post_ui(|me| {
                if let Some(listener) = me.listener() {
                    listener.show_soft_input();
                }
            }),
            ImeNotification::CommitComposition | ImeNotification::CancelComposition => {
                self.post_ic(move |me| me.end_composition(kind));
            }
        }
    }

    fn on_reply(&self) {
        let Some(head) = lock(&self.queue).pop_front() else {
            warn!("reply without a pending action");
            return;
        };
        debug!(action = ?head.action, "reply");
        match head.action.0 {
            ActionKind::SetSpan {
                object,
                start,
                end,
                flags,
            } => {
                if self.engine_text_matches(head.recorded.as_ref()) {
                    if let Err(e) = self.store.engine_set_span(object, start, end, flags) {
                        warn!(%e, "engine span rejected");
                    }
                } else {
                    debug!("discarding stale set span");
                }
            }
            ActionKind::RemoveSpan { id } => {
                if self.engine_text_matches(head.recorded.as_ref()) {
                    self.store.engine_remove_span(id);
                } else {
                    debug!(id, "discarding stale remove span");
                }
            }
            ActionKind::SetHandler { executor } => self.complete_handoff(executor),
            ActionKind::Event | ActionKind::ReplaceText { .. } => {}
        }
        if lock(&self.queue).is_empty() {
            self.post_ic(Self::sync_if_needed);
        }
    }

    fn engine_text_matches(&self, recorded: Option<&Recorded>) -> bool {
        recorded.is_some_and(|r| {
            self.store
                .with_engine(|t| t.substring(r.start, r.end))
                .is_ok_and(|s| s == r.text)
        })
    }

    fn clear_queue(&self) {
        let dropped = lock(&self.queue).clear();
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "cleared pending actions");
        }
        for queued in dropped {
            if let ActionKind::SetHandler { executor } = queued.action.0 {
                self.complete_handoff(executor);
            }
        }
    }

    fn reset_engine_text(&self) {
        let len = self.store.engine_len();
        self.replace_engine(0, len, &SpannedText::new());
        let ids: Vec<SpanId> = self
            .store
            .with_engine(|t| t.spans().map(|s| s.object.id()).collect());
        for id in ids {
            self.store.engine_remove_span(id);
        }
        if let Err(e) = self.store.engine_set_selection(0, 0) {
            warn!(%e, "engine selection reset failed");
        }
    }

    pub fn notify_ime_context(&self, token: Option<FocusToken>, context: ImeContext) {
        let _span = debug_span!("notify_ime_context", state = context.state).entered();
        if !self.check_token(token) {
            return;
        }
        let previous = std::mem::replace(&mut lock(&self.remote).context, context.clone());
        let request = context.keyboard_request(&previous);
        debug!(?request);
        self.post_ui(move |me| {
            let Some(listener) = me.listener() else {
                return;
            };
            let input_type = context.input_type();
            listener.notify_ime_context(&context, input_type);
            match request {
                KeyboardRequest::Show => listener.show_soft_input(),
                KeyboardRequest::Hide => listener.hide_soft_input(),
                KeyboardRequest::Restart => listener.restart_input(input_type),
                KeyboardRequest::Keep => {}
            }
        });
    }

    pub fn on_default_key_event(&self, token: Option<FocusToken>, event: KeyEvent) {
        if !self.check_token(token) {
            return;
        }
        self.post_ic(move |me| {
            if let Some(listener) = me.listener() {
                listener.on_default_key_event(&event);
            }
        });
    }

    pub fn update_composition_rects(&self, token: Option<FocusToken>, rects: Vec<Rect>) {
        if !self.check_token(token) {
            return;
        }
        self.post_ic(move |me| {
            if let Some(listener) = me.listener() {
                listener.update_composition_rects(&rects);
            }
        });
    }
}

/// Splice the action's spanned text into the engine's new text where the
/// action landed: the exact position first, else the last occurrence.
fn merge_action_text(
    new_text: &SpannedText,
    start: usize,
    action_start: usize,
    action_text: &SpannedText,
) -> Option<SpannedText> {
    let needle = action_text.chars();
    let exact = action_start - start;
    let index = if new_text.region_matches(exact, needle) {
        exact
    } else {
        new_text.last_index_of(needle)?
    };
    let mut merged = new_text.clone();
    merged
        .replace_spanned(index, index + needle.len(), action_text)
        .ok()?;
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use editable_core::text::{SpanObject, SPAN_EXCLUSIVE_EXCLUSIVE};

    #[test]
    fn test_merge_prefers_exact_position() {
        let new_text = SpannedText::from("ab ab ab");
        let mut action = SpannedText::from("ab");
        let composing = SpanObject::marker();
        action
            .set_span(composing.clone(), 0, 2, SPAN_COMPOSING | SPAN_EXCLUSIVE_EXCLUSIVE)
            .unwrap();
        let merged = merge_action_text(&new_text, 0, 3, &action).unwrap();
        let span = merged.span(composing.id()).unwrap();
        assert_eq!((span.start, span.end), (3, 5));
    }

    #[test]
    fn test_merge_falls_back_to_last_occurrence() {
        let new_text = SpannedText::from("xab ab");
        let mut action = SpannedText::from("ab");
        let marker = SpanObject::marker();
        action.set_span(marker.clone(), 0, 2, SPAN_EXCLUSIVE_EXCLUSIVE).unwrap();
        let merged = merge_action_text(&new_text, 0, 0, &action).unwrap();
        let span = merged.span(marker.id()).unwrap();
        assert_eq!((span.start, span.end), (4, 6));
        assert_eq!(merged.as_string(), "xab ab");
    }

    #[test]
    fn test_merge_missing_text_is_stale() {
        let new_text = SpannedText::from("hi");
        let action = SpannedText::from("world");
        assert!(merge_action_text(&new_text, 0, 0, &action).is_none());
    }
}
