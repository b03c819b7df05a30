use std::sync::mpsc;
use std::sync::{Arc, Weak};

use editable_core::settings::{parse_settings_toml, Settings};
use editable_core::text::{SpanObject, SpannedText, SPAN_COMPOSING, SPAN_EXCLUSIVE_EXCLUSIVE};
use editable_session::{
    Editable, EditableContext, EditableListener, EditableText, Executor, FocusToken,
    ImeNotification, ListenerSlot, SessionOwner, ThreadExecutor,
};
use tracing::debug;

use super::host::{BridgeEngine, BridgeListener, HostEngine, HostListener};
use super::types::{
    range, to_u32, BridgeError, BridgeImeContext, BridgeKeyEvent, BridgeRange, BridgeRect,
    BridgeTextStyle,
};

/// `unbounded_old_end` value meaning "to the end of the current text".
pub const OLD_END_UNBOUNDED: u32 = u32::MAX;

fn spawn(name: &str) -> Result<Arc<ThreadExecutor>, BridgeError> {
    ThreadExecutor::new(name).map_err(|e| BridgeError::Internal {
        msg: format!("spawn {name}: {e}"),
    })
}

/// One engine editable bridged to the input method. Input-method calls are
/// run on the bridge's input thread; engine calls may come from any thread.
#[derive(uniffi::Object)]
pub struct BridgeEditable {
    editable: Arc<Editable>,
    owner: Arc<ListenerSlot>,
}

#[uniffi::export]
impl BridgeEditable {
    #[uniffi::constructor]
    fn new(
        engine: Arc<dyn BridgeEngine>,
        listener: Option<Arc<dyn BridgeListener>>,
        settings_toml: Option<String>,
    ) -> Result<Arc<Self>, BridgeError> {
        let settings = match settings_toml {
            Some(toml) => parse_settings_toml(&toml)?,
            None => Settings::default(),
        };
        let ic = spawn("editable-ic")?;
        let ui = spawn("editable-ui")?;
        let owner = ListenerSlot::new(
            listener.map(|l| Arc::new(HostListener(l)) as Arc<dyn EditableListener>),
        );
        let ctx = EditableContext::new(Arc::new(HostEngine(engine)), ui)
            .with_settings(Arc::new(settings));
        let weak_owner: Weak<dyn SessionOwner> = Arc::downgrade(&owner) as Weak<dyn SessionOwner>;
        let editable = Editable::new(ctx, ic, weak_owner);
        Ok(Arc::new(Self { editable, owner }))
    }

    fn set_listener(&self, listener: Option<Arc<dyn BridgeListener>>) {
        self.owner
            .set(listener.map(|l| Arc::new(HostListener(l)) as Arc<dyn EditableListener>));
    }

    // -----------------------------------------------------------------------
    // Input-method side
    // -----------------------------------------------------------------------

    fn text(&self) -> String {
        self.editable.editable().text()
    }

    fn selection(&self) -> Option<BridgeRange> {
        self.editable.editable().selection().map(range)
    }

    fn composing_range(&self) -> Option<BridgeRange> {
        self.editable.editable().composing_range().map(range)
    }

    fn replace(&self, start: u32, end: u32, text: String) -> Result<(), BridgeError> {
        self.on_input_thread(move |e| {
            e.editable()
                .replace(start as usize, end as usize, &text)
        })?
        .map_err(Into::into)
    }

    /// Replace `[start, end)` with `text` marked as the composition.
    fn set_composing_text(&self, start: u32, end: u32, text: String) -> Result<(), BridgeError> {
        let mut composing = SpannedText::from(text.as_str());
        let len = composing.len();
        if len > 0 {
            composing.set_span(
                SpanObject::marker(),
                0,
                len,
                SPAN_COMPOSING | SPAN_EXCLUSIVE_EXCLUSIVE,
            )?;
        }
        self.on_input_thread(move |e| {
            e.editable()
                .replace_spanned(start as usize, end as usize, composing)
        })?
        .map_err(Into::into)
    }

    /// Attach a new span and return its id.
    fn add_span(
        &self,
        style: Option<BridgeTextStyle>,
        start: u32,
        end: u32,
        flags: u32,
    ) -> Result<u64, BridgeError> {
        let object = match style {
            Some(style) => SpanObject::styled(style.into()),
            None => SpanObject::marker(),
        };
        let id = object.id();
        self.on_input_thread(move |e| {
            e.editable()
                .set_span(object, start as usize, end as usize, flags)
        })??;
        Ok(id)
    }

    fn remove_span(&self, id: u64) -> Result<(), BridgeError> {
        self.on_input_thread(move |e| e.editable().remove_span(id))?
            .map_err(Into::into)
    }

    fn set_selection(&self, start: u32, end: u32) -> Result<(), BridgeError> {
        self.on_input_thread(move |e| {
            e.editable()
                .set_selection(start as usize, end as usize)
        })?
        .map_err(Into::into)
    }

    fn begin_batch_edit(&self) -> Result<(), BridgeError> {
        self.on_input_thread(|e| e.set_batch_mode(true))
    }

    fn end_batch_edit(&self) -> Result<(), BridgeError> {
        self.on_input_thread(|e| e.set_batch_mode(false))
    }

    fn send_key_event(&self, event: BridgeKeyEvent) -> Result<(), BridgeError> {
        self.on_input_thread(move |e| e.send_key_event(event.into()))
    }

    fn request_cursor_updates(&self, mode: u32) -> Result<(), BridgeError> {
        self.on_input_thread(move |e| e.request_cursor_updates(mode))
    }

    /// Move input-method work to a new thread named `name`. Calls made after
    /// this wait until every edit already sent has been answered.
    fn move_to_thread(&self, name: String) -> Result<(), BridgeError> {
        let executor = spawn(&name)?;
        self.editable.set_executor(executor);
        Ok(())
    }

    fn pending_actions(&self) -> u32 {
        to_u32(self.editable.pending_actions())
    }

    fn ime_context(&self) -> BridgeImeContext {
        (&self.editable.ime_context()).into()
    }

    // -----------------------------------------------------------------------
    // Engine side
    // -----------------------------------------------------------------------

    fn on_text_change(
        &self,
        token: Option<u64>,
        start: u32,
        unbounded_old_end: u32,
        text: String,
    ) {
        let old_end = if unbounded_old_end == OLD_END_UNBOUNDED {
            usize::MAX
        } else {
            unbounded_old_end as usize
        };
        self.editable
            .on_text_change(token.map(FocusToken), start as usize, old_end, &text);
    }

    fn on_selection_change(&self, token: Option<u64>, start: u32, end: u32) {
        self.editable
            .on_selection_change(token.map(FocusToken), start as usize, end as usize);
    }

    fn notify_ime(&self, token: Option<u64>, code: i32) -> Result<(), BridgeError> {
        let kind = ImeNotification::from_code(code).ok_or_else(|| BridgeError::InvalidData {
            msg: format!("unknown notification {code}"),
        })?;
        self.editable.notify_ime(token.map(FocusToken), kind);
        Ok(())
    }

    fn notify_ime_context(&self, token: Option<u64>, context: BridgeImeContext) {
        self.editable
            .notify_ime_context(token.map(FocusToken), context.into());
    }

    fn on_default_key_event(&self, token: Option<u64>, event: BridgeKeyEvent) {
        self.editable
            .on_default_key_event(token.map(FocusToken), event.into());
    }

    fn update_composition_rects(&self, token: Option<u64>, rects: Vec<BridgeRect>) {
        self.editable.update_composition_rects(
            token.map(FocusToken),
            rects.into_iter().map(Into::into).collect(),
        );
    }
}

impl BridgeEditable {
    /// Run `f` on the thread owning the client buffer and wait for it. Runs
    /// inline when already there, so listener callbacks may call back in.
    fn on_input_thread<T: Send + 'static>(
        &self,
        f: impl FnOnce(&Arc<Editable>) -> T + Send + 'static,
    ) -> Result<T, BridgeError> {
        if self.editable.is_client_thread() {
            return Ok(f(&self.editable));
        }
        let (tx, rx) = mpsc::sync_channel(1);
        let editable = Arc::clone(&self.editable);
        self.editable.executor().post(Box::new(move || {
            let _ = tx.send(f(&editable));
        }));
        rx.recv().map_err(|_| {
            debug!("input thread dropped the call");
            BridgeError::Internal {
                msg: "input thread gone".into(),
            }
        })
    }
}
