//! JSON edit scripts replayed against a [`HeadlessBridge`].
//!
//! A script names the document the engine focuses with, then a list of
//! steps. Input-method steps edit the client buffer; engine steps edit the
//! loopback document; `pump` and `settle` deliver replies.
//!
//! ```json
//! {
//!   "text": "hello",
//!   "steps": [
//!     { "op": "replace", "start": 5, "end": 5, "text": "!" },
//!     { "op": "engine_edit", "start": 0, "end": 0, "text": ">" },
//!     { "op": "settle" }
//!   ]
//! }
//! ```

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use editable_core::keys::{KeyAction, KeyEvent};
use editable_core::settings::Settings;
use editable_core::text::{SpanObject, SpannedText, SPAN_COMPOSING, SPAN_EXCLUSIVE_EXCLUSIVE};
use editable_core::EditError;
use editable_session::{EditableText, HeadlessBridge, ImeNotification};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script parse error: {0}")]
    Parse(String),
    #[error("step {index} ({op}) failed: {source}")]
    Step {
        index: usize,
        op: &'static str,
        #[source]
        source: EditError,
    },
}

fn default_true() -> bool {
    true
}

fn default_repeat() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Document the engine starts with.
    #[serde(default)]
    pub text: String,
    /// Focus the document before the first step.
    #[serde(default = "default_true")]
    pub focus: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStep {
    Down,
    Up,
    #[default]
    Tap,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Replace {
        start: usize,
        end: usize,
        text: String,
    },
    /// Replace with `text` marked as the composition.
    Compose {
        start: usize,
        end: usize,
        text: String,
    },
    Select {
        start: usize,
        end: usize,
    },
    BeginBatch,
    EndBatch,
    Key {
        code: u16,
        #[serde(default)]
        action: KeyStep,
        #[serde(default)]
        meta: u32,
        #[serde(default = "default_repeat")]
        repeat: u32,
    },
    EngineEdit {
        start: usize,
        end: usize,
        text: String,
    },
    EngineSelect {
        start: usize,
        end: usize,
    },
    Commit,
    Cancel,
    Focus {
        text: String,
    },
    Blur,
    /// Answer up to `count` pending requests, or all of them.
    Pump {
        #[serde(default)]
        count: Option<usize>,
    },
    Settle,
    /// Make the engine reject requests until turned off again.
    Fail {
        failing: bool,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Replace { .. } => "replace",
            Self::Compose { .. } => "compose",
            Self::Select { .. } => "select",
            Self::BeginBatch => "begin_batch",
            Self::EndBatch => "end_batch",
            Self::Key { .. } => "key",
            Self::EngineEdit { .. } => "engine_edit",
            Self::EngineSelect { .. } => "engine_select",
            Self::Commit => "commit",
            Self::Cancel => "cancel",
            Self::Focus { .. } => "focus",
            Self::Blur => "blur",
            Self::Pump { .. } => "pump",
            Self::Settle => "settle",
            Self::Fail { .. } => "fail",
        }
    }
}

/// State of both sides after a replay.
#[derive(Debug, Serialize)]
pub struct Report {
    pub client_text: String,
    pub engine_text: String,
    pub engine_document: String,
    pub selection: Option<(usize, usize)>,
    pub composition: Option<(usize, usize)>,
    pub pending_actions: usize,
    pub converged: bool,
    pub requests: Vec<String>,
    pub notifications: Vec<String>,
}

pub fn parse_script(json: &str) -> Result<Script, ScriptError> {
    serde_json::from_str(json).map_err(|e| ScriptError::Parse(e.to_string()))
}

pub fn replay(script: &Script, settings: Settings) -> Result<Report, ScriptError> {
    let bridge = HeadlessBridge::new(settings);
    if script.focus {
        bridge.engine.focus(&script.text);
        bridge.settle();
    }
    for (index, step) in script.steps.iter().enumerate() {
        apply(&bridge, step).map_err(|source| ScriptError::Step {
            index,
            op: step.name(),
            source,
        })?;
    }
    Ok(report(&bridge))
}

fn composing(text: &str) -> Result<SpannedText, EditError> {
    let mut spanned = SpannedText::from(text);
    let len = spanned.len();
    if len > 0 {
        spanned.set_span(
            SpanObject::marker(),
            0,
            len,
            SPAN_COMPOSING | SPAN_EXCLUSIVE_EXCLUSIVE,
        )?;
    }
    Ok(spanned)
}

fn apply(bridge: &HeadlessBridge, step: &Step) -> Result<(), EditError> {
    let editable = &bridge.editable;
    match step {
        Step::Replace { start, end, text } => editable.editable().replace(*start, *end, text)?,
        Step::Compose { start, end, text } => editable
            .editable()
            .replace_spanned(*start, *end, composing(text)?)?,
        Step::Select { start, end } => editable.editable().set_selection(*start, *end)?,
        Step::BeginBatch => editable.set_batch_mode(true),
        Step::EndBatch => editable.set_batch_mode(false),
        Step::Key {
            code,
            action,
            meta,
            repeat,
        } => match action {
            KeyStep::Down => editable.send_key_event(KeyEvent::new(KeyAction::Down, *code, *meta)),
            KeyStep::Up => editable.send_key_event(KeyEvent::new(KeyAction::Up, *code, *meta)),
            KeyStep::Tap => {
                editable.send_key_event(KeyEvent::new(KeyAction::Down, *code, *meta));
                editable.send_key_event(KeyEvent::new(KeyAction::Up, *code, *meta));
            }
            KeyStep::Multiple => editable.send_key_event(KeyEvent {
                repeat_count: *repeat,
                ..KeyEvent::new(KeyAction::Multiple, *code, *meta)
            }),
        },
        Step::EngineEdit { start, end, text } => bridge.engine.engine_edit(*start, *end, text),
        Step::EngineSelect { start, end } => bridge.engine.engine_select(*start, *end),
        Step::Commit => bridge.engine.notify(ImeNotification::CommitComposition),
        Step::Cancel => bridge.engine.notify(ImeNotification::CancelComposition),
        Step::Focus { text } => bridge.engine.focus(text),
        Step::Blur => bridge.engine.blur(),
        Step::Pump { count: None } => {
            bridge.engine.pump();
        }
        Step::Pump { count: Some(n) } => {
            for _ in 0..*n {
                if !bridge.engine.pump_one() {
                    break;
                }
            }
        }
        Step::Settle => bridge.settle(),
        Step::Fail { failing } => bridge.engine.set_failing(*failing),
    }
    Ok(())
}

fn report(bridge: &HeadlessBridge) -> Report {
    let client_text = bridge.client_text();
    let engine_text = bridge.engine_text();
    let engine_document = bridge.engine.document();
    let pending_actions = bridge.editable.pending_actions();
    let converged =
        pending_actions == 0 && client_text == engine_text && engine_text == engine_document;
    Report {
        selection: bridge.client_selection(),
        composition: bridge.engine.composition(),
        pending_actions,
        converged,
        requests: bridge.engine.log().iter().map(|r| format!("{r:?}")).collect(),
        notifications: bridge
            .recorder
            .snapshot()
            .iter()
            .map(|n| format!("{n:?}"))
            .collect(),
        client_text,
        engine_text,
        engine_document,
    }
}

pub fn format_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "client:   {:?}", report.client_text);
    let _ = writeln!(out, "engine:   {:?}", report.engine_document);
    let _ = writeln!(out, "mirror:   {:?}", report.engine_text);
    if let Some((start, end)) = report.selection {
        let _ = writeln!(out, "selection: {start}..{end}");
    }
    if let Some((start, end)) = report.composition {
        let _ = writeln!(out, "composition: {start}..{end}");
    }
    let _ = writeln!(
        out,
        "pending: {}  converged: {}",
        report.pending_actions, report.converged
    );
    let _ = writeln!(out, "\nrequests ({}):", report.requests.len());
    for r in &report.requests {
        let _ = writeln!(out, "  {r}");
    }
    let _ = writeln!(out, "\nnotifications ({}):", report.notifications.len());
    for n in &report.notifications {
        let _ = writeln!(out, "  {n}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(json: &str) -> Report {
        let script = parse_script(json).unwrap();
        replay(&script, Settings::default()).unwrap()
    }

    #[test]
    fn test_parse_steps() {
        let script = parse_script(
            r#"{"steps": [
                {"op": "begin_batch"},
                {"op": "key", "code": 29},
                {"op": "pump", "count": 2},
                {"op": "fail", "failing": true}
            ]}"#,
        )
        .unwrap();
        assert!(script.focus);
        assert_eq!(script.text, "");
        assert_eq!(
            script.steps,
            vec![
                Step::BeginBatch,
                Step::Key {
                    code: 29,
                    action: KeyStep::Tap,
                    meta: 0,
                    repeat: 1
                },
                Step::Pump { count: Some(2) },
                Step::Fail { failing: true },
            ]
        );
    }

    #[test]
    fn test_unknown_op_rejected() {
        assert!(matches!(
            parse_script(r#"{"steps": [{"op": "explode"}]}"#),
            Err(ScriptError::Parse(_))
        ));
    }

    #[test]
    fn test_replay_converges() {
        let report = run(
            r#"{"text": "hello", "steps": [
                {"op": "replace", "start": 5, "end": 5, "text": "!"},
                {"op": "engine_edit", "start": 0, "end": 0, "text": ">"},
                {"op": "settle"}
            ]}"#,
        );
        assert_eq!(report.client_text, ">hello!");
        assert_eq!(report.engine_document, ">hello!");
        assert_eq!(report.pending_actions, 0);
        assert!(report.converged);
    }

    #[test]
    fn test_unsettled_replay_reports_pending() {
        let report = run(
            r#"{"text": "hello", "steps": [
                {"op": "replace", "start": 5, "end": 5, "text": "!"}
            ]}"#,
        );
        assert_eq!(report.client_text, "hello!");
        assert_eq!(report.pending_actions, 1);
        assert!(!report.converged);
    }

    #[test]
    fn test_compose_reaches_engine_composition() {
        let report = run(
            r#"{"text": "hello", "steps": [
                {"op": "compose", "start": 5, "end": 5, "text": "ka"},
                {"op": "settle"}
            ]}"#,
        );
        assert_eq!(report.engine_document, "helloka");
        assert_eq!(report.composition, Some((5, 7)));
    }

    #[test]
    fn test_bad_step_reports_index() {
        let script = parse_script(
            r#"{"text": "hi", "steps": [
                {"op": "settle"},
                {"op": "replace", "start": 1, "end": 9, "text": "x"}
            ]}"#,
        )
        .unwrap();
        match replay(&script, Settings::default()) {
            Err(ScriptError::Step { index, op, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(op, "replace");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_format_text_lists_requests() {
        let report = run(
            r#"{"text": "ab", "steps": [
                {"op": "replace", "start": 2, "end": 2, "text": "c"},
                {"op": "settle"}
            ]}"#,
        );
        let text = format_text(&report);
        assert!(text.contains("client:   \"abc\""));
        assert!(text.contains("ReplaceText"));
        assert!(text.contains("converged: true"));
    }
}
