//! Span-annotated text buffer.
//!
//! Offsets count Unicode scalar values. Every span endpoint carries a gravity
//! (MARK stays left of text inserted at its position, POINT moves right of it),
//! encoded in the span flags the same way for start and end endpoints.
//! The selection is a pair of reserved POINT spans, so `replace` moves it with
//! the same heuristic as any other point span.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::EditError;

pub type SpanId = u64;

// Gravity bits: high nibble is the start endpoint, low nibble the end endpoint.
pub const SPAN_MARK_MARK: u32 = 0x11;
pub const SPAN_MARK_POINT: u32 = 0x12;
pub const SPAN_POINT_MARK: u32 = 0x21;
pub const SPAN_POINT_POINT: u32 = 0x22;
pub const SPAN_INCLUSIVE_EXCLUSIVE: u32 = SPAN_MARK_MARK;
pub const SPAN_INCLUSIVE_INCLUSIVE: u32 = SPAN_MARK_POINT;
pub const SPAN_EXCLUSIVE_EXCLUSIVE: u32 = SPAN_POINT_MARK;
pub const SPAN_EXCLUSIVE_INCLUSIVE: u32 = SPAN_POINT_POINT;
pub const SPAN_POINT_MARK_MASK: u32 = 0x33;
/// Span belongs to the in-progress input-method composition.
pub const SPAN_COMPOSING: u32 = 0x100;
/// Part of a multi-step update; the final step carries the real change.
pub const SPAN_INTERMEDIATE: u32 = 0x200;

const GRAVITY_POINT: u32 = 0x2;

const SELECTION_START_ID: SpanId = 1;
const SELECTION_END_ID: SpanId = 2;
const FIRST_DYNAMIC_ID: SpanId = 16;

static NEXT_SPAN_ID: AtomicU64 = AtomicU64::new(FIRST_DYNAMIC_ID);

/// Visual attributes a styling span contributes to the text paint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default)]
    pub underline: bool,
    /// ARGB; 0 means unset.
    #[serde(default)]
    pub underline_color: u32,
    /// In pixels; 0.0 means unset.
    #[serde(default)]
    pub underline_thickness: f32,
    #[serde(default)]
    pub foreground: u32,
    #[serde(default)]
    pub background: u32,
}

/// Identity of an annotation. Two spans are the same span iff their ids match;
/// the optional style travels with the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanObject {
    id: SpanId,
    style: Option<TextStyle>,
}

impl SpanObject {
    pub const SELECTION_START: SpanObject = SpanObject {
        id: SELECTION_START_ID,
        style: None,
    };
    pub const SELECTION_END: SpanObject = SpanObject {
        id: SELECTION_END_ID,
        style: None,
    };

    /// A fresh span without paint attributes (e.g. a composing marker).
    pub fn marker() -> Self {
        Self {
            id: NEXT_SPAN_ID.fetch_add(1, Ordering::Relaxed),
            style: None,
        }
    }

    /// A fresh styling span.
    pub fn styled(style: TextStyle) -> Self {
        Self {
            id: NEXT_SPAN_ID.fetch_add(1, Ordering::Relaxed),
            style: Some(style),
        }
    }

    pub fn id(&self) -> SpanId {
        self.id
    }

    pub fn style(&self) -> Option<&TextStyle> {
        self.style.as_ref()
    }

    pub fn is_selection(&self) -> bool {
        self.id == SELECTION_START_ID || self.id == SELECTION_END_ID
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub object: SpanObject,
    pub start: usize,
    pub end: usize,
    pub flags: u32,
}

impl Span {
    pub fn is_composing(&self) -> bool {
        self.flags & SPAN_COMPOSING != 0
    }

    /// True if the span intersects or touches `[start, end]`.
    pub fn touches(&self, start: usize, end: usize) -> bool {
        self.start <= end && self.end >= start
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpannedText {
    chars: Vec<char>,
    spans: Vec<Span>,
}

impl SpannedText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn substring(&self, start: usize, end: usize) -> Result<String, EditError> {
        self.check_range(start, end)?;
        Ok(self.chars[start..end].iter().collect())
    }

    /// True if the text at `start..start + needle.len()` equals `needle`.
    pub fn region_matches(&self, start: usize, needle: &[char]) -> bool {
        self.chars
            .get(start..start + needle.len())
            .is_some_and(|region| region == needle)
    }

    /// Sub-sequence with spans clipped to the range and rebased to 0.
    pub fn slice(&self, start: usize, end: usize) -> Result<SpannedText, EditError> {
        self.check_range(start, end)?;
        let spans = self
            .spans
            .iter()
            .filter(|s| !s.object.is_selection() && s.touches(start, end))
            .filter(|s| s.start < end && s.end > start || s.start == s.end)
            .map(|s| Span {
                object: s.object.clone(),
                start: s.start.max(start) - start,
                end: s.end.min(end) - start,
                flags: s.flags,
            })
            .collect();
        Ok(SpannedText {
            chars: self.chars[start..end].to_vec(),
            spans,
        })
    }

    /// First occurrence of `needle` at or after `from`.
    pub fn index_of(&self, needle: &[char], from: usize) -> Option<usize> {
        if needle.len() > self.chars.len() {
            return None;
        }
        (from..=self.chars.len() - needle.len()).find(|&i| self.region_matches(i, needle))
    }

    /// Last occurrence of `needle`.
    pub fn last_index_of(&self, needle: &[char]) -> Option<usize> {
        if needle.len() > self.chars.len() {
            return None;
        }
        (0..=self.chars.len() - needle.len())
            .rev()
            .find(|&i| self.region_matches(i, needle))
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Replace `[start, end)` with plain text, moving span endpoints by gravity.
    pub fn replace(&mut self, start: usize, end: usize, text: &str) -> Result<(), EditError> {
        self.check_range(start, end)?;
        let inserted: Vec<char> = text.chars().collect();
        let new_len = inserted.len();
        self.chars.splice(start..end, inserted);

        self.spans.retain_mut(|span| {
            let was_empty = span.start == span.end;
            let mut s = move_endpoint(span.start, start, end, new_len, span.flags >> 4);
            let e = move_endpoint(span.end, start, end, new_len, span.flags);
            if s > e {
                s = e;
            }
            span.start = s;
            span.end = e;
            // Exclusive-exclusive spans that lose all their text disappear.
            !(s == e && !was_empty && span.flags & SPAN_POINT_MARK_MASK == SPAN_EXCLUSIVE_EXCLUSIVE)
        });
        Ok(())
    }

    /// Replace `[start, end)` with `text`, carrying its spans (but not its selection).
    pub fn replace_spanned(
        &mut self,
        start: usize,
        end: usize,
        text: &SpannedText,
    ) -> Result<(), EditError> {
        self.replace(start, end, &text.as_string())?;
        for span in text.spans.iter().filter(|s| !s.object.is_selection()) {
            self.set_span(
                span.object.clone(),
                start + span.start,
                start + span.end,
                span.flags,
            )?;
        }
        Ok(())
    }

    /// Attach or move a span. An existing span with the same identity is moved.
    pub fn set_span(
        &mut self,
        object: SpanObject,
        start: usize,
        end: usize,
        flags: u32,
    ) -> Result<(), EditError> {
        self.check_range(start, end)?;
        // Selection edges are stored alike whichever half of a move set them.
        let flags = if object.is_selection() {
            flags & !SPAN_INTERMEDIATE
        } else {
            flags
        };
        match self.spans.iter_mut().find(|s| s.object.id == object.id) {
            Some(existing) => {
                existing.object = object;
                existing.start = start;
                existing.end = end;
                existing.flags = flags;
            }
            None => self.spans.push(Span {
                object,
                start,
                end,
                flags,
            }),
        }
        Ok(())
    }

    pub fn remove_span(&mut self, id: SpanId) -> Option<Span> {
        let index = self.spans.iter().position(|s| s.object.id == id)?;
        Some(self.spans.remove(index))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn span(&self, id: SpanId) -> Option<&Span> {
        self.spans.iter().find(|s| s.object.id == id)
    }

    /// All spans except the selection markers.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| !s.object.is_selection())
    }

    /// Non-selection spans touching `[start, end]`.
    pub fn spans_touching(&self, start: usize, end: usize) -> impl Iterator<Item = &Span> {
        self.spans().filter(move |s| s.touches(start, end))
    }

    pub fn selection(&self) -> Option<(usize, usize)> {
        let start = self.span(SELECTION_START_ID)?.start;
        let end = self.span(SELECTION_END_ID)?.start;
        Some((start, end))
    }

    pub fn set_selection(&mut self, start: usize, end: usize) -> Result<(), EditError> {
        self.set_span(SpanObject::SELECTION_START, start, start, SPAN_POINT_POINT)?;
        self.set_span(SpanObject::SELECTION_END, end, end, SPAN_POINT_POINT)
    }

    pub fn clear_selection(&mut self) {
        self.remove_span(SELECTION_START_ID);
        self.remove_span(SELECTION_END_ID);
    }

    pub fn has_composing(&self) -> bool {
        self.spans().any(Span::is_composing)
    }

    /// Minimal range covering every composing span.
    pub fn composing_range(&self) -> Option<(usize, usize)> {
        self.spans()
            .filter(|s| s.is_composing())
            .fold(None, |acc, s| match acc {
                None => Some((s.start, s.end)),
                Some((a, b)) => Some((a.min(s.start), b.max(s.end))),
            })
            .filter(|(a, b)| a < b)
    }

    /// Styled spans overlapping `(start, end)`, in attachment order.
    pub fn styles_in(&self, start: usize, end: usize) -> impl Iterator<Item = &TextStyle> {
        self.spans()
            .filter(move |s| s.start < end && s.end > start)
            .filter_map(|s| s.object.style())
    }

    /// Next styled-span boundary after `from`, capped at `limit`.
    pub fn next_style_transition(&self, from: usize, limit: usize) -> usize {
        self.spans()
            .filter(|s| s.object.style().is_some())
            .flat_map(|s| [s.start, s.end])
            .filter(|&p| p > from && p < limit)
            .min()
            .unwrap_or(limit)
    }

    /// Same characters, same spans (order-insensitive) and same selection.
    pub fn content_eq(&self, other: &SpannedText) -> bool {
        if self.chars != other.chars || self.spans.len() != other.spans.len() {
            return false;
        }
        self.spans.iter().all(|s| {
            other.span(s.object.id).is_some_and(|o| {
                o.start == s.start && o.end == s.end && o.flags == s.flags && o.object == s.object
            })
        })
    }

    fn check_range(&self, start: usize, end: usize) -> Result<(), EditError> {
        if start > end || end > self.chars.len() {
            return Err(EditError::InvalidRange {
                start,
                end,
                len: self.chars.len(),
            });
        }
        Ok(())
    }
}

/// Move one endpoint across `replace(start, end, new_len)`; `gravity` holds the
/// endpoint's gravity in its low nibble.
fn move_endpoint(p: usize, start: usize, end: usize, new_len: usize, gravity: u32) -> usize {
    let new_end = start + new_len;
    if p < start {
        p
    } else if p > end {
        p - end + new_end
    } else if p == start && start < end {
        start
    } else if p == end && start < end {
        new_end
    } else if gravity & 0xF == GRAVITY_POINT {
        new_end
    } else {
        start
    }
}

impl From<&str> for SpannedText {
    fn from(s: &str) -> Self {
        Self {
            chars: s.chars().collect(),
            spans: Vec::new(),
        }
    }
}

impl From<String> for SpannedText {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for SpannedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.chars {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_edges_drop_intermediate_flag() {
        let mut a = SpannedText::from("hello");
        a.set_span(
            SpanObject::SELECTION_START,
            3,
            3,
            SPAN_POINT_POINT | SPAN_INTERMEDIATE,
        )
        .unwrap();
        a.set_span(SpanObject::SELECTION_END, 4, 4, SPAN_POINT_POINT)
            .unwrap();
        let mut b = SpannedText::from("hello");
        b.set_selection(3, 4).unwrap();
        assert_eq!(a.selection(), Some((3, 4)));
        assert!(a.content_eq(&b));

        let marker = SpanObject::marker();
        a.set_span(marker.clone(), 0, 1, SPAN_INTERMEDIATE).unwrap();
        assert_eq!(a.span(marker.id()).unwrap().flags, SPAN_INTERMEDIATE);
    }

    #[test]
    fn test_insert_moves_point_not_mark() {
        let mut text = SpannedText::from("abc");
        let mark = SpanObject::marker();
        text.set_span(mark.clone(), 1, 1, SPAN_MARK_MARK).unwrap();
        text.set_selection(1, 1).unwrap();

        text.replace(1, 1, "xy").unwrap();
        assert_eq!(text.as_string(), "axybc");
        assert_eq!(text.selection(), Some((3, 3)));
        let span = text.span(mark.id()).unwrap();
        assert_eq!((span.start, span.end), (1, 1));
    }

    #[test]
    fn test_replace_shifts_following_spans() {
        let mut text = SpannedText::from("hello world");
        let span = SpanObject::marker();
        text.set_span(span.clone(), 6, 11, SPAN_EXCLUSIVE_EXCLUSIVE)
            .unwrap();
        text.replace(0, 5, "hi").unwrap();
        let s = text.span(span.id()).unwrap();
        assert_eq!((s.start, s.end), (3, 8));
        assert_eq!(text.substring(s.start, s.end).unwrap(), "world");
    }

    #[test]
    fn test_exclusive_span_removed_when_emptied() {
        let mut text = SpannedText::from("hello");
        let span = SpanObject::marker();
        text.set_span(span.clone(), 1, 4, SPAN_EXCLUSIVE_EXCLUSIVE | SPAN_COMPOSING)
            .unwrap();
        assert!(text.has_composing());
        text.replace(0, 5, "").unwrap();
        assert!(text.span(span.id()).is_none());
        assert!(!text.has_composing());
    }

    #[test]
    fn test_inclusive_span_survives_empty() {
        let mut text = SpannedText::from("hello");
        let span = SpanObject::marker();
        text.set_span(span.clone(), 1, 4, SPAN_INCLUSIVE_INCLUSIVE)
            .unwrap();
        text.replace(1, 4, "").unwrap();
        let s = text.span(span.id()).unwrap();
        assert_eq!((s.start, s.end), (1, 1));
    }

    #[test]
    fn test_set_span_rejects_bad_range() {
        let mut text = SpannedText::from("abc");
        let err = text.set_span(SpanObject::marker(), 2, 1, 0).unwrap_err();
        assert!(matches!(err, EditError::InvalidRange { .. }));
        assert!(text.set_span(SpanObject::marker(), 0, 4, 0).is_err());
    }

    #[test]
    fn test_index_of_and_last_index_of() {
        let text = SpannedText::from("abcabc");
        let needle: Vec<char> = "bc".chars().collect();
        assert_eq!(text.index_of(&needle, 0), Some(1));
        assert_eq!(text.index_of(&needle, 2), Some(4));
        assert_eq!(text.last_index_of(&needle), Some(4));
        assert_eq!(text.index_of(&['z'], 0), None);
    }

    #[test]
    fn test_composing_range_covers_all_composing_spans() {
        let mut text = SpannedText::from("0123456789");
        text.set_span(SpanObject::marker(), 2, 4, SPAN_COMPOSING)
            .unwrap();
        text.set_span(SpanObject::marker(), 6, 8, SPAN_COMPOSING)
            .unwrap();
        text.set_span(SpanObject::marker(), 0, 10, 0).unwrap();
        assert_eq!(text.composing_range(), Some((2, 8)));
    }

    #[test]
    fn test_slice_clips_spans() {
        let mut text = SpannedText::from("abcdef");
        let span = SpanObject::marker();
        text.set_span(span.clone(), 1, 5, SPAN_COMPOSING).unwrap();
        text.set_selection(2, 2).unwrap();
        let sub = text.slice(2, 6).unwrap();
        assert_eq!(sub.as_string(), "cdef");
        let s = sub.span(span.id()).unwrap();
        assert_eq!((s.start, s.end), (0, 3));
        assert_eq!(sub.selection(), None);
    }

    #[test]
    fn test_content_eq_ignores_span_order() {
        let a_span = SpanObject::marker();
        let b_span = SpanObject::marker();
        let mut a = SpannedText::from("xyz");
        let mut b = SpannedText::from("xyz");
        a.set_span(a_span.clone(), 0, 1, 0).unwrap();
        a.set_span(b_span.clone(), 1, 2, 0).unwrap();
        b.set_span(b_span, 1, 2, 0).unwrap();
        assert!(!a.content_eq(&b));
        b.set_span(a_span, 0, 1, 0).unwrap();
        assert!(a.content_eq(&b));
    }
}
