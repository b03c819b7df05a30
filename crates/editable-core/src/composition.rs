//! Projection of client-side composing/styling spans into the engine's flat
//! composition-range format.

use tracing::{debug, debug_span};

use crate::settings::CompositionSettings;
use crate::text::{SpannedText, TextStyle};

/// Classification of one composition segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeType {
    CaretPosition = 1,
    RawInput = 2,
    SelectedRawText = 3,
    ConvertedText = 4,
    SelectedConvertedText = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    None = 0,
    Solid = 1,
    Dotted = 2,
}

// Style bits carried by a segment.
pub const RANGE_UNDERLINE: u32 = 1;
pub const RANGE_FORECOLOR: u32 = 2;
pub const RANGE_BACKCOLOR: u32 = 4;
pub const RANGE_LINECOLOR: u32 = 8;

/// One range of the composition, offsets relative to the composition start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionSegment {
    pub start: usize,
    pub end: usize,
    pub range_type: RangeType,
    pub styles: u32,
    pub line_style: LineStyle,
    pub bold_line: bool,
    pub foreground: u32,
    pub background: u32,
    pub line_color: u32,
}

impl CompositionSegment {
    fn plain(start: usize, end: usize, range_type: RangeType) -> Self {
        Self {
            start,
            end,
            range_type,
            styles: 0,
            line_style: LineStyle::None,
            bold_line: false,
            foreground: 0,
            background: 0,
            line_color: 0,
        }
    }

    pub fn caret(offset: usize) -> Self {
        Self::plain(offset, offset, RangeType::CaretPosition)
    }
}

/// What the engine should be told about the client's composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionPlan {
    /// Nothing to send.
    Nothing,
    /// No composition; move the engine selection (and end any composition).
    Selection { start: usize, end: usize },
    /// Absolute composition range plus its segments. The caret marker, when
    /// present, is sent before the segments.
    Composition {
        start: usize,
        end: usize,
        caret: Option<usize>,
        segments: Vec<CompositionSegment>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectMode {
    /// The text is a replacement sequence: a composition covers all of it and
    /// a missing selection defaults to its end.
    pub whole_text: bool,
    /// Without a composition, report a selection move to the engine.
    pub notify_engine: bool,
}

/// Project `text` into a composition plan. `base` is the absolute offset of
/// `text` in the engine buffer (non-zero only for replacement sequences) and
/// `engine_selection` the engine's current selection, used to skip redundant
/// selection updates.
pub fn project_composition(
    text: &SpannedText,
    base: usize,
    mode: ProjectMode,
    engine_selection: Option<(usize, usize)>,
    settings: &CompositionSettings,
) -> CompositionPlan {
    let _span = debug_span!("project_composition", base, len = text.len()).entered();

    let selection = text.selection().or(if mode.whole_text {
        Some((text.len(), text.len()))
    } else {
        None
    });

    let Some((comp_start, comp_end)) = text.composing_range() else {
        if !mode.notify_engine {
            return CompositionPlan::Nothing;
        }
        return match selection {
            Some((s, e)) if engine_selection != Some((base + s, base + e)) => {
                CompositionPlan::Selection {
                    start: base + s,
                    end: base + e,
                }
            }
            _ => CompositionPlan::Nothing,
        };
    };
    let (comp_start, comp_end) = if mode.whole_text {
        (0, text.len())
    } else {
        (comp_start, comp_end)
    };

    let caret = selection
        .map(|(_, e)| e)
        .filter(|&e| e >= comp_start && e <= comp_end)
        .map(|e| e - comp_start);

    let segments = build_segments(text, comp_start, comp_end, selection, settings);
    debug!(comp_start, comp_end, segments = segments.len());

    CompositionPlan::Composition {
        start: base + comp_start,
        end: base + comp_end,
        caret,
        segments,
    }
}

fn build_segments(
    text: &SpannedText,
    comp_start: usize,
    comp_end: usize,
    selection: Option<(usize, usize)>,
    settings: &CompositionSettings,
) -> Vec<CompositionSegment> {
    let (sel_start, sel_end) = selection.unwrap_or((usize::MAX, usize::MAX));
    let has_range_selection = selection.is_some_and(|(s, e)| s != e);

    let mut segments = Vec::new();
    let mut seg_start = comp_start;
    while seg_start < comp_end {
        // Selection edges always cut, even in the middle of a style span.
        let seg_end = [sel_start, sel_end]
            .into_iter()
            .filter(|&p| p > seg_start && p < comp_end)
            .fold(text.next_style_transition(seg_start, comp_end), usize::min);

        let selected = has_range_selection && seg_start >= sel_start && seg_end <= sel_end;
        let rel_start = seg_start - comp_start;
        let rel_end = seg_end - comp_start;

        let styles: Vec<&TextStyle> = text.styles_in(seg_start, seg_end).collect();
        let segment = if styles.is_empty() {
            let range_type = if selected {
                RangeType::SelectedRawText
            } else {
                RangeType::RawInput
            };
            CompositionSegment::plain(rel_start, rel_end, range_type)
        } else {
            let range_type = if selected {
                RangeType::SelectedConvertedText
            } else {
                RangeType::ConvertedText
            };
            styled_segment(rel_start, rel_end, range_type, &styles, settings)
        };
        segments.push(segment);
        seg_start = seg_end;
    }
    segments
}

/// Fold the styles into one paint (later spans win) and translate it.
fn styled_segment(
    start: usize,
    end: usize,
    range_type: RangeType,
    styles: &[&TextStyle],
    settings: &CompositionSettings,
) -> CompositionSegment {
    let paint = styles.iter().fold(TextStyle::default(), |mut acc, s| {
        acc.underline |= s.underline;
        if s.underline_thickness != 0.0 {
            acc.underline_thickness = s.underline_thickness;
            acc.underline_color = s.underline_color;
        }
        if s.foreground != 0 {
            acc.foreground = s.foreground;
        }
        if s.background != 0 {
            acc.background = s.background;
        }
        acc
    });

    let mut segment = CompositionSegment::plain(start, end, range_type);
    if paint.underline {
        segment.styles |= RANGE_UNDERLINE;
        segment.line_style = LineStyle::Solid;
    }
    if paint.underline_thickness != 0.0 {
        segment.styles |= RANGE_UNDERLINE | RANGE_LINECOLOR;
        segment.line_color = paint.underline_color;
        if paint.underline_thickness <= settings.dotted_max_thickness {
            segment.line_style = LineStyle::Dotted;
        } else {
            segment.line_style = LineStyle::Solid;
            segment.bold_line = paint.underline_thickness >= settings.bold_min_thickness;
        }
    }
    // The foreground is always reported; a zero background means unset.
    segment.styles |= RANGE_FORECOLOR;
    segment.foreground = paint.foreground;
    if paint.background != 0 {
        segment.styles |= RANGE_BACKCOLOR;
        segment.background = paint.background;
    }
    segment
}
