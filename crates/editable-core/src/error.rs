#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("invalid range {start}..{end} for text of length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
    #[error("unknown span {0}")]
    UnknownSpan(u64),
}
