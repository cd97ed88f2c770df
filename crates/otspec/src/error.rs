use thiserror::Error;

/// Why an offset could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetProblem {
    /// The target lies at or beyond the end of the source.
    OutOfBounds { len: usize },
    /// The target is already being decoded further up the resolution path.
    Cycle,
    /// Following the offset would nest deeper than the reader allows.
    TooDeep { limit: usize },
    /// The offset is zero where a table is required.
    Null,
}

impl std::fmt::Display for OffsetProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OffsetProblem::OutOfBounds { len } => write!(f, "points outside the {} byte source", len),
            OffsetProblem::Cycle => f.write_str("loops back to a table which is still being read"),
            OffsetProblem::TooDeep { limit } => {
                write!(f, "exceeds the nesting limit of {} tables", limit)
            }
            OffsetProblem::Null => f.write_str("is null but a table is required"),
        }
    }
}

/// Errors raised while decoding OpenType structures.
///
/// Every variant records where the failure happened: the table being read
/// and, where there is one, the field and the absolute byte position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeserializationError {
    #[error("{table}.{field}: needed {needed} bytes at offset {offset}, only {available} left")]
    TruncatedSource {
        table: &'static str,
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{table}.{field} at offset {offset}: format {format} is not supported")]
    UnsupportedFormat {
        table: &'static str,
        field: &'static str,
        format: u16,
        offset: usize,
    },

    #[error("{table}.{field} at offset {offset}: no subtable decoder registered for lookup type {lookup_type}")]
    UnknownLookupType {
        table: &'static str,
        field: &'static str,
        lookup_type: u16,
        offset: usize,
    },

    #[error("{table}.{field}: offset {displacement} from {base} (= {target}) {problem}")]
    MalformedOffset {
        table: &'static str,
        field: &'static str,
        base: usize,
        displacement: u16,
        target: usize,
        problem: OffsetProblem,
    },

    #[error("{table}.{field}: refers to `{referenced}`, which is missing or has the wrong kind")]
    SchemaError {
        table: &'static str,
        field: &'static str,
        referenced: &'static str,
    },

    #[error("{table} at offset {offset}: {reason}")]
    MalformedRanges {
        table: &'static str,
        offset: usize,
        reason: String,
    },
}
