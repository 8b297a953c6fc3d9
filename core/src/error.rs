use thiserror::Error;

/// Why a record line was skipped.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: malformed record: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: record is not an object")]
    NotAnObject { line: usize },
    #[error("line {line}: missing required field `{field}`")]
    MissingField { line: usize, field: &'static str },
    #[error("line {line}: invalid value for `{field}`: {value}")]
    InvalidField { line: usize, field: &'static str, value: String },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Malformed { line, .. }
            | ParseError::NotAnObject { line }
            | ParseError::MissingField { line, .. }
            | ParseError::InvalidField { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached when a session was requested.
    #[error("{store} unavailable: {reason}")]
    Connection { store: &'static str, reason: String },
    /// A single read or write failed on an open session.
    #[error("{store} operation failed: {reason}")]
    Operation { store: &'static str, reason: String },
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    pub fn connection(store: &'static str, reason: impl ToString) -> Self {
        StoreError::Connection { store, reason: reason.to_string() }
    }

    pub fn operation(store: &'static str, reason: impl ToString) -> Self {
        StoreError::Operation { store, reason: reason.to_string() }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection { .. })
    }
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("engine has already been ingested")]
    AlreadyIngested,
    #[error("engine is not ready for queries")]
    NotReady,
    /// Only returned by single-record lookups; query resolution reports store
    /// failures inside its result instead.
    #[error(transparent)]
    Store(#[from] StoreError),
}
