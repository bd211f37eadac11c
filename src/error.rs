use thiserror::Error;

/// Broad category of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntactic,
    ReferenceSyntax,
    ReferenceSemantics,
    Resource,
}

/// Reason a pattern was rejected. Indices are 0-based character positions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("character {ch:?} at index {index} is not allowed")]
    InvalidChar { ch: char, index: usize },

    #[error("unexpected {ch:?} at index {index}")]
    UnexpectedChar { ch: char, index: usize },

    #[error("pattern ends in the middle of a construct at index {index}")]
    UnexpectedEnd { index: usize },

    #[error("'*' at index {index} must follow a letter or ')'")]
    MisplacedStar { index: usize },

    #[error("'|' at index {index} cannot start or end the pattern")]
    MisplacedBar { index: usize },

    #[error("unmatched closing parenthesis at index {index}")]
    UnmatchedClose { index: usize },

    #[error("{count} parenthesis left unclosed")]
    Unclosed { count: usize },

    #[error("group opened at index {index} exceeds the limit of 9 capturing groups")]
    TooManyGroups { index: usize },

    #[error("reference to undeclared group {group} at index {index}")]
    UndeclaredGroup { group: u8, index: usize },

    #[error("expression reference (?{group}) names a missing group, pattern has {count}")]
    UnknownGroup { group: u8, count: u8 },

    #[error("string back-reference to group {group} at index {index} is not guaranteed initialized")]
    Uninitialized { group: u8, index: usize },

    #[error("validation gave up after exploring {limit} paths")]
    PathLimit { limit: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidChar { .. } => ErrorKind::Lexical,
            Error::UnexpectedChar { .. }
            | Error::UnexpectedEnd { .. }
            | Error::MisplacedStar { .. }
            | Error::MisplacedBar { .. }
            | Error::UnmatchedClose { .. }
            | Error::Unclosed { .. } => ErrorKind::Syntactic,
            Error::TooManyGroups { .. }
            | Error::UndeclaredGroup { .. }
            | Error::UnknownGroup { .. } => ErrorKind::ReferenceSyntax,
            Error::Uninitialized { .. } => ErrorKind::ReferenceSemantics,
            Error::PathLimit { .. } => ErrorKind::Resource,
        }
    }

    /// Position of the offending character, when the error has one.
    pub fn index(&self) -> Option<usize> {
        match self {
            Error::InvalidChar { index, .. }
            | Error::UnexpectedChar { index, .. }
            | Error::UnexpectedEnd { index }
            | Error::MisplacedStar { index }
            | Error::MisplacedBar { index }
            | Error::UnmatchedClose { index }
            | Error::TooManyGroups { index }
            | Error::UndeclaredGroup { index, .. }
            | Error::Uninitialized { index, .. } => Some(*index),
            Error::Unclosed { .. } | Error::UnknownGroup { .. } | Error::PathLimit { .. } => None,
        }
    }
}
