//! Crate-wide error type.
//!
//! The teacher's `SqlError` (see `expr.rs` in the reference tree) carries
//! `(rname, line, column, msg)` and is raised with `panic!` / caught with
//! `catch_unwind`. Per the "Exceptions for control flow" design note, this
//! crate keeps the same informational shape but propagates it as an
//! ordinary `Result` value via `?`.

use thiserror::Error;

/// Taxonomy from spec.md section 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Semantic,
    ResourceBusy,
    AlreadyExists,
    ReaderOutOfDate,
    Io,
    Internal,
}

/// A compilation or execution failure, with position in the original SQL text.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SqlError {
    pub kind: ErrorKind,
    /// Byte offset into the original SQL text, or 0 where unknown.
    pub position: usize,
    pub message: String,
    #[source]
    source: Option<std::io::Error>,
}

impl Clone for SqlError {
    fn clone(&self) -> Self {
        SqlError {
            kind: self.kind,
            position: self.position,
            message: self.message.clone(),
            source: self.source.as_ref().map(|e| std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl SqlError {
    pub fn new(kind: ErrorKind, position: usize, message: impl Into<String>) -> Self {
        SqlError {
            kind,
            position,
            message: message.into(),
            source: None,
        }
    }

    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, position, message)
    }

    pub fn semantic(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Semantic, position, message)
    }

    pub fn busy(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceBusy, position, message)
    }

    pub fn already_exists(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, position, message)
    }

    pub fn reader_out_of_date(position: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReaderOutOfDate, position, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, 0, message)
    }

    pub fn io(position: usize, err: &std::io::Error) -> Self {
        SqlError {
            kind: ErrorKind::Io,
            position,
            message: format!("{err}"),
            source: Some(std::io::Error::new(err.kind(), err.to_string())),
        }
    }

    pub fn is_reader_out_of_date(&self) -> bool {
        self.kind == ErrorKind::ReaderOutOfDate
    }
}

/// COPY streams files through plain `std::io::Read`; `?` on a read needs
/// this to land directly in `SqlError` (section 7: "IOError: ... surfaced
/// with errno").
impl From<std::io::Error> for SqlError {
    fn from(err: std::io::Error) -> Self {
        SqlError::io(0, &err)
    }
}

pub type Result<T> = std::result::Result<T, SqlError>;
