use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;

/// Command-line syntax problems detected before any input is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("malformed value for {option}: {value:?}")]
    MalformedArgument { option: String, value: String },

    #[error("no input files specified")]
    MissingInput,
}

/// Structural problem in a hex stream or class file.
///
/// Carries the offending message plus a list of context lines that grow as
/// the error bubbles out of nested parsing steps, outermost last.
#[derive(Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
    offset: Option<usize>,
    context: Vec<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
            context: Vec::new(),
        }
    }

    pub fn at(offset: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, line: impl Into<String>) -> Self {
        self.add_context(line);
        self
    }

    pub fn add_context(&mut self, line: impl Into<String>) {
        self.context.push(line.into());
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Writes the condensed diagnostic: the message followed by each
    /// context line.
    pub fn print_context(&self, out: &mut dyn Write) -> io::Result<()> {
        match self.offset {
            Some(offset) => writeln!(out, "{} (at offset {offset:#06x})", self.message)?,
            None => writeln!(out, "{}", self.message)?,
        }
        for line in &self.context {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseError")
            .field("message", &self.message)
            .field("offset", &self.offset)
            .field("context", &self.context)
            .finish()
    }
}

/// Every way processing an input file can fail. All of them end the run with
/// [`crate::driver::ExitStatus::UsageOrParseFailure`].
#[derive(Debug, Error)]
pub enum DumpError {
    #[error("input {name} is not valid UTF-8 text")]
    Encoding {
        name: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("trouble parsing: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to write dump output")]
    Output(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DumpError>;

/// Result type for collaborators that only ever fail structurally.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
