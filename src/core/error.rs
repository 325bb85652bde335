//! Purpose: Single error model for serialization, conversion and write-back.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Every fallible engine operation returns this type; context is attached with builders.
//! Invariants: Errors raised at a location carry the `Path` where they arose.
//! Invariants: Cycle and bound conditions are markers in the output, never errors.
use std::error::Error as StdError;
use std::fmt;

use crate::core::path::Path;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    PathNotFound,
    UnsupportedConversion,
    Conversion,
    ReadOnlyPath,
    Access,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<Path>,
    target: Option<String>,
    input: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            target: None,
            input: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: Path) -> Self {
        self.path = Some(path);
        self
    }

    /// Attaches `path` only when no location was recorded closer to the fault.
    pub fn or_path(mut self, path: &Path) -> Self {
        if self.path.is_none() {
            self.path = Some(path.clone());
        }
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether the error describes a request that cannot be satisfied at all,
    /// as opposed to an incidental failure while reading one node.
    pub fn is_addressed(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::PathNotFound
                | ErrorKind::UnsupportedConversion
                | ErrorKind::Conversion
                | ErrorKind::ReadOnlyPath
                | ErrorKind::Usage
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {path})")?;
        }
        if let Some(target) = &self.target {
            write!(f, " (target: {target})")?;
        }
        if let Some(input) = &self.input {
            write!(f, " (input: {input:?})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::PathNotFound => 3,
        ErrorKind::UnsupportedConversion => 4,
        ErrorKind::Conversion => 5,
        ErrorKind::ReadOnlyPath => 6,
        ErrorKind::Access => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};
    use crate::core::path::Path;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::PathNotFound, 3),
            (ErrorKind::UnsupportedConversion, 4),
            (ErrorKind::Conversion, 5),
            (ErrorKind::ReadOnlyPath, 6),
            (ErrorKind::Access, 7),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::Conversion)
            .with_message("not an integer")
            .with_path(Path::parse("a.b").expect("path"))
            .with_target("i32")
            .with_input("x1");
        assert_eq!(
            err.to_string(),
            "Conversion: not an integer (path: a.b) (target: i32) (input: \"x1\")"
        );
    }

    #[test]
    fn or_path_keeps_innermost_location() {
        let inner = Path::parse("a.b.c").expect("path");
        let outer = Path::parse("a").expect("path");
        let err = Error::new(ErrorKind::Access)
            .with_path(inner.clone())
            .or_path(&outer);
        assert_eq!(err.path(), Some(&inner));
    }
}
