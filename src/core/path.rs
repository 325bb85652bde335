//! Purpose: Parse, escape and render the dotted path expressions that address nodes.
//! Exports: `Path`, `Segment`, `PathSyntax`, `escape_segment`, `unescape_segment`.
//! Role: Shared addressing model for partial reads, wildcards and write-back.
//! Invariants: `unescape_segment(escape_segment(s)) == s` for every text `s`.
//! Invariants: A parsed `Path` is immutable; the empty text parses to the empty path.
use std::fmt;
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_SEPARATOR: char = '.';
pub const DEFAULT_ESCAPE: char = '\\';
pub const WILDCARD: char = '*';

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Segment {
    Key(String),
    Wildcard,
}

impl Segment {
    pub fn key(text: impl Into<String>) -> Self {
        Self::Key(text.into())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// Literal text of the segment; the wildcard renders as `*`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Key(text) => text,
            Self::Wildcard => "*",
        }
    }
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Self::Key(value.to_string())
    }
}

/// Separator and escape characters of the path wire format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PathSyntax {
    separator: char,
    escape: char,
}

impl Default for PathSyntax {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            escape: DEFAULT_ESCAPE,
        }
    }
}

impl PathSyntax {
    pub fn new(separator: char, escape: char) -> Result<Self, Error> {
        if separator == escape || separator == WILDCARD || escape == WILDCARD {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("path separator, escape and wildcard must be distinct"));
        }
        Ok(Self { separator, escape })
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn escape_char(&self) -> char {
        self.escape
    }

    pub fn escape_segment(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch == self.separator || ch == self.escape || ch == WILDCARD {
                out.push(self.escape);
            }
            out.push(ch);
        }
        out
    }

    pub fn unescape_segment(&self, text: &str) -> Result<String, Error> {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch == self.escape {
                let Some(next) = chars.next() else {
                    return Err(dangling_escape(text));
                };
                out.push(next);
            } else {
                out.push(ch);
            }
        }
        Ok(out)
    }

    pub fn parse(&self, text: &str) -> Result<Path, Error> {
        if text.is_empty() {
            return Ok(Path::root());
        }
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut escaped_any = false;
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch == self.escape {
                let Some(next) = chars.next() else {
                    return Err(dangling_escape(text));
                };
                current.push(next);
                escaped_any = true;
            } else if ch == self.separator {
                segments.push(finish_segment(&mut current, escaped_any));
                escaped_any = false;
            } else {
                current.push(ch);
            }
        }
        segments.push(finish_segment(&mut current, escaped_any));
        Ok(Path::from_segments(segments))
    }

    /// Text form of `path`. `parse(join(p)) == p` for every path except the lone
    /// empty key `[""]`, which joins to the empty text and parses back as the root.
    /// Address that key with a `Path` built from segments.
    pub fn join(&self, path: &Path) -> String {
        let mut out = String::new();
        for (idx, segment) in path.segments().iter().enumerate() {
            if idx > 0 {
                out.push(self.separator);
            }
            match segment {
                Segment::Wildcard => out.push(WILDCARD),
                Segment::Key(text) => out.push_str(&self.escape_segment(text)),
            }
        }
        out
    }
}

fn finish_segment(current: &mut String, escaped_any: bool) -> Segment {
    let text = std::mem::take(current);
    if !escaped_any && text.len() == 1 && text.starts_with(WILDCARD) {
        Segment::Wildcard
    } else {
        Segment::Key(text)
    }
}

fn dangling_escape(text: &str) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("path ends with a dangling escape character")
        .with_input(text)
        .with_hint("Escape a literal backslash as \\\\.")
}

pub fn escape_segment(text: &str) -> String {
    PathSyntax::default().escape_segment(text)
}

pub fn unescape_segment(text: &str) -> Result<String, Error> {
    PathSyntax::default().unescape_segment(text)
}

/// Ordered, immutable list of segments. Cloning shares the segment storage.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Path {
    segments: Arc<[Segment]>,
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

impl Path {
    pub fn root() -> Self {
        Self {
            segments: Arc::from(Vec::new()),
        }
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        PathSyntax::default().parse(text)
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments: Arc::from(segments),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn parent(&self) -> Option<Path> {
        let (_, head) = self.segments.split_last()?;
        Some(Self::from_segments(head.to_vec()))
    }

    pub fn child(&self, segment: Segment) -> Path {
        let mut segments = self.segments.to_vec();
        segments.push(segment);
        Self::from_segments(segments)
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(Segment::is_wildcard)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&PathSyntax::default().join(self))
    }
}

#[cfg(test)]
mod tests {
    use super::{Path, PathSyntax, Segment, escape_segment, unescape_segment};

    #[test]
    fn escape_round_trips_reserved_characters() {
        let cases = [
            "",
            "plain",
            "a.b",
            "back\\slash",
            "\\",
            "..",
            "*",
            "mixed.\\*.end\\",
            "unicode ☃.x",
        ];
        for case in cases {
            let escaped = escape_segment(case);
            assert_eq!(unescape_segment(&escaped).expect("unescape"), case);
        }
    }

    #[test]
    fn parse_splits_on_unescaped_separator() {
        let path = Path::parse(r"a.b\.c.d\\").expect("path");
        assert_eq!(
            path.segments(),
            &[
                Segment::key("a"),
                Segment::key("b.c"),
                Segment::key("d\\"),
            ]
        );
    }

    #[test]
    fn empty_text_is_root() {
        let path = Path::parse("").expect("path");
        assert!(path.is_empty());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn standalone_star_is_wildcard_and_escaped_star_is_literal() {
        let path = Path::parse(r"a.*.\*.x*y").expect("path");
        assert_eq!(
            path.segments(),
            &[
                Segment::key("a"),
                Segment::Wildcard,
                Segment::key("*"),
                Segment::key("x*y"),
            ]
        );
        assert_eq!(path.to_string(), r"a.*.\*.x\*y");
    }

    #[test]
    fn join_then_parse_is_identity() {
        let path = Path::from_segments(vec![
            Segment::key("a.b"),
            Segment::key(""),
            Segment::key("c\\d"),
            Segment::Wildcard,
        ]);
        let text = path.to_string();
        assert_eq!(Path::parse(&text).expect("path"), path);
    }

    #[test]
    fn lone_empty_key_joins_to_root_text() {
        let lone = Path::from_segments(vec![Segment::key("")]);
        assert_eq!(lone.to_string(), "");
        assert_eq!(Path::parse(&lone.to_string()).expect("path"), Path::root());
        let pair = Path::from_segments(vec![Segment::key(""), Segment::key("")]);
        assert_eq!(pair.to_string(), ".");
        assert_eq!(Path::parse(".").expect("path"), pair);
    }

    #[test]
    fn dangling_escape_is_usage_error() {
        let err = Path::parse("a\\").unwrap_err();
        assert_eq!(err.kind(), crate::core::error::ErrorKind::Usage);
        assert!(unescape_segment("x\\").is_err());
    }

    #[test]
    fn custom_syntax_uses_its_own_characters() {
        let syntax = PathSyntax::new('/', '!').expect("syntax");
        let path = syntax.parse("a/b!/c/!!").expect("path");
        assert_eq!(
            path.segments(),
            &[Segment::key("a"), Segment::key("b/c"), Segment::key("!")]
        );
        assert_eq!(syntax.join(&path), "a/b!/c/!!");
        assert!(PathSyntax::new('.', '.').is_err());
    }

    #[test]
    fn parent_and_child_navigate() {
        let path = Path::parse("a.b").expect("path");
        assert_eq!(path.parent(), Some(Path::parse("a").expect("path")));
        assert_eq!(path.child(Segment::key("c")).to_string(), "a.b.c");
        assert_eq!(Path::root().parent(), None);
    }
}
