//! Purpose: Per-call traversal bounds, the open-ancestor set, and the text markers they produce.
//! Exports: `Limits`, `Budget`, `Visited`, `Marker`, `Truncation`.
//! Role: Guarantees every forward serialization terminates with bounded output.
//! Invariants: A `Budget` and `Visited` belong to exactly one top-level call.
//! Invariants: Exceeding a bound truncates (emits a marker); it never raises.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};
use crate::core::path::Path;
use crate::core::value::StructuredValue;

pub const DEFAULT_MAX_DEPTH: usize = 16;
pub const DEFAULT_MAX_COLLECTION_SIZE: usize = 1000;
pub const DEFAULT_MAX_OBJECTS: usize = 100_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_depth: usize,
    pub max_collection_size: usize,
    pub max_objects: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_collection_size: DEFAULT_MAX_COLLECTION_SIZE,
            max_objects: DEFAULT_MAX_OBJECTS,
        }
    }
}

impl Limits {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_collection_size(mut self, max_collection_size: usize) -> Self {
        self.max_collection_size = max_collection_size;
        self
    }

    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        let zero = [
            ("max_depth", self.max_depth),
            ("max_collection_size", self.max_collection_size),
            ("max_objects", self.max_objects),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);
        match zero {
            Some((name, _)) => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("{name} must be at least 1"))),
            None => Ok(()),
        }
    }
}

/// A collection that was cut to `retained` entries at `path`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Truncation {
    pub path: String,
    pub original_len: usize,
    pub retained: usize,
}

#[derive(Debug)]
pub struct Budget {
    limits: Limits,
    emitted: usize,
    containers: usize,
    truncations: Vec<Truncation>,
}

impl Budget {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            emitted: 0,
            containers: 0,
            truncations: Vec::new(),
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Checks whether a container at `depth` may be opened.
    pub fn admit(&self, depth: usize) -> Option<MarkerKind> {
        if depth >= self.limits.max_depth {
            return Some(MarkerKind::Depth);
        }
        if self.emitted >= self.limits.max_objects {
            return Some(MarkerKind::Objects);
        }
        None
    }

    pub fn open_container(&mut self) {
        self.containers += 1;
        self.emitted += 1;
    }

    pub fn emit_leaf(&mut self) {
        self.emitted += 1;
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn containers(&self) -> usize {
        self.containers
    }

    /// Number of elements to keep from a collection of `len`, recording the cut.
    pub fn retain(&mut self, path: &Path, len: usize) -> usize {
        let max = self.limits.max_collection_size;
        if len <= max {
            return len;
        }
        tracing::trace!(path = %path, original_len = len, retained = max, "collection truncated");
        self.truncations.push(Truncation {
            path: path.to_string(),
            original_len: len,
            retained: max,
        });
        max
    }

    pub fn into_truncations(self) -> Vec<Truncation> {
        self.truncations
    }
}

/// Identities of the currently open ancestors only.
#[derive(Debug, Default)]
pub struct Visited {
    open: HashSet<usize>,
}

impl Visited {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when `identity` is already an open ancestor.
    pub fn enter(&mut self, identity: usize) -> bool {
        self.open.insert(identity)
    }

    pub fn leave(&mut self, identity: usize) {
        self.open.remove(&identity);
    }

    pub fn is_open(&self, identity: usize) -> bool {
        self.open.contains(&identity)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MarkerKind {
    Depth,
    Objects,
    Cycle,
}

/// Text stand-in for a node that was not descended into.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub limit: Option<usize>,
    pub type_name: String,
}

impl Marker {
    pub fn new(kind: MarkerKind, limits: &Limits, type_name: &str) -> Self {
        let limit = match kind {
            MarkerKind::Depth => Some(limits.max_depth),
            MarkerKind::Objects => Some(limits.max_objects),
            MarkerKind::Cycle => None,
        };
        Self {
            kind,
            limit,
            type_name: type_name.to_string(),
        }
    }

    pub fn render(&self) -> String {
        match (self.kind, self.limit) {
            (MarkerKind::Depth, Some(limit)) => {
                format!("[Depth limit {limit} reached: {}]", self.type_name)
            }
            (MarkerKind::Objects, Some(limit)) => {
                format!("[Object limit {limit} reached: {}]", self.type_name)
            }
            _ => format!("[Reference cycle: {}]", self.type_name),
        }
    }

    pub fn to_structured(&self) -> StructuredValue {
        StructuredValue::String(self.render())
    }

    /// Recognizes a rendered marker inside serialized output.
    pub fn parse(value: &StructuredValue) -> Option<Marker> {
        let text = value.as_str()?.strip_prefix('[')?.strip_suffix(']')?;
        if let Some(type_name) = text.strip_prefix("Reference cycle: ") {
            return Some(Self {
                kind: MarkerKind::Cycle,
                limit: None,
                type_name: type_name.to_string(),
            });
        }
        let (kind, rest) = if let Some(rest) = text.strip_prefix("Depth limit ") {
            (MarkerKind::Depth, rest)
        } else if let Some(rest) = text.strip_prefix("Object limit ") {
            (MarkerKind::Objects, rest)
        } else {
            return None;
        };
        let (limit, type_name) = rest.split_once(" reached: ")?;
        Some(Self {
            kind,
            limit: Some(limit.parse().ok()?),
            type_name: type_name.to_string(),
        })
    }
}
