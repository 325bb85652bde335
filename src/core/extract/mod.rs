//! Purpose: The extractor seam between the generic traversal and type-specific shapes.
//! Exports: `Extractor`, `Shape`, submodules for collections, beans and simplifiers.
//! Role: Extractors describe one level of structure; the serializer does all recursion.
//! Invariants: An extractor never serializes its children itself.
//! Invariants: `child` returns `Ok(None)` for a segment that does not exist.
pub mod bean;
pub mod collection;
pub mod simplifiers;
pub mod simplify;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::{StructuredValue, Value};

/// One level of structure produced by an extractor.
#[derive(Debug)]
pub enum Shape {
    Leaf(StructuredValue),
    /// Named children; each read may fail independently.
    Record {
        entries: Vec<(String, Result<Value, Error>)>,
        total: usize,
    },
    /// Ordered children, already cut to the requested maximum.
    Sequence { items: Vec<Value>, total: usize },
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    /// Children of `value`, keeping at most `max_entries` of a variable-size collection.
    fn shape(&self, value: &Value, max_entries: usize) -> Result<Shape, Error>;

    /// Whether path segments can be resolved one at a time.
    fn supports_segments(&self) -> bool {
        true
    }

    fn child(&self, value: &Value, segment: &str) -> Result<Option<Value>, Error>;

    fn supports_write(&self) -> bool {
        false
    }

    /// Stores `new` under `segment` and returns the value that now stands where
    /// `value` stood: the same identity for in-place writes, a rebuilt value otherwise.
    fn write(&self, value: &Value, segment: &str, _new: Value) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::ReadOnlyPath).with_message(format!(
            "{} values do not support writing `{segment}`",
            value.type_name()
        )))
    }
}

pub(crate) fn mismatch(extractor: &str, value: &Value) -> Error {
    Error::new(ErrorKind::Internal).with_message(format!(
        "extractor `{extractor}` dispatched for {} value",
        value.type_name()
    ))
}
