//! Purpose: Define the stable public Rust API boundary for objpath.
//! Exports: `Engine` plus the object model, path, limit, conversion and error types it uses.
//! Role: Public, additive-only surface; hides the internal traversal modules.
//! Invariants: One `Engine` may serve many threads; each call owns its traversal state.
//! Invariants: The registry is injected, never global.
use std::sync::Arc;

use crate::core::serialize::Serializer;
use crate::core::write;

pub use crate::core::budget::{
    DEFAULT_MAX_COLLECTION_SIZE, DEFAULT_MAX_DEPTH, DEFAULT_MAX_OBJECTS, Limits, Marker,
    MarkerKind, Truncation,
};
pub use crate::core::convert::{
    ConversionTarget, Converter, DEFAULT_ARRAY_SEPARATOR, EMPTY_SENTINEL, Input, NULL_SENTINEL,
    ScalarKind,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::extract::collection::key_text;
pub use crate::core::extract::simplify::Simplifier;
pub use crate::core::extract::{Extractor, Shape};
pub use crate::core::fault::{FaultHandler, FaultMode, Propagate, Suppress};
pub use crate::core::name::ResourceName;
pub use crate::core::path::{Path, PathSyntax, Segment, escape_segment, unescape_segment};
pub use crate::core::registry::{ExtractorDescriptor, Registry, TypeKey};
pub use crate::core::serialize::{Request, Serialized};
pub use crate::core::value::{
    Bean, HostObject, ListRef, MapRef, PropertyBean, StructuredValue, Value,
};
pub use crate::core::write::WriteOutcome;

pub type ApiResult<T> = Result<T, Error>;

/// Facade bundling the registry, the converter and the serializer.
pub struct Engine {
    converter: Arc<Converter>,
    serializer: Serializer,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the built-in simplifiers and named parsers.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(Registry::with_defaults()), Arc::new(Converter::new()))
    }

    pub fn with_parts(registry: Arc<Registry>, converter: Arc<Converter>) -> Self {
        Self {
            converter,
            serializer: Serializer::new(registry),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.serializer.registry()
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    /// Serializes the node at `path`; the empty path is the whole value.
    pub fn serialize(&self, value: &Value, path: &Path, request: &Request) -> ApiResult<Serialized> {
        self.serializer.serialize(value, path, request)
    }

    /// Like `serialize`, with the path given in its text form.
    pub fn read(&self, value: &Value, path: &str, request: &Request) -> ApiResult<Serialized> {
        let path = Path::parse(path)?;
        self.serialize(value, &path, request)
    }

    pub fn convert(&self, target: &ConversionTarget, input: Input<'_>) -> ApiResult<Value> {
        self.converter.convert(target, input)
    }

    /// Converts `raw` to the kind of the value currently at `path` and stores it there.
    pub fn set_at_path(
        &self,
        root: &Value,
        path: &Path,
        raw: Input<'_>,
        request: &Request,
    ) -> ApiResult<WriteOutcome> {
        write::set_at_path(&self.serializer, &self.converter, root, path, raw, None, request)
    }

    /// Like `set_at_path` with an explicitly declared target type.
    pub fn set_at_path_as(
        &self,
        root: &Value,
        path: &Path,
        raw: Input<'_>,
        target: &ConversionTarget,
        request: &Request,
    ) -> ApiResult<WriteOutcome> {
        write::set_at_path(
            &self.serializer,
            &self.converter,
            root,
            path,
            raw,
            Some(target),
            request,
        )
    }
}
