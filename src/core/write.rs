//! Purpose: Path-addressed write-back: convert raw input and store it at one location.
//! Exports: `set_at_path`, `WriteOutcome`.
//! Role: Inverse of a partial read; used by the engine facade and the CLI `write` command.
//! Invariants: Containers and beans change in place; immutable values are rebuilt upward.
//! Invariants: Only ancestors that had to be rebuilt are replaced; siblings keep identity.
//! Invariants: Wildcards never appear in a write path.
use crate::core::convert::{ConversionTarget, Converter, Input};
use crate::core::error::{Error, ErrorKind};
use crate::core::path::{Path, Segment};
use crate::core::registry::Dispatch;
use crate::core::serialize::{Request, Serializer};
use crate::core::value::{StructuredValue, Value};

#[derive(Clone, Debug)]
pub struct WriteOutcome {
    /// Root after the write; the same identity unless the root itself was rebuilt.
    pub root: Value,
    /// Serialized value that stood at the path before, `Null` when it did not exist.
    pub previous: StructuredValue,
}

pub fn set_at_path(
    serializer: &Serializer,
    converter: &Converter,
    root: &Value,
    path: &Path,
    raw: Input<'_>,
    target: Option<&ConversionTarget>,
    request: &Request,
) -> Result<WriteOutcome, Error> {
    if path.has_wildcard() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("wildcards are not allowed in a write path")
            .with_path(path.clone()));
    }
    let Some((last, parents)) = path.segments().split_last() else {
        let previous = serializer.serialize(root, path, request)?.value;
        let target = target.cloned().unwrap_or_else(|| ConversionTarget::of(root));
        let replacement = converter.convert(&target, raw)?;
        return Ok(WriteOutcome {
            root: replacement,
            previous,
        });
    };
    let dispatch = serializer.registry().snapshot();

    let mut chain = vec![root.clone()];
    for (idx, segment) in parents.iter().enumerate() {
        let at = prefix(path, idx + 1);
        let Some(parent) = chain.last() else {
            break;
        };
        let child = read_child(&dispatch, parent, segment, &at)?
            .ok_or_else(|| missing(&at, segment))?;
        chain.push(child);
    }
    let parent = chain.last().cloned().unwrap_or(Value::Null);
    let current = read_child(&dispatch, &parent, last, path)?;
    ensure_writable(&dispatch, &parent, path)?;

    let previous = match &current {
        Some(value) => serializer.serialize(value, &Path::root(), request)?.value,
        None => StructuredValue::Null,
    };
    let target = match (target, &current) {
        (Some(target), _) => target.clone(),
        (None, Some(value)) if !value.is_null() => ConversionTarget::of(value),
        _ => ConversionTarget::Dynamic,
    };
    let new = converter
        .convert(&target, raw)
        .map_err(|err| err.or_path(path))?;

    let mut replacement = write_child(&dispatch, &parent, last, new, path)?;
    let mut level = chain.len() - 1;
    while level > 0 && !replacement.same_identity(&chain[level]) {
        let at = prefix(path, level);
        tracing::debug!(path = %at, "rebuilt value written into parent");
        replacement = write_child(
            &dispatch,
            &chain[level - 1],
            &parents[level - 1],
            replacement,
            &at,
        )?;
        level -= 1;
    }
    let root = if level == 0 { replacement } else { root.clone() };
    Ok(WriteOutcome { root, previous })
}

fn prefix(path: &Path, len: usize) -> Path {
    Path::from_segments(path.segments()[..len].to_vec())
}

fn missing(at: &Path, segment: &Segment) -> Error {
    Error::new(ErrorKind::PathNotFound)
        .with_message(format!("no `{}` on the way to the write target", segment.as_str()))
        .with_path(at.clone())
}

fn read_child(
    dispatch: &Dispatch,
    parent: &Value,
    segment: &Segment,
    at: &Path,
) -> Result<Option<Value>, Error> {
    if parent.is_scalar() {
        return Err(Error::new(ErrorKind::PathNotFound)
            .with_message(format!("{} value has no children", parent.type_name()))
            .with_path(at.clone()));
    }
    let extractor = dispatch.resolve(parent);
    extractor
        .child(parent, segment.as_str())
        .map_err(|err| err.or_path(at))
}

fn ensure_writable(dispatch: &Dispatch, parent: &Value, at: &Path) -> Result<(), Error> {
    let extractor = dispatch.resolve(parent);
    if extractor.supports_write() {
        return Ok(());
    }
    Err(Error::new(ErrorKind::ReadOnlyPath)
        .with_message(format!(
            "{} values are read-only (extractor `{}`)",
            parent.type_name(),
            extractor.name()
        ))
        .with_path(at.clone()))
}

fn write_child(
    dispatch: &Dispatch,
    parent: &Value,
    segment: &Segment,
    new: Value,
    at: &Path,
) -> Result<Value, Error> {
    ensure_writable(dispatch, parent, at)?;
    let extractor = dispatch.resolve(parent);
    extractor
        .write(parent, segment.as_str(), new)
        .map_err(|err| err.or_path(at))
}
