//! Purpose: Built-in extractors for scalars, lists and maps.
//! Exports: `LeafExtractor`, `ListExtractor`, `MapExtractor`, `key_text`.
//! Role: Structural dispatch targets the registry uses before any typed lookup.
//! Invariants: Map keys are stringified deterministically, never by identity.
//! Invariants: List and map writes mutate in place and keep the container identity.
use std::collections::HashSet;

use serde_json::Map;

use crate::core::error::{Error, ErrorKind};
use crate::core::extract::{Extractor, Shape, mismatch};
use crate::core::value::{StructuredValue, Value};

const KEY_NESTING_LIMIT: usize = 8;

#[derive(Clone, Copy, Debug, Default)]
pub struct LeafExtractor;

impl Extractor for LeafExtractor {
    fn name(&self) -> &str {
        "leaf"
    }

    fn shape(&self, value: &Value, _max_entries: usize) -> Result<Shape, Error> {
        value
            .scalar_to_structured()
            .map(Shape::Leaf)
            .ok_or_else(|| mismatch(self.name(), value))
    }

    fn supports_segments(&self) -> bool {
        false
    }

    fn child(&self, value: &Value, segment: &str) -> Result<Option<Value>, Error> {
        Err(Error::new(ErrorKind::PathNotFound)
            .with_message(format!("cannot select `{segment}` inside a {} value", value.type_name())))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ListExtractor;

impl Extractor for ListExtractor {
    fn name(&self) -> &str {
        "list"
    }

    fn shape(&self, value: &Value, max_entries: usize) -> Result<Shape, Error> {
        let Value::List(list) = value else {
            return Err(mismatch(self.name(), value));
        };
        let items = list.read();
        Ok(Shape::Sequence {
            items: items.iter().take(max_entries).cloned().collect(),
            total: items.len(),
        })
    }

    fn child(&self, value: &Value, segment: &str) -> Result<Option<Value>, Error> {
        let Value::List(list) = value else {
            return Err(mismatch(self.name(), value));
        };
        let index = parse_index(segment)?;
        Ok(list.read().get(index).cloned())
    }

    fn supports_write(&self) -> bool {
        true
    }

    fn write(&self, value: &Value, segment: &str, new: Value) -> Result<Value, Error> {
        let Value::List(list) = value else {
            return Err(mismatch(self.name(), value));
        };
        let index = parse_index(segment)?;
        let mut items = list.write();
        let len = items.len();
        if index < len {
            items[index] = new;
        } else if index == len {
            items.push(new);
        } else {
            return Err(Error::new(ErrorKind::PathNotFound).with_message(format!(
                "index {index} is beyond the end of a list of {len}"
            )));
        }
        Ok(value.clone())
    }
}

fn parse_index(segment: &str) -> Result<usize, Error> {
    segment.parse::<usize>().map_err(|_| {
        Error::new(ErrorKind::PathNotFound)
            .with_message(format!("`{segment}` is not a list index"))
            .with_hint("List elements are addressed by a zero-based decimal index.")
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MapExtractor;

impl Extractor for MapExtractor {
    fn name(&self) -> &str {
        "map"
    }

    fn shape(&self, value: &Value, max_entries: usize) -> Result<Shape, Error> {
        let Value::Map(map) = value else {
            return Err(mismatch(self.name(), value));
        };
        let entries = map.read();
        Ok(Shape::Record {
            entries: entries
                .iter()
                .take(max_entries)
                .map(|(key, value)| (key_text(key), Ok(value.clone())))
                .collect(),
            total: entries.len(),
        })
    }

    fn child(&self, value: &Value, segment: &str) -> Result<Option<Value>, Error> {
        let Value::Map(map) = value else {
            return Err(mismatch(self.name(), value));
        };
        Ok(map
            .read()
            .iter()
            .find(|(key, _)| key_text(key) == segment)
            .map(|(_, value)| value.clone()))
    }

    fn supports_write(&self) -> bool {
        true
    }

    fn write(&self, value: &Value, segment: &str, new: Value) -> Result<Value, Error> {
        let Value::Map(map) = value else {
            return Err(mismatch(self.name(), value));
        };
        let mut entries = map.write();
        match entries.iter_mut().find(|(key, _)| key_text(key) == segment) {
            Some((_, slot)) => *slot = new,
            None => entries.push((Value::Text(segment.to_string()), new)),
        }
        Ok(value.clone())
    }
}

/// Text form of a map key. Scalars print plainly; containers and objects print
/// as compact JSON of their plain structure.
pub fn key_text(key: &Value) -> String {
    match key {
        Value::Text(text) => text.clone(),
        Value::Char(ch) => ch.to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(value) => value.to_string(),
        Value::Int(value) => value.to_string(),
        Value::UInt(value) => value.to_string(),
        Value::Float(value) => value.to_string(),
        Value::Decimal(value) => value.to_string(),
        Value::List(_) | Value::Map(_) | Value::Object(_) => {
            let mut open = HashSet::new();
            let plain = plain_structure(key, 0, &mut open);
            crate::json::to_text(&plain, false).unwrap_or_else(|_| key.type_name().to_string())
        }
    }
}

fn plain_structure(value: &Value, depth: usize, open: &mut HashSet<usize>) -> StructuredValue {
    if let Some(scalar) = value.scalar_to_structured() {
        return scalar;
    }
    let identity = value.identity().unwrap_or_default();
    if depth >= KEY_NESTING_LIMIT || !open.insert(identity) {
        return StructuredValue::String(value.type_name().to_string());
    }
    let plain = match value {
        Value::List(list) => StructuredValue::Array(
            list.read()
                .iter()
                .map(|item| plain_structure(item, depth + 1, open))
                .collect(),
        ),
        Value::Map(map) => {
            let mut out = Map::new();
            for (key, item) in map.read().iter() {
                out.insert(key_text(key), plain_structure(item, depth + 1, open));
            }
            StructuredValue::Object(out)
        }
        Value::Object(object) => StructuredValue::String(object.describe()),
        _ => StructuredValue::Null,
    };
    open.remove(&identity);
    plain
}
