//! Purpose: Generic fallback extractor for host objects without a registered extractor.
//! Exports: `BeanExtractor`.
//! Role: Reads objects through their `Bean` view; opaque objects become a text leaf.
//! Invariants: Always applicable; the registry never fails to resolve an object.
use crate::core::error::{Error, ErrorKind};
use crate::core::extract::{Extractor, Shape, mismatch};
use crate::core::value::{Bean, StructuredValue, Value};

#[derive(Clone, Copy, Debug, Default)]
pub struct BeanExtractor;

impl BeanExtractor {
    fn bean<'v>(&self, value: &'v Value) -> Result<Option<&'v dyn Bean>, Error> {
        match value {
            Value::Object(object) => Ok(object.as_bean()),
            _ => Err(mismatch(self.name(), value)),
        }
    }
}

impl Extractor for BeanExtractor {
    fn name(&self) -> &str {
        "bean"
    }

    fn shape(&self, value: &Value, _max_entries: usize) -> Result<Shape, Error> {
        let Some(bean) = self.bean(value)? else {
            let text = match value {
                Value::Object(object) => object.describe(),
                _ => value.type_name().to_string(),
            };
            return Ok(Shape::Leaf(StructuredValue::String(text)));
        };
        let entries: Vec<(String, Result<Value, Error>)> = bean
            .property_names()
            .into_iter()
            .map(|name| {
                let read = bean.get_property(&name).and_then(|found| {
                    found.ok_or_else(|| {
                        Error::new(ErrorKind::Access)
                            .with_message(format!("property `{name}` disappeared while reading"))
                    })
                });
                (name, read)
            })
            .collect();
        let total = entries.len();
        Ok(Shape::Record { entries, total })
    }

    fn child(&self, value: &Value, segment: &str) -> Result<Option<Value>, Error> {
        match self.bean(value)? {
            Some(bean) => bean.get_property(segment),
            None => Err(Error::new(ErrorKind::PathNotFound).with_message(format!(
                "{} exposes no properties; cannot select `{segment}`",
                value.type_name()
            ))),
        }
    }

    fn supports_write(&self) -> bool {
        true
    }

    fn write(&self, value: &Value, segment: &str, new: Value) -> Result<Value, Error> {
        let Some(bean) = self.bean(value)? else {
            return Err(Error::new(ErrorKind::ReadOnlyPath)
                .with_message(format!("{} exposes no writable properties", value.type_name())));
        };
        if bean.get_property(segment)?.is_none() {
            return Err(Error::new(ErrorKind::PathNotFound)
                .with_message(format!("no property `{segment}` on {}", value.type_name())));
        }
        if !bean.is_writable(segment) {
            return Err(Error::new(ErrorKind::ReadOnlyPath)
                .with_message(format!("property `{segment}` is read-only")));
        }
        bean.set_property(segment, new)?;
        Ok(value.clone())
    }
}
