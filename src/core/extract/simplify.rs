//! Purpose: Table-driven extractor that condenses one host type into fixed named attributes.
//! Exports: `Simplifier`.
//! Role: Building block for every built-in and host-provided simplification.
//! Invariants: The attribute set is fixed once the simplifier is registered.
//! Invariants: Unknown attribute names resolve to "not found"; writes rebuild the value.
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind};
use crate::core::extract::{Extractor, Shape, mismatch};
use crate::core::value::{HostObject, Value};

type Reader<T> = Arc<dyn Fn(&T) -> Result<Value, Error> + Send + Sync>;
type Writer<T> = Arc<dyn Fn(&T, Value) -> Result<T, Error> + Send + Sync>;

struct Attribute<T> {
    name: &'static str,
    read: Reader<T>,
    write: Option<Writer<T>>,
}

pub struct Simplifier<T> {
    name: &'static str,
    attributes: Vec<Attribute<T>>,
}

impl<T: HostObject> Simplifier<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    pub fn attribute<R>(mut self, name: &'static str, read: R) -> Self
    where
        R: Fn(&T) -> Result<Value, Error> + Send + Sync + 'static,
    {
        self.attributes.push(Attribute {
            name,
            read: Arc::new(read),
            write: None,
        });
        self
    }

    /// Adds an attribute whose writer returns a rebuilt value with the attribute replaced.
    pub fn writable_attribute<R, W>(mut self, name: &'static str, read: R, write: W) -> Self
    where
        R: Fn(&T) -> Result<Value, Error> + Send + Sync + 'static,
        W: Fn(&T, Value) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.attributes.push(Attribute {
            name,
            read: Arc::new(read),
            write: Some(Arc::new(write)),
        });
        self
    }

    pub fn attribute_names(&self) -> Vec<&'static str> {
        self.attributes.iter().map(|attribute| attribute.name).collect()
    }

    fn target<'v>(&self, value: &'v Value) -> Result<&'v T, Error> {
        value
            .downcast_ref::<T>()
            .ok_or_else(|| mismatch(self.name, value))
    }

    fn find(&self, name: &str) -> Option<&Attribute<T>> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }
}

impl<T: HostObject> Extractor for Simplifier<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn shape(&self, value: &Value, _max_entries: usize) -> Result<Shape, Error> {
        let target = self.target(value)?;
        let entries: Vec<(String, Result<Value, Error>)> = self
            .attributes
            .iter()
            .map(|attribute| (attribute.name.to_string(), (attribute.read)(target)))
            .collect();
        let total = entries.len();
        Ok(Shape::Record { entries, total })
    }

    fn child(&self, value: &Value, segment: &str) -> Result<Option<Value>, Error> {
        let target = self.target(value)?;
        match self.find(segment) {
            Some(attribute) => (attribute.read)(target).map(Some),
            None => Ok(None),
        }
    }

    fn supports_write(&self) -> bool {
        self.attributes.iter().any(|attribute| attribute.write.is_some())
    }

    fn write(&self, value: &Value, segment: &str, new: Value) -> Result<Value, Error> {
        let target = self.target(value)?;
        let Some(attribute) = self.find(segment) else {
            return Err(Error::new(ErrorKind::PathNotFound).with_message(format!(
                "{} has no attribute `{segment}`; available: {}",
                self.name,
                self.attribute_names().join(", ")
            )));
        };
        let Some(write) = &attribute.write else {
            return Err(Error::new(ErrorKind::ReadOnlyPath)
                .with_message(format!("attribute `{segment}` of {} is read-only", self.name)));
        };
        let rebuilt = write(target, new)?;
        Ok(Value::object(rebuilt))
    }
}

#[cfg(test)]
mod tests {
    use super::Simplifier;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::extract::{Extractor, Shape};
    use crate::core::value::Value;
    use std::time::Duration;

    fn seconds_only() -> Simplifier<Duration> {
        Simplifier::new("seconds")
            .writable_attribute(
                "secs",
                |d: &Duration| Ok(Value::UInt(d.as_secs())),
                |_d: &Duration, new: Value| match new {
                    Value::UInt(secs) => Ok(Duration::from_secs(secs)),
                    Value::Int(secs) if secs >= 0 => Ok(Duration::from_secs(secs as u64)),
                    other => Err(Error::new(ErrorKind::Conversion)
                        .with_message(format!("expected seconds, got {}", other.type_name()))),
                },
            )
            .attribute("nanos", |d: &Duration| Ok(Value::UInt(u64::from(d.subsec_nanos()))))
    }

    #[test]
    fn shape_reads_every_attribute() {
        let value = Value::object(Duration::new(3, 5));
        let Shape::Record { entries, total } = seconds_only().shape(&value, 1).expect("shape") else {
            panic!("expected record");
        };
        assert_eq!(total, 2);
        assert_eq!(entries[0].0, "secs");
        assert_eq!(entries[1].1.as_ref().expect("nanos"), &Value::UInt(5));
    }

    #[test]
    fn unknown_attribute_is_not_found() {
        let value = Value::object(Duration::new(3, 5));
        assert_eq!(seconds_only().child(&value, "weeks").expect("child"), None);
    }

    #[test]
    fn write_rebuilds_and_guards_read_only_attributes() {
        let simplifier = seconds_only();
        assert!(simplifier.supports_write());
        let value = Value::object(Duration::new(3, 5));
        let rebuilt = simplifier.write(&value, "secs", Value::UInt(9)).expect("write");
        assert!(!rebuilt.same_identity(&value));
        assert_eq!(rebuilt.downcast_ref::<Duration>(), Some(&Duration::from_secs(9)));
        assert_eq!(
            simplifier.write(&value, "nanos", Value::UInt(1)).unwrap_err().kind(),
            ErrorKind::ReadOnlyPath
        );
    }

    #[test]
    fn dispatch_on_wrong_type_is_internal_error() {
        let err = seconds_only().shape(&Value::Int(1), 10).err().expect("error");
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
