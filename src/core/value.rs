//! Purpose: Runtime object model the engine walks: scalars, shared containers, host objects.
//! Exports: `Value`, `ListRef`, `MapRef`, `HostObject`, `Bean`, `PropertyBean`, `StructuredValue`.
//! Role: Inbound side of the engine; everything the serializer reads is a `Value`.
//! Invariants: Containers and objects have reference identity (their `Arc` pointer).
//! Invariants: Containers are interior-mutable so graphs may be cyclic and written in place.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Number;

use crate::core::error::{Error, ErrorKind};

/// JSON-like output tree. Records keep insertion order; numbers keep their full text.
pub type StructuredValue = serde_json::Value;

pub type ListRef = Arc<RwLock<Vec<Value>>>;
pub type MapRef = Arc<RwLock<Vec<(Value, Value)>>>;

/// A typed host object dispatched by the registry on its concrete `TypeId`.
pub trait HostObject: Any + Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    /// Accessor view used by the generic bean fallback.
    fn as_bean(&self) -> Option<&dyn Bean> {
        None
    }

    /// Text stand-in when no structure can be extracted.
    fn describe(&self) -> String {
        format!("{self:?}")
    }

    fn dyn_eq(&self, _other: &dyn HostObject) -> bool {
        false
    }
}

/// Named-property contract of objects without a dedicated extractor.
pub trait Bean: Send + Sync {
    fn property_names(&self) -> Vec<String>;

    /// `Ok(None)` when `name` is not a property of this bean.
    fn get_property(&self, name: &str) -> Result<Option<Value>, Error>;

    fn is_writable(&self, _name: &str) -> bool {
        false
    }

    /// Replaces a property and returns the previous value.
    fn set_property(&self, name: &str, _value: Value) -> Result<Value, Error> {
        Err(Error::new(ErrorKind::ReadOnlyPath)
            .with_message(format!("property `{name}` is read-only")))
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Number),
    Char(char),
    Text(String),
    List(ListRef),
    Map(MapRef),
    Object(Arc<dyn HostObject>),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Arc::new(RwLock::new(items)))
    }

    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Self::Map(Arc::new(RwLock::new(entries)))
    }

    /// Map with text keys, the common shape of decoded documents.
    pub fn record<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::map(
            entries
                .into_iter()
                .map(|(key, value)| (Value::Text(key.into()), value))
                .collect(),
        )
    }

    pub fn object<T: HostObject>(object: T) -> Self {
        Self::Object(Arc::new(object))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_) | Self::Object(_))
    }

    /// Pointer identity of containers and objects; scalars have none.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Self::List(list) => Some(Arc::as_ptr(list) as *const () as usize),
            Self::Map(map) => Some(Arc::as_ptr(map) as *const () as usize),
            Self::Object(object) => Some(Arc::as_ptr(object) as *const () as usize),
            _ => None,
        }
    }

    pub fn same_identity(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "i64",
            Self::UInt(_) => "u64",
            Self::Float(_) => "f64",
            Self::Decimal(_) => "decimal",
            Self::Char(_) => "char",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Object(object) => object.type_name(),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Object(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Structured form of a scalar; `None` for containers and objects.
    /// Non-finite floats become `Null`.
    pub fn scalar_to_structured(&self) -> Option<StructuredValue> {
        let value = match self {
            Self::Null => StructuredValue::Null,
            Self::Bool(value) => StructuredValue::Bool(*value),
            Self::Int(value) => StructuredValue::Number(Number::from(*value)),
            Self::UInt(value) => StructuredValue::Number(Number::from(*value)),
            Self::Float(value) => Number::from_f64(*value)
                .map(StructuredValue::Number)
                .unwrap_or(StructuredValue::Null),
            Self::Decimal(value) => StructuredValue::Number(value.clone()),
            Self::Char(value) => StructuredValue::String(value.to_string()),
            Self::Text(value) => StructuredValue::String(value.clone()),
            Self::List(_) | Self::Map(_) | Self::Object(_) => return None,
        };
        Some(value)
    }

    /// Builds a fresh runtime graph (maps and lists) from a structured value.
    pub fn from_structured(value: &StructuredValue) -> Self {
        match value {
            StructuredValue::Null => Self::Null,
            StructuredValue::Bool(value) => Self::Bool(*value),
            StructuredValue::Number(number) => number_to_value(number),
            StructuredValue::String(text) => Self::Text(text.clone()),
            StructuredValue::Array(items) => {
                Self::list(items.iter().map(Self::from_structured).collect())
            }
            StructuredValue::Object(entries) => Self::map(
                entries
                    .iter()
                    .map(|(key, value)| (Self::Text(key.clone()), Self::from_structured(value)))
                    .collect(),
            ),
        }
    }
}

/// Integers that fit stay integral, floats that print back identically become
/// `Float`, anything else keeps its exact text as `Decimal`.
pub(crate) fn number_to_value(number: &Number) -> Value {
    if let Some(value) = number.as_i64() {
        return Value::Int(value);
    }
    if let Some(value) = number.as_u64() {
        return Value::UInt(value);
    }
    let text = number.to_string();
    if let Ok(float) = text.parse::<f64>() {
        if let Some(exact) = Number::from_f64(float) {
            if exact.to_string() == text {
                return Value::Float(float);
            }
        }
    }
    Value::Decimal(number.clone())
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Containers print shallowly so cyclic graphs can be debugged.
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(value) => write!(f, "Bool({value})"),
            Self::Int(value) => write!(f, "Int({value})"),
            Self::UInt(value) => write!(f, "UInt({value})"),
            Self::Float(value) => write!(f, "Float({value})"),
            Self::Decimal(value) => write!(f, "Decimal({value})"),
            Self::Char(value) => write!(f, "Char({value:?})"),
            Self::Text(value) => write!(f, "Text({value:?})"),
            Self::List(list) => write!(f, "List(len={})", list.read().len()),
            Self::Map(map) => write!(f, "Map(len={})", map.read().len()),
            Self::Object(object) => write!(f, "Object({})", object.type_name()),
        }
    }
}

/// Scalars compare by value, containers by identity then contents, objects by
/// identity then `HostObject::dyn_eq`. Distinct cyclic graphs must not be compared.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.same_identity(other) {
            return true;
        }
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::List(a), Self::List(b)) => *a.read() == *b.read(),
            (Self::Map(a), Self::Map(b)) => *a.read() == *b.read(),
            (Self::Object(a), Self::Object(b)) => a.dyn_eq(b.as_ref()),
            _ => false,
        }
    }
}

impl<T: HostObject> From<Arc<T>> for Value {
    fn from(object: Arc<T>) -> Self {
        Self::Object(object)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

type Getter = Arc<dyn Fn() -> Result<Value, Error> + Send + Sync>;

enum Property {
    Stored { value: Value, writable: bool },
    Computed(Getter),
}

/// Dynamic bean whose properties are stored values or fallible getters.
pub struct PropertyBean {
    type_name: String,
    properties: RwLock<Vec<(String, Property)>>,
}

impl PropertyBean {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: RwLock::new(Vec::new()),
        }
    }

    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(name, value.into(), true);
        self
    }

    pub fn with_read_only(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(name, value.into(), false);
        self
    }

    pub fn with_getter<F>(self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn() -> Result<Value, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut properties = self.properties.write();
        let getter: Getter = Arc::new(getter);
        match properties.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = Property::Computed(getter),
            None => properties.push((name, Property::Computed(getter))),
        }
        drop(properties);
        self
    }

    /// Adds or replaces a writable stored property; used to close cycles after construction.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.put(name, value.into(), true);
    }

    fn put(&self, name: impl Into<String>, value: Value, writable: bool) {
        let name = name.into();
        let mut properties = self.properties.write();
        let property = Property::Stored { value, writable };
        match properties.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = property,
            None => properties.push((name, property)),
        }
    }
}

impl fmt::Debug for PropertyBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBean")
            .field("type_name", &self.type_name)
            .field("properties", &self.property_names())
            .finish()
    }
}

impl Bean for PropertyBean {
    fn property_names(&self) -> Vec<String> {
        self.properties
            .read()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn get_property(&self, name: &str) -> Result<Option<Value>, Error> {
        // Getters run without the lock held so they may read this bean.
        let getter = {
            let properties = self.properties.read();
            match properties.iter().find(|(key, _)| key == name) {
                None => return Ok(None),
                Some((_, Property::Stored { value, .. })) => return Ok(Some(value.clone())),
                Some((_, Property::Computed(getter))) => getter.clone(),
            }
        };
        getter().map(Some)
    }

    fn is_writable(&self, name: &str) -> bool {
        self.properties
            .read()
            .iter()
            .any(|(key, property)| key == name && matches!(property, Property::Stored { writable: true, .. }))
    }

    fn set_property(&self, name: &str, value: Value) -> Result<Value, Error> {
        let mut properties = self.properties.write();
        match properties.iter_mut().find(|(key, _)| key == name) {
            Some((_, Property::Stored { value: slot, writable: true })) => {
                Ok(std::mem::replace(slot, value))
            }
            Some(_) => Err(Error::new(ErrorKind::ReadOnlyPath)
                .with_message(format!("property `{name}` is read-only"))),
            None => Err(Error::new(ErrorKind::PathNotFound)
                .with_message(format!("no property `{name}` on {}", self.type_name))),
        }
    }
}

impl HostObject for PropertyBean {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_bean(&self) -> Option<&dyn Bean> {
        Some(self)
    }

    fn describe(&self) -> String {
        self.type_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{Bean, PropertyBean, StructuredValue, Value};
    use crate::core::error::{Error, ErrorKind};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn from_structured_keeps_number_precision() {
        let doc: StructuredValue =
            serde_json::from_str(r#"{"i":-3,"u":18446744073709551615,"f":1.5,"big":1.00000000000000000001}"#)
                .expect("json");
        let value = Value::from_structured(&doc);
        let Value::Map(map) = value else {
            panic!("expected map");
        };
        let entries = map.read();
        assert_eq!(entries[0].1, Value::Int(-3));
        assert_eq!(entries[1].1, Value::UInt(u64::MAX));
        assert_eq!(entries[2].1, Value::Float(1.5));
        assert!(matches!(&entries[3].1, Value::Decimal(n) if n.to_string() == "1.00000000000000000001"));
    }

    #[test]
    fn non_finite_float_is_null() {
        assert_eq!(
            Value::Float(f64::NAN).scalar_to_structured(),
            Some(StructuredValue::Null)
        );
        assert_eq!(
            Value::Float(f64::INFINITY).scalar_to_structured(),
            Some(StructuredValue::Null)
        );
        assert_eq!(Value::Char('x').scalar_to_structured(), Some(json!("x")));
        assert_eq!(Value::list(vec![]).scalar_to_structured(), None);
    }

    #[test]
    fn identity_distinguishes_clones_from_copies() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        let copy = Value::list(vec![Value::Int(1)]);
        assert!(list.same_identity(&alias));
        assert!(!list.same_identity(&copy));
        assert_eq!(list, copy);
        assert_eq!(Value::Int(1).identity(), None);
    }

    #[test]
    fn property_bean_reads_writes_and_guards() {
        let bean = PropertyBean::new("Widget")
            .with("size", 3)
            .with_read_only("id", "w-1")
            .with_getter("broken", || {
                Err(Error::new(ErrorKind::Access).with_message("sensor offline"))
            });
        assert_eq!(bean.property_names(), vec!["size", "id", "broken"]);
        assert_eq!(bean.get_property("size").expect("read"), Some(Value::Int(3)));
        assert_eq!(bean.get_property("missing").expect("read"), None);
        assert_eq!(
            bean.get_property("broken").unwrap_err().kind(),
            ErrorKind::Access
        );

        assert!(bean.is_writable("size"));
        assert!(!bean.is_writable("id"));
        let previous = bean.set_property("size", Value::Int(4)).expect("write");
        assert_eq!(previous, Value::Int(3));
        assert_eq!(
            bean.set_property("id", Value::Null).unwrap_err().kind(),
            ErrorKind::ReadOnlyPath
        );
    }

    #[test]
    fn beans_can_form_cycles() {
        let a = Arc::new(PropertyBean::new("A"));
        let b = Arc::new(PropertyBean::new("B").with("a", Value::from(a.clone())));
        a.insert("b", Value::from(b.clone()));
        let back = b.get_property("a").expect("read").expect("present");
        assert!(back.same_identity(&Value::from(a)));
    }
}
