//! Purpose: Backward direction: turn raw text or structured input into a typed runtime `Value`.
//! Exports: `Converter`, `ConversionTarget`, `ScalarKind`, `Input`, sentinel constants.
//! Role: Used by write-back and the CLI `convert` command; inverse of the forward codec.
//! Invariants: A non-null input never converts to `Null`; `[null]` is the only null text.
//! Invariants: Parsing is locale-independent; integers reject overflow; floats must be finite.
//! Notes: Text arrays split on the separator without escaping (a known limitation).
use std::collections::HashMap;
use std::fmt;
use std::num::{IntErrorKind, ParseIntError};
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Number;

use crate::core::error::{Error, ErrorKind};
use crate::core::extract::simplifiers;
use crate::core::value::{StructuredValue, Value};
use crate::json::parse;

pub const NULL_SENTINEL: &str = "[null]";
pub const EMPTY_SENTINEL: &str = "\"\"";
pub const DEFAULT_ARRAY_SEPARATOR: &str = ",";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Char,
    Text,
}

const SCALAR_KINDS: [ScalarKind; 14] = [
    ScalarKind::Bool,
    ScalarKind::I8,
    ScalarKind::I16,
    ScalarKind::I32,
    ScalarKind::I64,
    ScalarKind::U8,
    ScalarKind::U16,
    ScalarKind::U32,
    ScalarKind::U64,
    ScalarKind::F32,
    ScalarKind::F64,
    ScalarKind::Decimal,
    ScalarKind::Char,
    ScalarKind::Text,
];

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Decimal => "decimal",
            Self::Char => "char",
            Self::Text => "text",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        SCALAR_KINDS.into_iter().find(|kind| kind.name() == name)
    }

    /// Kind a runtime scalar naturally converts back to.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(_) => Some(Self::Bool),
            Value::Int(_) => Some(Self::I64),
            Value::UInt(_) => Some(Self::U64),
            Value::Float(_) => Some(Self::F64),
            Value::Decimal(_) => Some(Self::Decimal),
            Value::Char(_) => Some(Self::Char),
            Value::Text(_) => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConversionTarget {
    Scalar(ScalarKind),
    Array(Box<ConversionTarget>),
    Named(String),
    Dynamic,
}

impl ConversionTarget {
    pub fn array(element: ConversionTarget) -> Self {
        Self::Array(Box::new(element))
    }

    /// Target that rebuilds a value of the same kind as `value`.
    pub fn of(value: &Value) -> Self {
        if let Some(kind) = ScalarKind::of(value) {
            return Self::Scalar(kind);
        }
        match value {
            Value::List(list) => {
                let items = list.read();
                let mut kinds = items.iter().map(ScalarKind::of);
                let element = match kinds.next() {
                    Some(Some(first)) if kinds.all(|kind| kind == Some(first)) => {
                        Self::Scalar(first)
                    }
                    _ => Self::Dynamic,
                };
                Self::array(element)
            }
            Value::Object(object) => Self::Named(object.type_name().to_string()),
            _ => Self::Dynamic,
        }
    }

    /// Parses a descriptor such as `i32`, `array<i64>`, `named:url` or `dynamic`.
    pub fn parse(descriptor: &str) -> Result<Self, Error> {
        let descriptor = descriptor.trim();
        if descriptor == "dynamic" {
            return Ok(Self::Dynamic);
        }
        if let Some(inner) = descriptor
            .strip_prefix("array<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return Ok(Self::array(Self::parse(inner)?));
        }
        if let Some(name) = descriptor.strip_prefix("named:") {
            if name.is_empty() {
                return Err(bad_descriptor(descriptor));
            }
            return Ok(Self::Named(name.to_string()));
        }
        ScalarKind::from_name(descriptor)
            .map(Self::Scalar)
            .ok_or_else(|| bad_descriptor(descriptor))
    }

    fn is_textual(&self) -> bool {
        matches!(self, Self::Scalar(ScalarKind::Text) | Self::Dynamic)
    }

    fn is_structural(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => f.write_str(kind.name()),
            Self::Array(element) => write!(f, "array<{element}>"),
            Self::Named(name) => write!(f, "named:{name}"),
            Self::Dynamic => f.write_str("dynamic"),
        }
    }
}

fn bad_descriptor(descriptor: &str) -> Error {
    let scalars: Vec<&str> = SCALAR_KINDS.iter().map(|kind| kind.name()).collect();
    Error::new(ErrorKind::Usage)
        .with_message(format!("unknown conversion target `{descriptor}`"))
        .with_hint(format!(
            "use one of {}, array<T>, named:NAME or dynamic",
            scalars.join(", ")
        ))
}

#[derive(Clone, Copy, Debug)]
pub enum Input<'a> {
    Text(&'a str),
    Structured(&'a StructuredValue),
}

impl Input<'_> {
    fn display(&self) -> String {
        match self {
            Input::Text(text) => (*text).to_string(),
            Input::Structured(value) => value.to_string(),
        }
    }
}

type NamedParser = Arc<dyn Fn(&StructuredValue) -> Result<Value, Error> + Send + Sync>;

pub struct Converter {
    named: HashMap<String, NamedParser>,
    separator: String,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    /// Converter with the built-in named parsers.
    pub fn new() -> Self {
        let mut converter = Self::bare();
        for (name, parser) in simplifiers::named_parsers() {
            converter.register_named(name, parser);
        }
        converter
    }

    pub fn bare() -> Self {
        Self {
            named: HashMap::new(),
            separator: DEFAULT_ARRAY_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Registers a parser for `named:<name>`; a later registration replaces an earlier one.
    pub fn register_named<F>(&mut self, name: impl Into<String>, parser: F)
    where
        F: Fn(&StructuredValue) -> Result<Value, Error> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(target_name = %name, "registered named parser");
        self.named.insert(name, Arc::new(parser));
    }

    pub fn named_targets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.named.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn convert(&self, target: &ConversionTarget, input: Input<'_>) -> Result<Value, Error> {
        match input {
            Input::Text(NULL_SENTINEL) => return Ok(Value::Null),
            Input::Text(EMPTY_SENTINEL) => {
                if target.is_textual() {
                    return Ok(Value::text(""));
                }
                return Err(Error::new(ErrorKind::UnsupportedConversion)
                    .with_message("the empty-string sentinel only converts to text targets")
                    .with_target(target.to_string())
                    .with_input(EMPTY_SENTINEL));
            }
            Input::Structured(StructuredValue::Null) => return Ok(Value::Null),
            _ => {}
        }
        match target {
            ConversionTarget::Scalar(kind) => convert_scalar(*kind, input),
            ConversionTarget::Array(element) => self.convert_array(target, element, input),
            ConversionTarget::Named(name) => self.convert_named(name, input),
            ConversionTarget::Dynamic => match input {
                Input::Text(text) => {
                    let parsed = parse::structured(text, "dynamic")?;
                    Ok(Value::from_structured(&parsed))
                }
                Input::Structured(value) => Ok(Value::from_structured(value)),
            },
        }
    }

    fn convert_array(
        &self,
        target: &ConversionTarget,
        element: &ConversionTarget,
        input: Input<'_>,
    ) -> Result<Value, Error> {
        let items = match input {
            Input::Structured(StructuredValue::Array(items)) => items
                .iter()
                .map(|item| self.convert(element, Input::Structured(item)))
                .collect::<Result<Vec<_>, _>>()?,
            Input::Structured(StructuredValue::String(text)) => {
                return self.convert_array(target, element, Input::Text(text));
            }
            Input::Structured(other) => {
                return Err(invalid(target, &other.to_string(), "expected an array"));
            }
            Input::Text(text) if element.is_structural() => {
                let StructuredValue::Array(items) = parse::structured(text, &target.to_string())?
                else {
                    return Err(invalid(target, text, "expected a JSON array"));
                };
                items
                    .iter()
                    .map(|item| self.convert(element, Input::Structured(item)))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Input::Text("") => Vec::new(),
            Input::Text(text) => text
                .split(self.separator.as_str())
                .map(|part| self.convert(element, Input::Text(part)))
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(Value::list(items))
    }

    fn convert_named(&self, name: &str, input: Input<'_>) -> Result<Value, Error> {
        let Some(parser) = self.named.get(name) else {
            return Err(Error::new(ErrorKind::UnsupportedConversion)
                .with_message(format!("no parser registered for `{name}`"))
                .with_hint(format!("known named targets: {}", self.named_targets().join(", ")))
                .with_target(format!("named:{name}"))
                .with_input(input.display()));
        };
        match input {
            Input::Text(text) => parser(&StructuredValue::String(text.to_string())),
            Input::Structured(value) => parser(value),
        }
    }
}

fn invalid(target: &ConversionTarget, input: &str, message: &str) -> Error {
    Error::new(ErrorKind::Conversion)
        .with_message(message.to_string())
        .with_target(target.to_string())
        .with_input(input)
}

fn convert_scalar(kind: ScalarKind, input: Input<'_>) -> Result<Value, Error> {
    let target = ConversionTarget::Scalar(kind);
    let text = match input {
        Input::Text(text) => text,
        Input::Structured(StructuredValue::String(text)) => text.as_str(),
        Input::Structured(StructuredValue::Bool(value)) => {
            return match kind {
                ScalarKind::Bool => Ok(Value::Bool(*value)),
                ScalarKind::Text => Ok(Value::Text(value.to_string())),
                _ => Err(invalid(&target, &value.to_string(), "expected a number or text")),
            };
        }
        Input::Structured(StructuredValue::Number(number)) => {
            return convert_number(kind, number);
        }
        Input::Structured(other) => {
            return Err(invalid(&target, &other.to_string(), "expected a scalar"));
        }
    };
    parse_scalar(kind, text)
}

fn convert_number(kind: ScalarKind, number: &Number) -> Result<Value, Error> {
    match kind {
        ScalarKind::Bool | ScalarKind::Char => Err(invalid(
            &ConversionTarget::Scalar(kind),
            &number.to_string(),
            "expected text",
        )),
        ScalarKind::Text => Ok(Value::Text(number.to_string())),
        ScalarKind::Decimal => Ok(Value::Decimal(number.clone())),
        _ => parse_scalar(kind, &number.to_string()),
    }
}

fn parse_scalar(kind: ScalarKind, text: &str) -> Result<Value, Error> {
    let target = ConversionTarget::Scalar(kind);
    let fail = |message: &str| invalid(&target, text, message);
    let value = match kind {
        ScalarKind::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if text.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(fail("expected `true` or `false`"));
            }
        }
        ScalarKind::I8 => Value::Int(i64::from(parse_int::<i8>(text, &fail)?)),
        ScalarKind::I16 => Value::Int(i64::from(parse_int::<i16>(text, &fail)?)),
        ScalarKind::I32 => Value::Int(i64::from(parse_int::<i32>(text, &fail)?)),
        ScalarKind::I64 => Value::Int(parse_int::<i64>(text, &fail)?),
        ScalarKind::U8 => Value::UInt(u64::from(parse_int::<u8>(text, &fail)?)),
        ScalarKind::U16 => Value::UInt(u64::from(parse_int::<u16>(text, &fail)?)),
        ScalarKind::U32 => Value::UInt(u64::from(parse_int::<u32>(text, &fail)?)),
        ScalarKind::U64 => Value::UInt(parse_int::<u64>(text, &fail)?),
        ScalarKind::F32 => {
            let value: f32 = text.parse().map_err(|_| fail("expected a decimal number"))?;
            if !value.is_finite() {
                return Err(fail("non-finite numbers are not accepted"));
            }
            Value::Float(f64::from(value))
        }
        ScalarKind::F64 => {
            let value: f64 = text.parse().map_err(|_| fail("expected a decimal number"))?;
            if !value.is_finite() {
                return Err(fail("non-finite numbers are not accepted"));
            }
            Value::Float(value)
        }
        ScalarKind::Decimal => {
            let number: Number = parse::from_str(text).map_err(|_| fail("expected a decimal number"))?;
            Value::Decimal(number)
        }
        ScalarKind::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Value::Char(ch),
                _ => return Err(fail("expected exactly one character")),
            }
        }
        ScalarKind::Text => Value::text(text),
    };
    Ok(value)
}

fn parse_int<T>(text: &str, fail: &dyn Fn(&str) -> Error) -> Result<T, Error>
where
    T: FromStr<Err = ParseIntError>,
{
    text.parse::<T>().map_err(|err| {
        let overflow = matches!(
            err.kind(),
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
        );
        let message = if overflow {
            "integer out of range"
        } else {
            "expected an integer"
        };
        fail(message).with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::{ConversionTarget, Converter, Input, ScalarKind};
    use crate::core::error::ErrorKind;
    use crate::core::value::Value;
    use serde_json::json;
    use std::net::IpAddr;

    fn convert(target: &str, text: &str) -> Result<Value, crate::core::error::Error> {
        let target = ConversionTarget::parse(target).expect("target");
        Converter::new().convert(&target, Input::Text(text))
    }

    #[test]
    fn descriptors_parse_and_display() {
        for descriptor in ["i32", "array<i64>", "array<array<text>>", "named:url", "dynamic"] {
            let target = ConversionTarget::parse(descriptor).expect("parse");
            assert_eq!(target.to_string(), descriptor);
        }
        let err = ConversionTarget::parse("int").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.hint().is_some());
    }

    #[test]
    fn sentinels_map_to_null_and_empty_text() {
        assert_eq!(convert("i32", "[null]").expect("null"), Value::Null);
        assert_eq!(convert("named:url", "[null]").expect("null"), Value::Null);
        assert_eq!(convert("text", "\"\"").expect("empty"), Value::text(""));
        assert_eq!(convert("dynamic", "\"\"").expect("empty"), Value::text(""));
        assert_eq!(
            convert("i32", "\"\"").unwrap_err().kind(),
            ErrorKind::UnsupportedConversion
        );
    }

    #[test]
    fn integers_reject_overflow_and_garbage() {
        assert_eq!(convert("i8", "-128").expect("i8"), Value::Int(-128));
        let err = convert("i8", "128").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert_eq!(err.target(), Some("i8"));
        assert_eq!(err.input(), Some("128"));
        assert!(convert("u32", "-1").is_err());
        assert!(convert("i64", "1.5").is_err());
        assert_eq!(convert("u64", "18446744073709551615").expect("u64"), Value::UInt(u64::MAX));
    }

    #[test]
    fn floats_bools_and_chars() {
        assert_eq!(convert("f64", "-2.5e3").expect("f64"), Value::Float(-2500.0));
        assert!(convert("f64", "NaN").is_err());
        assert!(convert("f32", "1e39").is_err());
        assert_eq!(convert("bool", "TRUE").expect("bool"), Value::Bool(true));
        assert!(convert("bool", "yes").is_err());
        assert_eq!(convert("char", "é").expect("char"), Value::Char('é'));
        assert!(convert("char", "ab").is_err());
    }

    #[test]
    fn decimal_keeps_exact_text() {
        let value = convert("decimal", "1.00000000000000000001").expect("decimal");
        assert!(matches!(value, Value::Decimal(n) if n.to_string() == "1.00000000000000000001"));
    }

    #[test]
    fn text_arrays_split_naively() {
        assert_eq!(
            convert("array<i32>", "1,2,3").expect("array"),
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(convert("array<i32>", "").expect("empty"), Value::list(vec![]));
        // Separators inside element text are not escaped.
        assert_eq!(
            convert("array<text>", "a\\,b").expect("array"),
            Value::list(vec![Value::text("a\\"), Value::text("b")])
        );
        assert!(convert("array<i32>", "1,x").is_err());
    }

    #[test]
    fn structural_array_elements_parse_json() {
        assert_eq!(
            convert("array<array<i32>>", "[[1],[2,3]]").expect("nested"),
            Value::list(vec![
                Value::list(vec![Value::Int(1)]),
                Value::list(vec![Value::Int(2), Value::Int(3)]),
            ])
        );
        assert!(convert("array<dynamic>", "{\"a\":1}").is_err());
    }

    #[test]
    fn structured_input_converts_directly() {
        let converter = Converter::new();
        let target = ConversionTarget::array(ConversionTarget::Scalar(ScalarKind::U8));
        let value = converter
            .convert(&target, Input::Structured(&json!([1, "2"])))
            .expect("structured");
        assert_eq!(value, Value::list(vec![Value::UInt(1), Value::UInt(2)]));
        assert!(
            converter
                .convert(&target, Input::Structured(&json!({"a": 1})))
                .is_err()
        );
    }

    #[test]
    fn named_targets_use_registered_parsers() {
        let ip = convert("named:ip_addr", "::1").expect("ip");
        assert_eq!(ip.downcast_ref::<IpAddr>().map(|ip| ip.is_loopback()), Some(true));
        let err = convert("named:color", "red").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
    }

    #[test]
    fn dynamic_text_builds_runtime_graph() {
        let value = convert("dynamic", r#"{"a":[1,"x"]}"#).expect("dynamic");
        assert_eq!(value, Value::from_structured(&json!({"a": [1, "x"]})));
        assert_eq!(convert("dynamic", "not json").unwrap_err().kind(), ErrorKind::Conversion);
    }

    #[test]
    fn target_of_existing_values() {
        assert_eq!(
            ConversionTarget::of(&Value::Int(1)),
            ConversionTarget::Scalar(ScalarKind::I64)
        );
        assert_eq!(
            ConversionTarget::of(&Value::list(vec![Value::Float(1.0), Value::Float(2.0)])),
            ConversionTarget::array(ConversionTarget::Scalar(ScalarKind::F64))
        );
        assert_eq!(
            ConversionTarget::of(&Value::list(vec![Value::Int(1), Value::text("x")])),
            ConversionTarget::array(ConversionTarget::Dynamic)
        );
        let url = Value::object(url::Url::parse("https://a.example/").expect("url"));
        assert_eq!(ConversionTarget::of(&url), ConversionTarget::Named("url".into()));
        assert_eq!(ConversionTarget::of(&Value::map(vec![])), ConversionTarget::Dynamic);
    }
}
