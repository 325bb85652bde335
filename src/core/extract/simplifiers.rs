//! Purpose: Built-in simplifiers for time, path, network and resource-name host types.
//! Exports: `register_defaults`, `named_parsers`, plus `HostObject` impls for the covered types.
//! Role: Default registry content; condenses types that would otherwise be opaque or deep.
//! Invariants: Attribute names are stable; nested host values are handed back, not rendered.
//! Invariants: Filesystem attributes read metadata on demand and fail with `Access`.
use std::any::Any;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

use crate::core::error::{Error, ErrorKind};
use crate::core::extract::simplify::Simplifier;
use crate::core::name::ResourceName;
use crate::core::registry::Registry;
use crate::core::value::{HostObject, StructuredValue, Value};

macro_rules! host_object {
    ($ty:ty, $name:literal, |$this:ident| $describe:expr) => {
        impl HostObject for $ty {
            fn type_name(&self) -> &str {
                $name
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn describe(&self) -> String {
                let $this = self;
                $describe
            }

            fn dyn_eq(&self, other: &dyn HostObject) -> bool {
                other
                    .as_any()
                    .downcast_ref::<$ty>()
                    .is_some_and(|other| other == self)
            }
        }
    };
}

host_object!(OffsetDateTime, "datetime", |this| this
    .format(&Rfc3339)
    .unwrap_or_else(|_| format!("{this:?}")));
host_object!(Duration, "duration", |this| format!("{this:?}"));
host_object!(PathBuf, "path", |this| this.display().to_string());
host_object!(Url, "url", |this| this.to_string());
host_object!(SocketAddr, "socket_addr", |this| this.to_string());
host_object!(IpAddr, "ip_addr", |this| this.to_string());
host_object!(ResourceName, "resource_name", |this| this.to_string());

pub fn register_defaults(registry: &Registry) {
    registry.register::<OffsetDateTime>(datetime_simplifier());
    registry.register::<Duration>(duration_simplifier());
    registry.register::<PathBuf>(path_simplifier());
    registry.register::<Url>(url_simplifier());
    registry.register::<SocketAddr>(socket_addr_simplifier());
    registry.register::<IpAddr>(ip_addr_simplifier());
    registry.register::<ResourceName>(resource_name_simplifier());
}

fn datetime_simplifier() -> Simplifier<OffsetDateTime> {
    Simplifier::new("datetime")
        .writable_attribute(
            "iso8601",
            |dt: &OffsetDateTime| format_rfc3339(dt).map(Value::Text),
            |_dt: &OffsetDateTime, new: Value| parse_rfc3339(&expect_text(&new, "iso8601")?),
        )
        .writable_attribute(
            "unix_timestamp",
            |dt: &OffsetDateTime| Ok(Value::Int(dt.unix_timestamp())),
            |dt: &OffsetDateTime, new: Value| {
                let seconds = expect_i64(&new, "unix_timestamp")?;
                Ok(from_unix(seconds)?.to_offset(dt.offset()))
            },
        )
        .attribute("year", |dt: &OffsetDateTime| Ok(Value::Int(i64::from(dt.year()))))
        .attribute("month", |dt: &OffsetDateTime| {
            Ok(Value::UInt(u64::from(u8::from(dt.month()))))
        })
        .attribute("day", |dt: &OffsetDateTime| Ok(Value::UInt(u64::from(dt.day()))))
        .attribute("hour", |dt: &OffsetDateTime| Ok(Value::UInt(u64::from(dt.hour()))))
        .attribute("minute", |dt: &OffsetDateTime| Ok(Value::UInt(u64::from(dt.minute()))))
        .attribute("second", |dt: &OffsetDateTime| Ok(Value::UInt(u64::from(dt.second()))))
        .attribute("offset_seconds", |dt: &OffsetDateTime| {
            Ok(Value::Int(i64::from(dt.offset().whole_seconds())))
        })
}

fn duration_simplifier() -> Simplifier<Duration> {
    Simplifier::new("duration")
        .writable_attribute(
            "seconds",
            |d: &Duration| Ok(Value::UInt(d.as_secs())),
            |d: &Duration, new: Value| {
                Ok(Duration::new(expect_u64(&new, "seconds")?, d.subsec_nanos()))
            },
        )
        .attribute("nanos", |d: &Duration| Ok(Value::UInt(u64::from(d.subsec_nanos()))))
        .writable_attribute(
            "millis",
            |d: &Duration| Ok(Value::UInt(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))),
            |_d: &Duration, new: Value| Ok(Duration::from_millis(expect_u64(&new, "millis")?)),
        )
}

fn path_simplifier() -> Simplifier<PathBuf> {
    Simplifier::new("path")
        .attribute("path", |p: &PathBuf| Ok(Value::Text(p.display().to_string())))
        .attribute("name", |p: &PathBuf| {
            Ok(optional_text(p.file_name().map(|n| n.to_string_lossy())))
        })
        .attribute("parent", |p: &PathBuf| {
            Ok(optional_text(p.parent().map(|n| n.display().to_string().into())))
        })
        .attribute("absolute", |p: &PathBuf| Ok(Value::Bool(p.is_absolute())))
        .attribute("exists", |p: &PathBuf| Ok(Value::Bool(p.exists())))
        .attribute("directory", |p: &PathBuf| Ok(Value::Bool(metadata(p)?.is_dir())))
        .attribute("length", |p: &PathBuf| Ok(Value::UInt(metadata(p)?.len())))
        .attribute("modified", |p: &PathBuf| {
            let modified = metadata(p)?.modified().map_err(|err| {
                Error::new(ErrorKind::Access)
                    .with_message("modification time unavailable")
                    .with_source(err)
            })?;
            Ok(Value::object(system_time_to_datetime(modified)?))
        })
}

fn url_simplifier() -> Simplifier<Url> {
    Simplifier::new("url")
        .attribute("url", |u: &Url| Ok(Value::Text(u.to_string())))
        .attribute("scheme", |u: &Url| Ok(Value::text(u.scheme())))
        .attribute("host", |u: &Url| Ok(optional_text(u.host_str().map(Into::into))))
        .attribute("port", |u: &Url| {
            Ok(u.port_or_known_default()
                .map(|port| Value::UInt(u64::from(port)))
                .unwrap_or(Value::Null))
        })
        .attribute("path", |u: &Url| Ok(Value::text(u.path())))
        .attribute("query", |u: &Url| Ok(optional_text(u.query().map(Into::into))))
}

fn socket_addr_simplifier() -> Simplifier<SocketAddr> {
    Simplifier::new("socket_addr")
        .attribute("ip", |a: &SocketAddr| Ok(Value::object(a.ip())))
        .writable_attribute(
            "port",
            |a: &SocketAddr| Ok(Value::UInt(u64::from(a.port()))),
            |a: &SocketAddr, new: Value| {
                let port = expect_u64(&new, "port")?;
                let port = u16::try_from(port).map_err(|_| {
                    Error::new(ErrorKind::Conversion)
                        .with_message(format!("port {port} is out of range"))
                        .with_target("u16")
                })?;
                Ok(SocketAddr::new(a.ip(), port))
            },
        )
        .attribute("ipv6", |a: &SocketAddr| Ok(Value::Bool(a.is_ipv6())))
        .attribute("loopback", |a: &SocketAddr| Ok(Value::Bool(a.ip().is_loopback())))
}

fn ip_addr_simplifier() -> Simplifier<IpAddr> {
    Simplifier::new("ip_addr")
        .attribute("address", |a: &IpAddr| Ok(Value::Text(a.to_string())))
        .attribute("ipv6", |a: &IpAddr| Ok(Value::Bool(a.is_ipv6())))
        .attribute("loopback", |a: &IpAddr| Ok(Value::Bool(a.is_loopback())))
}

fn resource_name_simplifier() -> Simplifier<ResourceName> {
    Simplifier::new("resource_name")
        .attribute("domain", |n: &ResourceName| Ok(Value::text(n.domain())))
        .attribute("properties", |n: &ResourceName| {
            Ok(Value::record(
                n.properties()
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::text(value.as_str()))),
            ))
        })
        .attribute("canonical", |n: &ResourceName| Ok(Value::Text(n.canonical())))
}

pub type NamedParser = fn(&StructuredValue) -> Result<Value, Error>;

/// Parsers for the named conversion targets matching the types above.
pub fn named_parsers() -> Vec<(&'static str, NamedParser)> {
    vec![
        ("datetime", parse_datetime_value as NamedParser),
        ("duration", parse_duration_value),
        ("path", parse_path_value),
        ("url", parse_url_value),
        ("socket_addr", parse_socket_addr_value),
        ("ip_addr", parse_ip_addr_value),
        ("resource_name", parse_resource_name_value),
    ]
}

fn parse_path_value(input: &StructuredValue) -> Result<Value, Error> {
    Ok(Value::object(PathBuf::from(input_text(input, "path")?)))
}

fn parse_socket_addr_value(input: &StructuredValue) -> Result<Value, Error> {
    let text = input_text(input, "socket_addr")?;
    text.parse::<SocketAddr>()
        .map(Value::object)
        .map_err(|err| malformed("socket_addr", &text).with_source(err))
}

fn parse_ip_addr_value(input: &StructuredValue) -> Result<Value, Error> {
    let text = input_text(input, "ip_addr")?;
    text.parse::<IpAddr>()
        .map(Value::object)
        .map_err(|err| malformed("ip_addr", &text).with_source(err))
}

fn parse_resource_name_value(input: &StructuredValue) -> Result<Value, Error> {
    ResourceName::parse(&input_text(input, "resource_name")?).map(Value::object)
}

fn parse_datetime_value(input: &StructuredValue) -> Result<Value, Error> {
    if let StructuredValue::Number(number) = input {
        let seconds = number
            .as_i64()
            .ok_or_else(|| malformed("datetime", &number.to_string()))?;
        return from_unix(seconds).map(Value::object);
    }
    parse_rfc3339(&input_text(input, "datetime")?).map(Value::object)
}

fn parse_duration_value(input: &StructuredValue) -> Result<Value, Error> {
    let text = match input {
        StructuredValue::Number(number) => number.to_string(),
        _ => input_text(input, "duration")?,
    };
    let seconds: f64 = text.parse().map_err(|_| malformed("duration", &text))?;
    Duration::try_from_secs_f64(seconds)
        .map(Value::object)
        .map_err(|err| malformed("duration", &text).with_source(err))
}

fn parse_url_value(input: &StructuredValue) -> Result<Value, Error> {
    let text = input_text(input, "url")?;
    Url::parse(&text)
        .map(Value::object)
        .map_err(|err| malformed("url", &text).with_source(err))
}

fn input_text(input: &StructuredValue, target: &str) -> Result<String, Error> {
    match input {
        StructuredValue::String(text) => Ok(text.clone()),
        other => Err(Error::new(ErrorKind::Conversion)
            .with_message("expected a text value")
            .with_target(target)
            .with_input(other.to_string())),
    }
}

fn malformed(target: &str, input: &str) -> Error {
    Error::new(ErrorKind::Conversion)
        .with_message(format!("cannot parse {target}"))
        .with_target(target)
        .with_input(input)
}

fn format_rfc3339(dt: &OffsetDateTime) -> Result<String, Error> {
    dt.format(&Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Access)
            .with_message("datetime cannot be formatted as RFC 3339")
            .with_source(err)
    })
}

fn parse_rfc3339(text: &str) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::parse(text, &Rfc3339)
        .map_err(|err| malformed("datetime", text).with_source(err))
}

fn from_unix(seconds: i64) -> Result<OffsetDateTime, Error> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|err| malformed("datetime", &seconds.to_string()).with_source(err))
}

fn system_time_to_datetime(time: SystemTime) -> Result<OffsetDateTime, Error> {
    let nanos = match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    };
    OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|err| {
        Error::new(ErrorKind::Access)
            .with_message("timestamp out of range")
            .with_source(err)
    })
}

fn metadata(path: &PathBuf) -> Result<std::fs::Metadata, Error> {
    std::fs::metadata(path).map_err(|err| {
        Error::new(ErrorKind::Access)
            .with_message(format!("cannot read metadata of {}", path.display()))
            .with_source(err)
    })
}

fn optional_text(text: Option<std::borrow::Cow<'_, str>>) -> Value {
    text.map(|text| Value::Text(text.into_owned()))
        .unwrap_or(Value::Null)
}

fn expect_text(value: &Value, attribute: &str) -> Result<String, Error> {
    match value {
        Value::Text(text) => Ok(text.clone()),
        other => Err(wrong_type(attribute, "text", other)),
    }
}

fn expect_i64(value: &Value, attribute: &str) -> Result<i64, Error> {
    match value {
        Value::Int(number) => Ok(*number),
        Value::UInt(number) => i64::try_from(*number).map_err(|_| wrong_type(attribute, "i64", value)),
        other => Err(wrong_type(attribute, "i64", other)),
    }
}

fn expect_u64(value: &Value, attribute: &str) -> Result<u64, Error> {
    match value {
        Value::UInt(number) => Ok(*number),
        Value::Int(number) => u64::try_from(*number).map_err(|_| wrong_type(attribute, "u64", value)),
        other => Err(wrong_type(attribute, "u64", other)),
    }
}

fn wrong_type(attribute: &str, expected: &str, got: &Value) -> Error {
    Error::new(ErrorKind::Conversion)
        .with_message(format!(
            "attribute `{attribute}` expects {expected}, got {}",
            got.type_name()
        ))
        .with_target(expected)
}

#[cfg(test)]
mod tests {
    use super::{named_parsers, register_defaults};
    use crate::core::error::ErrorKind;
    use crate::core::extract::Shape;
    use crate::core::registry::Registry;
    use crate::core::value::{StructuredValue, Value};
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn registry() -> Registry {
        let registry = Registry::empty();
        register_defaults(&registry);
        registry
    }

    fn record_names(value: &Value) -> Vec<String> {
        let extractor = registry().resolve(value);
        match extractor.shape(value, 100).expect("shape") {
            Shape::Record { entries, .. } => entries.into_iter().map(|(name, _)| name).collect(),
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn datetime_exposes_calendar_fields() {
        let dt = OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("dt");
        let value = Value::object(dt);
        let extractor = registry().resolve(&value);
        assert_eq!(extractor.name(), "datetime");
        assert_eq!(
            extractor.child(&value, "iso8601").expect("iso"),
            Some(Value::text("2023-11-14T22:13:20Z"))
        );
        assert_eq!(
            extractor.child(&value, "year").expect("year"),
            Some(Value::Int(2023))
        );
        assert_eq!(record_names(&value).len(), 9);
    }

    #[test]
    fn datetime_write_rebuilds_value() {
        let value = Value::object(OffsetDateTime::UNIX_EPOCH);
        let extractor = registry().resolve(&value);
        let rebuilt = extractor
            .write(&value, "unix_timestamp", Value::Int(60))
            .expect("write");
        assert_eq!(
            rebuilt.downcast_ref::<OffsetDateTime>().map(|dt| dt.unix_timestamp()),
            Some(60)
        );
        assert_eq!(
            extractor.write(&value, "year", Value::Int(1)).unwrap_err().kind(),
            ErrorKind::ReadOnlyPath
        );
    }

    #[test]
    fn missing_file_metadata_is_access_fault() {
        let value = Value::object(PathBuf::from("/definitely/not/here.txt"));
        let extractor = registry().resolve(&value);
        assert_eq!(
            extractor.child(&value, "name").expect("name"),
            Some(Value::text("here.txt"))
        );
        assert_eq!(
            extractor.child(&value, "exists").expect("exists"),
            Some(Value::Bool(false))
        );
        assert_eq!(
            extractor.child(&value, "length").unwrap_err().kind(),
            ErrorKind::Access
        );
    }

    #[test]
    fn existing_file_reports_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("data.bin");
        std::fs::write(&file, b"12345").expect("write");
        let value = Value::object(file);
        let extractor = registry().resolve(&value);
        assert_eq!(
            extractor.child(&value, "length").expect("length"),
            Some(Value::UInt(5))
        );
        let modified = extractor.child(&value, "modified").expect("modified").expect("some");
        assert!(modified.downcast_ref::<OffsetDateTime>().is_some());
    }

    #[test]
    fn socket_addr_nests_ip_and_writes_port() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().expect("addr");
        let value = Value::object(addr);
        let extractor = registry().resolve(&value);
        let ip = extractor.child(&value, "ip").expect("ip").expect("some");
        assert_eq!(ip.type_name(), "ip_addr");
        let rebuilt = extractor.write(&value, "port", Value::Int(9090)).expect("port");
        assert_eq!(
            rebuilt.downcast_ref::<SocketAddr>().map(|a| a.port()),
            Some(9090)
        );
        assert_eq!(
            extractor.write(&value, "port", Value::Int(70000)).unwrap_err().kind(),
            ErrorKind::Conversion
        );
    }

    #[test]
    fn named_parsers_cover_simplified_types() {
        let parsers = named_parsers();
        let parse = |name: &str, input: StructuredValue| {
            let (_, parser) = parsers
                .iter()
                .find(|(candidate, _)| *candidate == name)
                .expect("parser");
            parser(&input)
        };
        let url = parse("url", StructuredValue::from("https://example.com:8443/a?b=1")).expect("url");
        assert_eq!(url.type_name(), "url");
        let duration = parse("duration", serde_json::json!(1.5)).expect("duration");
        assert_eq!(duration.downcast_ref::<Duration>(), Some(&Duration::from_millis(1500)));
        let dt = parse("datetime", serde_json::json!(0)).expect("datetime");
        assert_eq!(dt.downcast_ref::<OffsetDateTime>(), Some(&OffsetDateTime::UNIX_EPOCH));
        assert_eq!(
            parse("ip_addr", StructuredValue::from("not-an-ip")).unwrap_err().kind(),
            ErrorKind::Conversion
        );
        assert_eq!(
            parse("path", serde_json::json!(3)).unwrap_err().kind(),
            ErrorKind::Conversion
        );
    }
}
