//! Purpose: Composite resource handle `domain:key=value,...` naming one managed resource.
//! Exports: `ResourceName`.
//! Role: Host object with its own simplifier and named conversion target.
//! Invariants: Domain is non-empty; at least one property; property keys are unique.
//! Invariants: `canonical()` orders properties by key and is stable for equal names.
use std::fmt;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceName {
    domain: String,
    properties: Vec<(String, String)>,
}

impl ResourceName {
    pub fn new<K, V>(
        domain: impl Into<String>,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, Error>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let domain = domain.into();
        let properties: Vec<(String, String)> = properties
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let text = format_name(&domain, &properties);
        validate(&domain, &properties, &text)?;
        Ok(Self { domain, properties })
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        let Some((domain, rest)) = text.split_once(':') else {
            return Err(invalid(text, "missing `:` between domain and properties"));
        };
        let mut properties = Vec::new();
        let mut chars = rest.chars().peekable();
        loop {
            let mut key = String::new();
            while let Some(&ch) = chars.peek() {
                if ch == '=' {
                    break;
                }
                if ch == ',' || ch == '"' {
                    return Err(invalid(text, "property key must be followed by `=`"));
                }
                key.push(ch);
                chars.next();
            }
            if chars.next() != Some('=') {
                return Err(invalid(text, "property key must be followed by `=`"));
            }
            let mut value = String::new();
            if chars.peek() == Some(&'"') {
                chars.next();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => break,
                        },
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(invalid(text, "unterminated quoted value"));
                }
            } else {
                while let Some(&ch) = chars.peek() {
                    if ch == ',' {
                        break;
                    }
                    if ch == '=' || ch == ':' || ch == '"' {
                        return Err(invalid(text, "unquoted value contains a reserved character"));
                    }
                    value.push(ch);
                    chars.next();
                }
            }
            properties.push((key, value));
            match chars.next() {
                None => break,
                Some(',') => continue,
                Some(_) => return Err(invalid(text, "expected `,` after a quoted value")),
            }
        }
        validate(domain, &properties, text)?;
        Ok(Self {
            domain: domain.to_string(),
            properties,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn canonical(&self) -> String {
        let mut sorted = self.properties.clone();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        format_name(&self.domain, &sorted)
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_name(&self.domain, &self.properties))
    }
}

fn format_name(domain: &str, properties: &[(String, String)]) -> String {
    let mut out = String::from(domain);
    out.push(':');
    for (idx, (key, value)) in properties.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push_str(key);
        out.push('=');
        if value.contains([',', '=', ':', '"', '\\']) {
            out.push('"');
            for ch in value.chars() {
                if ch == '"' || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push('"');
        } else {
            out.push_str(value);
        }
    }
    out
}

fn validate(domain: &str, properties: &[(String, String)], text: &str) -> Result<(), Error> {
    if domain.is_empty() || domain.contains([':', ',', '=']) {
        return Err(invalid(text, "domain must be non-empty and free of `:`, `,` and `=`"));
    }
    if properties.is_empty() {
        return Err(invalid(text, "at least one key=value property is required"));
    }
    for (idx, (key, _)) in properties.iter().enumerate() {
        if key.is_empty() || key.contains([':', ',', '=', '"']) {
            return Err(invalid(text, "property keys must be non-empty plain text"));
        }
        if properties[..idx].iter().any(|(other, _)| other == key) {
            return Err(invalid(text, &format!("duplicate property key `{key}`")));
        }
    }
    Ok(())
}

fn invalid(text: &str, message: &str) -> Error {
    Error::new(ErrorKind::Conversion)
        .with_message(format!("invalid resource name: {message}"))
        .with_target("resource_name")
        .with_input(text)
}

#[cfg(test)]
mod tests {
    use super::ResourceName;
    use crate::core::error::ErrorKind;

    #[test]
    fn parses_plain_and_quoted_properties() {
        let name = ResourceName::parse(r#"app:type=Cache,name="a,b\"c""#).expect("name");
        assert_eq!(name.domain(), "app");
        assert_eq!(name.property("type"), Some("Cache"));
        assert_eq!(name.property("name"), Some("a,b\"c"));
        assert_eq!(name.to_string(), r#"app:type=Cache,name="a,b\"c""#);
    }

    #[test]
    fn canonical_sorts_properties() {
        let name = ResourceName::parse("app:type=Pool,name=db,env=prod").expect("name");
        assert_eq!(name.canonical(), "app:env=prod,name=db,type=Pool");
        let reordered = ResourceName::parse("app:env=prod,type=Pool,name=db").expect("name");
        assert_eq!(name.canonical(), reordered.canonical());
    }

    #[test]
    fn rejects_malformed_names() {
        for text in ["nodomain", ":a=b", "app:", "app:a", "app:a=1,a=2", "app:a=\"open", "app:a=b=c"] {
            let err = ResourceName::parse(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Conversion, "{text}");
        }
    }

    #[test]
    fn new_validates_like_parse() {
        assert!(ResourceName::new("app", [("type", "x")]).is_ok());
        assert!(ResourceName::new("app", Vec::<(String, String)>::new()).is_err());
    }
}
