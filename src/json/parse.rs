//! Purpose: Provide the internal runtime JSON decode entrypoints.
//! Exports: `from_str`, `structured`.
//! Role: Parser boundary that centralizes serde_json usage details.
//! Invariants: Numbers keep their exact text (`arbitrary_precision`); object order is kept.
//! Notes: `from_str` leaves error mapping to callsites so domain context stays explicit.

use serde::de::DeserializeOwned;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::StructuredValue;

pub(crate) fn from_str<T: DeserializeOwned>(input: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(input)
}

/// Decodes a JSON document, reporting failures as conversion errors against `target`.
pub(crate) fn structured(input: &str, target: &str) -> Result<StructuredValue, Error> {
    from_str(input).map_err(|err| {
        Error::new(ErrorKind::Conversion)
            .with_message(format!(
                "invalid JSON at line {} column {}",
                err.line(),
                err.column()
            ))
            .with_target(target)
            .with_input(input)
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::structured;
    use crate::core::error::ErrorKind;

    #[test]
    fn syntax_errors_report_position_and_target() {
        let err = structured("{\"a\":\n  tru}", "dynamic").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert_eq!(err.target(), Some("dynamic"));
        assert!(err.message().unwrap_or_default().contains("line 2"));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(structured("[1] 2", "dynamic").is_err());
    }
}
