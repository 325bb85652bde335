//! Purpose: Internal JSON text boundary shared by the converter, engine and CLI.
//! Exports: `parse` module with decode helpers, `to_text` for encoding.
//! Role: Single seam for the text codec so callsites avoid ad hoc encode/decode logic.
//! Invariants: Decoding and encoding use the same grammar, so output text parses back.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;

use crate::core::error::{Error, ErrorKind};
use crate::core::value::StructuredValue;

/// Compact or pretty text of a structured value.
pub(crate) fn to_text(value: &StructuredValue, pretty: bool) -> Result<String, Error> {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    encoded.map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode value as JSON")
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::{parse, to_text};
    use crate::core::value::StructuredValue;
    use serde_json::json;

    #[test]
    fn encoded_text_parses_back() {
        let mut value = json!({"z": [1, 1.5e300, "\u{1}\"q"], "a": null});
        value["big"] = parse::from_str("123456789012345678901234567890.5").expect("big");
        for pretty in [false, true] {
            let text = to_text(&value, pretty).expect("encode");
            let back: StructuredValue = parse::from_str(&text).expect("decode");
            assert_eq!(back, value);
        }
    }

    #[test]
    fn control_characters_are_escaped() {
        let text = to_text(&json!("a\nb\u{7}"), false).expect("encode");
        assert_eq!(text, r#""a\nb\u0007""#);
    }
}
