//! Content decoding driven by the message's declared content type.
//!
//! | content type                      | result                      |
//! |-----------------------------------|-----------------------------|
//! | `application/json`, `text/json`   | [`Content::Json`]           |
//! | `text/plain`                      | [`Content::Text`]           |
//! | anything else, or none            | [`Content::Binary`] (as-is) |
//!
//! The content encoding only affects how bytes become text; it defaults to
//! UTF-8 when the message does not declare one.

use crate::error::CodecError;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use strum::EnumString;

/// Decoded message content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// Parsed JSON document
    Json(Value),
    /// Plain text
    Text(String),
    /// Opaque payload, passed through untouched
    Binary(Vec<u8>),
}

impl Content {
    /// Convert into a JSON value. Binary payloads become an array of bytes.
    pub fn into_value(self) -> Value {
        match self {
            Content::Json(value) => value,
            Content::Text(text) => Value::String(text),
            Content::Binary(bytes) => Value::Array(bytes.into_iter().map(Value::from).collect()),
        }
    }

    /// Read a binary payload as UTF-8 text, replacing invalid sequences.
    /// JSON and text content are returned unchanged.
    pub fn into_text(self) -> Self {
        match self {
            Content::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Content::Text(text),
                Err(err) => Content::Text(String::from_utf8_lossy(err.as_bytes()).into_owned()),
            },
            other => other,
        }
    }
}

/// The subset of media types the codec dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Json,
    Text,
    Other,
}

impl MediaType {
    /// Classify a `content_type` property.
    ///
    /// Parameters (`; charset=...`) and letter case are ignored.
    pub fn parse(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return MediaType::Other;
        };

        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" | "text/json" => MediaType::Json,
            "text/plain" => MediaType::Text,
            _ => MediaType::Other,
        }
    }
}

/// Text encodings accepted in the `content_encoding` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Encoding {
    #[default]
    #[strum(serialize = "utf8", serialize = "utf-8")]
    Utf8,
    #[strum(serialize = "ascii", serialize = "us-ascii")]
    Ascii,
    #[strum(serialize = "latin1", serialize = "binary", serialize = "iso-8859-1")]
    Latin1,
    #[strum(
        serialize = "utf16le",
        serialize = "utf-16le",
        serialize = "ucs2",
        serialize = "ucs-2"
    )]
    Utf16Le,
}

impl Encoding {
    /// Resolve an optional `content_encoding`, defaulting to UTF-8.
    pub fn resolve(content_encoding: Option<&str>) -> Result<Self, CodecError> {
        match content_encoding.map(str::trim) {
            None | Some("") => Ok(Encoding::Utf8),
            Some(name) => Encoding::from_str(name)
                .map_err(|_| CodecError::UnsupportedEncoding(name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin1",
            Encoding::Utf16Le => "utf16le",
        }
    }

    /// Decode bytes as text. Invalid sequences become U+FFFD.
    pub fn decode_text(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes.iter().map(|b| (b & 0x7f) as char).collect(),
            Encoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Encoding::Utf16Le => {
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            }
        }
    }
}

/// Decode a raw payload according to its declared content type and encoding.
///
/// Unknown content types return the bytes unchanged, without looking at the
/// encoding at all.
pub fn decode(
    bytes: Vec<u8>,
    content_type: Option<&str>,
    content_encoding: Option<&str>,
) -> Result<Content, CodecError> {
    match MediaType::parse(content_type) {
        MediaType::Other => Ok(Content::Binary(bytes)),
        MediaType::Text => {
            let encoding = Encoding::resolve(content_encoding)?;
            Ok(Content::Text(encoding.decode_text(&bytes)))
        }
        MediaType::Json => {
            let encoding = Encoding::resolve(content_encoding)?;
            let value = match encoding {
                Encoding::Utf8 => serde_json::from_slice(&bytes)?,
                other => serde_json::from_str(&other.decode_text(&bytes))?,
            };
            Ok(Content::Json(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binary_into_text() {
        let content = decode(b"Hello".to_vec(), None, None).unwrap();
        assert_eq!(content.into_text(), Content::Text("Hello".to_string()));

        let lossy = Content::Binary(vec![b'o', 0xff, b'k']).into_text();
        assert_eq!(lossy, Content::Text("o\u{fffd}k".to_string()));

        let json = Content::Json(json!([1, 2]));
        assert_eq!(json.clone().into_text(), json);
    }

    #[test]
    fn test_decode_json() {
        let bytes = br#"{"hello":"world!","n":[1,2,3]}"#.to_vec();
        let content = decode(bytes.clone(), Some("application/json"), None).unwrap();
        let expected: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(content, Content::Json(expected));

        let content = decode(b"42".to_vec(), Some("text/json"), None).unwrap();
        assert_eq!(content, Content::Json(json!(42)));
    }

    #[test]
    fn test_decode_json_ignores_parameters_and_case() {
        let content = decode(
            br#"{"a":1}"#.to_vec(),
            Some("Application/JSON; charset=utf-8"),
            None,
        )
        .unwrap();
        assert_eq!(content, Content::Json(json!({"a": 1})));
    }

    #[test]
    fn test_decode_json_malformed() {
        let err = decode(b"{not json".to_vec(), Some("application/json"), None).unwrap_err();
        assert!(matches!(err, CodecError::InvalidJson(_)));
    }

    #[test]
    fn test_decode_json_with_latin1_encoding() {
        let bytes = vec![b'"', 0xe9, b'"'];
        let content = decode(bytes, Some("application/json"), Some("latin1")).unwrap();
        assert_eq!(content, Content::Json(json!("é")));
    }

    #[test]
    fn test_decode_text() {
        let content = decode(b"Hello, World!".to_vec(), Some("text/plain"), None).unwrap();
        assert_eq!(content, Content::Text("Hello, World!".to_string()));

        let content = decode(b"Hello, World!".to_vec(), Some("text/plain"), Some("UTF-8")).unwrap();
        assert_eq!(content, Content::Text("Hello, World!".to_string()));
    }

    #[test]
    fn test_decode_text_encodings() {
        let utf16: Vec<u8> = "héllo".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let content = decode(utf16, Some("text/plain"), Some("ucs2")).unwrap();
        assert_eq!(content, Content::Text("héllo".to_string()));

        let content = decode(vec![0xc3, 0xa9], Some("text/plain"), Some("binary")).unwrap();
        assert_eq!(content, Content::Text("Ã©".to_string()));

        let content = decode(vec![0xc1, 0x42], Some("text/plain"), Some("ascii")).unwrap();
        assert_eq!(content, Content::Text("AB".to_string()));
    }

    #[test]
    fn test_decode_text_invalid_utf8_is_lossy() {
        let content = decode(vec![b'a', 0xff, b'b'], Some("text/plain"), None).unwrap();
        assert_eq!(content, Content::Text("a\u{fffd}b".to_string()));
    }

    #[test]
    fn test_decode_unsupported_encoding() {
        let err = decode(b"x".to_vec(), Some("text/plain"), Some("koi8-r")).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedEncoding(ref name) if name == "koi8-r"));
    }

    #[test]
    fn test_decode_unknown_type_is_identity() {
        let bytes = vec![0x00, 0xff, 0x10, 0x80];

        let content = decode(bytes.clone(), None, None).unwrap();
        assert_eq!(content, Content::Binary(bytes.clone()));

        let content = decode(bytes.clone(), Some("application/octet-stream"), Some("bogus")).unwrap();
        assert_eq!(content, Content::Binary(bytes));
    }

    #[test]
    fn test_content_into_value() {
        assert_eq!(Content::Text("hi".to_string()).into_value(), json!("hi"));
        assert_eq!(Content::Binary(vec![1, 2]).into_value(), json!([1, 2]));
        assert_eq!(Content::Json(json!({"a": null})).into_value(), json!({"a": null}));
    }

    #[test]
    fn test_encoding_resolve() {
        assert_eq!(Encoding::resolve(None).unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::resolve(Some("")).unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::resolve(Some("UTF8")).unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::resolve(Some("iso-8859-1")).unwrap(), Encoding::Latin1);
        assert_eq!(Encoding::Utf16Le.as_str(), "utf16le");
    }
}
