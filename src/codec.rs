//! The serialization codec interface consumed by request building and response decoding.
//!
//! The runtime never parses payloads itself; it asks a [`Codec`] to move between bytes
//! and [`serde_json::Value`] trees, picking the [`Encoding`] from the `Content-Type`
//! header. The default [`JsonCodec`] supports JSON; every other enumerated encoding is
//! reported as unsupported so callers can plug in a richer codec.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::headers::HttpHeaders;

/// The wire encodings a codec may be asked to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `application/json` (and `+json` suffixed media types).
    Json,
    /// `application/xml` / `text/xml`.
    Xml,
    /// `application/x-www-form-urlencoded`.
    FormUrlEncoded,
    /// `text/*` payloads carried verbatim.
    Text,
}

/// Moves values between bytes and structured form.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a value for the wire.
    fn serialize(&self, value: &Value, encoding: Encoding) -> Result<Vec<u8>>;

    /// Decodes wire bytes into a value.
    fn deserialize(&self, bytes: &[u8], encoding: Encoding) -> Result<Value>;

    /// Picks the encoding implied by the response headers.
    ///
    /// Inspects `Content-Type`; an absent header defaults to JSON, an unrecognized media
    /// type is an [`Error::UnsupportedEncoding`].
    fn encoding_from_headers(&self, headers: &HttpHeaders) -> Result<Encoding> {
        match headers.get("content-type") {
            None => Ok(Encoding::Json),
            Some(ct) => encoding_for_content_type(ct),
        }
    }
}

/// Returns `true` if the media type is JSON, ignoring case and any parameters.
pub(crate) fn is_json_content_type(content_type: &str) -> bool {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    media_type.eq_ignore_ascii_case("application/json")
        || media_type
            .rsplit_once('+')
            .map(|(_, suffix)| suffix.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
}

/// Maps a `Content-Type` value onto an [`Encoding`].
pub(crate) fn encoding_for_content_type(content_type: &str) -> Result<Encoding> {
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    if is_json_content_type(media_type) {
        return Ok(Encoding::Json);
    }
    if media_type.eq_ignore_ascii_case("application/xml") || media_type.eq_ignore_ascii_case("text/xml") {
        return Ok(Encoding::Xml);
    }
    if media_type.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
        return Ok(Encoding::FormUrlEncoded);
    }
    if media_type.len() > 5 && media_type[..5].eq_ignore_ascii_case("text/") {
        return Ok(Encoding::Text);
    }
    Err(Error::UnsupportedEncoding(media_type.to_string()))
}

/// The default codec: full JSON support through `serde_json`, text passthrough, and
/// unsupported-encoding errors for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn serialize(&self, value: &Value, encoding: Encoding) -> Result<Vec<u8>> {
        match encoding {
            Encoding::Json => {
                serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
            }
            Encoding::Text => match value {
                Value::String(s) => Ok(s.clone().into_bytes()),
                other => Ok(other.to_string().into_bytes()),
            },
            Encoding::Xml => Err(Error::UnsupportedEncoding("application/xml".to_string())),
            Encoding::FormUrlEncoded => Err(Error::UnsupportedEncoding(
                "application/x-www-form-urlencoded".to_string(),
            )),
        }
    }

    fn deserialize(&self, bytes: &[u8], encoding: Encoding) -> Result<Value> {
        match encoding {
            Encoding::Json => serde_json::from_slice(bytes).map_err(|e| Error::Decoding {
                status: http::StatusCode::OK,
                reason: e.to_string(),
            }),
            Encoding::Text => Ok(Value::String(String::from_utf8_lossy(bytes).into_owned())),
            Encoding::Xml => Err(Error::UnsupportedEncoding("application/xml".to_string())),
            Encoding::FormUrlEncoded => Err(Error::UnsupportedEncoding(
                "application/x-www-form-urlencoded".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_content_type_matching_ignores_case_and_parameters() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("Application/JSON; charset=utf-8"));
        assert!(is_json_content_type("application/merge-patch+json"));
        assert!(!is_json_content_type("application/octet-stream"));
        assert!(!is_json_content_type("text/json-ish"));
    }

    #[test]
    fn encoding_selection() {
        assert_eq!(encoding_for_content_type("application/json").unwrap(), Encoding::Json);
        assert_eq!(encoding_for_content_type("text/xml").unwrap(), Encoding::Xml);
        assert_eq!(
            encoding_for_content_type("application/x-www-form-urlencoded").unwrap(),
            Encoding::FormUrlEncoded
        );
        assert_eq!(encoding_for_content_type("text/plain; charset=utf-8").unwrap(), Encoding::Text);
        assert!(matches!(
            encoding_for_content_type("application/grpc"),
            Err(Error::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn json_codec_round_trip() {
        let codec = JsonCodec;
        let value = json!({"a": 1, "b": ["x", "y"]});
        let bytes = codec.serialize(&value, Encoding::Json).unwrap();
        let back = codec.deserialize(&bytes, Encoding::Json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn json_codec_rejects_xml() {
        let codec = JsonCodec;
        assert!(matches!(
            codec.serialize(&json!({}), Encoding::Xml),
            Err(Error::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn default_encoding_from_headers_is_json() {
        let codec = JsonCodec;
        assert_eq!(codec.encoding_from_headers(&HttpHeaders::new()).unwrap(), Encoding::Json);
    }
}
