//! An ordered, case-insensitive header multimap.
//!
//! [`HttpHeaders`] preserves insertion order, which matters for deterministic request
//! building and for multi-valued headers such as `Set-Cookie`. Conversion to and from
//! [`http::HeaderMap`] happens at the transport boundary.

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// An ordered multimap of HTTP headers with case-insensitive names.
///
/// `set` replaces every existing value for a name (last-write-wins); `append` adds a value
/// while keeping any existing ones.
///
/// # Examples
///
/// ```
/// use declarest::HttpHeaders;
///
/// let mut headers = HttpHeaders::new();
/// headers.set("Content-Type", "application/json");
/// headers.set("content-type", "text/plain");
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
///
/// headers.append("Set-Cookie", "a=1");
/// headers.append("Set-Cookie", "b=2");
/// assert_eq!(headers.get_all("set-cookie").count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: Vec<(String, String)>,
}

impl HttpHeaders {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing every existing value with the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// Appends a header value, keeping any existing values with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the first value for the given name, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for the given name, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if a header with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Removes every value for the given name.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Iterates over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header values (a multi-valued name counts once per value).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts to an [`http::HeaderMap`] for handing to a transport.
    ///
    /// Fails with [`Error::InvalidHeader`] if a name or value is not representable.
    pub fn to_header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.entries {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| Error::InvalidHeader(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| Error::InvalidHeader(format!("invalid header value for {name}: {e}")))?;
            map.append(name, value);
        }
        Ok(map)
    }

    /// Builds from an [`http::HeaderMap`] received from a transport.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = HttpHeaders::new();
        for (name, value) in map {
            if let Ok(value) = value.to_str() {
                headers.append(name.as_str(), value);
            }
        }
        headers
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HttpHeaders {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = HttpHeaders::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_is_last_write_wins_case_insensitively() {
        let mut headers = HttpHeaders::new();
        headers.set("X-Debug", "off");
        headers.set("x-debug", "on");
        assert_eq!(headers.get("X-DEBUG"), Some("on"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn append_keeps_existing_values() {
        let mut headers = HttpHeaders::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");
        let values: Vec<&str> = headers.get_all("Set-Cookie").collect();
        assert_eq!(values, vec!["a=1", "b=2"]);
    }

    #[test]
    fn remove_drops_all_values() {
        let mut headers = HttpHeaders::new();
        headers.append("Accept", "application/json");
        headers.append("ACCEPT", "text/plain");
        headers.remove("accept");
        assert!(headers.is_empty());
    }

    #[test]
    fn header_map_round_trip() {
        let mut headers = HttpHeaders::new();
        headers.set("Content-Type", "application/json");
        headers.append("Set-Cookie", "a=1");
        headers.append("Set-Cookie", "b=2");

        let map = headers.to_header_map().unwrap();
        let back = HttpHeaders::from_header_map(&map);
        assert_eq!(back.get("content-type"), Some("application/json"));
        assert_eq!(back.get_all("set-cookie").count(), 2);
    }

    #[test]
    fn invalid_name_is_rejected() {
        let mut headers = HttpHeaders::new();
        headers.set("bad header", "value");
        assert!(matches!(
            headers.to_header_map(),
            Err(Error::InvalidHeader(_))
        ));
    }
}
