//! URL assembly from scheme, host, path, and query fragments.
//!
//! [`UrlBuilder`] exists so request building can accumulate fragments in any order
//! (host template first, path substitutions, then query overrides) and validate once at
//! the end through [`url::Url`]. Parsing a well-formed URL and rebuilding it is
//! idempotent.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::error::{Error, Result};

/// Characters percent-encoded inside a path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'|');

/// Characters percent-encoded inside a query component (name or value).
const QUERY_COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'&')
    .add(b'=')
    .add(b'+')
    .add(b'%');

/// Percent-encodes a value for use as a path segment.
pub fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Percent-encodes a value for use as a query name or value.
pub fn encode_query_component(value: &str) -> String {
    utf8_percent_encode(value, QUERY_COMPONENT).to_string()
}

/// An incrementally-built request URL.
///
/// # Examples
///
/// ```
/// use declarest::UrlBuilder;
///
/// let mut builder = UrlBuilder::new();
/// builder.set_scheme("https");
/// builder.set_host("api.example.com");
/// builder.set_path("/items/42");
/// builder.set_query_parameter("expand", "tags");
/// assert_eq!(builder.to_url().unwrap().as_str(), "https://api.example.com/items/42?expand=tags");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlBuilder {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
    query: Vec<(String, String)>,
}

impl UrlBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a string into its fragments.
    ///
    /// An input carrying a scheme is parsed as an absolute URL; anything else is treated
    /// as a path, with an optional `?query` suffix split into query parameters. This
    /// never fails: callers detect absoluteness via [`UrlBuilder::scheme`] and validation
    /// happens in [`UrlBuilder::to_url`].
    pub fn parse(input: &str) -> Self {
        if input.contains("://") {
            if let Ok(url) = Url::parse(input) {
                let mut builder = UrlBuilder {
                    scheme: Some(url.scheme().to_string()),
                    host: url.host_str().map(str::to_string),
                    port: url.port(),
                    path: Some(url.path().to_string()),
                    query: Vec::new(),
                };
                for (name, value) in url.query_pairs() {
                    builder.query.push((name.into_owned(), value.into_owned()));
                }
                return builder;
            }
        }

        let (path, query) = match input.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (input, None),
        };
        let mut builder = UrlBuilder {
            path: if path.is_empty() { None } else { Some(path.to_string()) },
            ..Default::default()
        };
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some((name, value)) => builder.query.push((name.to_string(), value.to_string())),
                    None => builder.query.push((pair.to_string(), String::new())),
                }
            }
        }
        builder
    }

    /// The scheme fragment, if set.
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// The host fragment, if set.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// The path fragment, if set.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The query parameters in insertion order.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Sets the scheme fragment.
    pub fn set_scheme(&mut self, scheme: impl Into<String>) -> &mut Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Sets the host fragment. A `host:port` value is split into both fragments, and a
    /// leading `scheme://` prefix also sets the scheme.
    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        let host = host.into();
        let rest = match host.split_once("://") {
            Some((scheme, rest)) => {
                self.scheme = Some(scheme.to_string());
                rest.to_string()
            }
            None => host,
        };
        match rest.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
                self.host = Some(name.to_string());
                self.port = port.parse().ok();
            }
            _ => self.host = Some(rest),
        }
        self
    }

    /// Sets the port fragment.
    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    /// Sets the path fragment.
    pub fn set_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    /// Sets a query parameter, replacing every existing parameter with the same name.
    ///
    /// Values are expected to be encoded already; request building encodes per the
    /// binding's encoding policy before calling this.
    pub fn set_query_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.query.retain(|(n, _)| *n != name);
        self.query.push((name, value.into()));
        self
    }

    /// Assembles and validates the URL.
    ///
    /// The scheme defaults to `https` when unset; a missing host is an error.
    pub fn to_url(&self) -> Result<Url> {
        let host = self
            .host
            .as_deref()
            .ok_or_else(|| Error::InvalidUrl("no host".to_string()))?;
        let scheme = self.scheme.as_deref().unwrap_or("https");

        let mut out = format!("{scheme}://{host}");
        if let Some(port) = self.port {
            out.push_str(&format!(":{port}"));
        }
        match self.path.as_deref() {
            Some(path) if path.starts_with('/') => out.push_str(path),
            Some(path) => {
                out.push('/');
                out.push_str(path);
            }
            None => {}
        }
        for (i, (name, value)) in self.query.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            out.push_str(name);
            if !value.is_empty() {
                out.push('=');
                out.push_str(value);
            }
        }

        Url::parse(&out).map_err(|e| Error::InvalidUrl(format!("{out:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_fragments() {
        let mut builder = UrlBuilder::new();
        builder.set_scheme("http").set_host("localhost").set_port(8080).set_path("items/1");
        assert_eq!(builder.to_url().unwrap().as_str(), "http://localhost:8080/items/1");
    }

    #[test]
    fn parse_detects_absolute_urls() {
        let builder = UrlBuilder::parse("https://other/host/page2?x=1");
        assert_eq!(builder.scheme(), Some("https"));
        assert_eq!(builder.host(), Some("other"));
        assert_eq!(builder.path(), Some("/host/page2"));
        assert_eq!(builder.query(), &[("x".to_string(), "1".to_string())]);
    }

    #[test]
    fn parse_treats_relative_input_as_path() {
        let builder = UrlBuilder::parse("/items/42?expand=tags");
        assert_eq!(builder.scheme(), None);
        assert_eq!(builder.path(), Some("/items/42"));
        assert_eq!(builder.query().len(), 1);
    }

    #[test]
    fn build_then_parse_is_idempotent() {
        let mut builder = UrlBuilder::new();
        builder.set_host("api.example.com").set_path("/a/b");
        builder.set_query_parameter("k", "v");
        builder.set_query_parameter("n", "");
        let url = builder.to_url().unwrap();
        let reparsed = UrlBuilder::parse(url.as_str());
        assert_eq!(reparsed.to_url().unwrap(), url);
    }

    #[test]
    fn set_query_parameter_overrides() {
        let mut builder = UrlBuilder::new();
        builder.set_host("h");
        builder.set_query_parameter("page", "1");
        builder.set_query_parameter("page", "2");
        assert_eq!(builder.to_url().unwrap().query(), Some("page=2"));
    }

    #[test]
    fn host_with_embedded_scheme_and_port() {
        let mut builder = UrlBuilder::new();
        builder.set_host("http://localhost:9000");
        builder.set_path("/x");
        assert_eq!(builder.to_url().unwrap().as_str(), "http://localhost:9000/x");
    }

    #[test]
    fn missing_host_is_an_error() {
        let mut builder = UrlBuilder::new();
        builder.set_path("/only/path");
        assert!(matches!(builder.to_url(), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn encoding_helpers() {
        assert_eq!(encode_path_segment("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_query_component("a&b=c"), "a%26b%3Dc");
    }
}
