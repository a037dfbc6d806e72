//! The outgoing request value type.

use http::Method;
use url::Url;

use crate::body::Body;
use crate::headers::HttpHeaders;

/// A single HTTP request.
///
/// Mutable while policies run; conceptually frozen once the transport dispatches it.
/// Policies that need to re-dispatch clone via [`HttpRequest::try_clone`], which succeeds
/// for every body except a lazy stream.
///
/// # Examples
///
/// ```
/// use declarest::{Body, HttpRequest};
/// use http::Method;
/// use url::Url;
///
/// let mut request = HttpRequest::new(Method::POST, Url::parse("https://api.example.com/x").unwrap());
/// request.headers_mut().set("Content-Type", "application/json");
/// request.set_body(Body::from(r#"{"a":1}"#));
/// assert_eq!(request.method(), &Method::POST);
/// ```
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    url: Url,
    headers: HttpHeaders,
    body: Body,
}

impl HttpRequest {
    /// Creates a request with empty headers and no body.
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url, headers: HttpHeaders::new(), body: Body::Empty }
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Replaces the request URL.
    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// The request headers.
    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    /// Mutable access to the request headers.
    pub fn headers_mut(&mut self) -> &mut HttpHeaders {
        &mut self.headers
    }

    /// The request body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Replaces the request body.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Sets a header and returns `self`, for fluent construction.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Clones the request if its body is clonable (anything but a stream).
    pub fn try_clone(&self) -> Option<HttpRequest> {
        Some(HttpRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.try_clone()?,
        })
    }

    /// Decomposes the request for dispatch.
    pub fn into_parts(self) -> (Method, Url, HttpHeaders, Body) {
        (self.method, self.url, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};

    #[test]
    fn try_clone_fails_for_stream_bodies() {
        let url = Url::parse("https://h/x").unwrap();
        let mut request = HttpRequest::new(Method::PUT, url);
        assert!(request.try_clone().is_some());
        request.set_body(Body::Stream(stream::empty().boxed()));
        assert!(request.try_clone().is_none());
    }
}
