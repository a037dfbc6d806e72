//! A per-pipeline cookie jar.

use async_trait::async_trait;
use cookie::Cookie;
use std::sync::Mutex;
use url::Url;

use crate::context::PolicyContext;
use crate::error::Result;
use crate::pipeline::{Next, Policy};
use crate::response::HttpResponse;

#[derive(Debug, Clone)]
struct StoredCookie {
    name: String,
    value: String,
    /// `None` means host-only: the cookie matches the exact host it was set by.
    domain: Option<String>,
    path: String,
    secure: bool,
}

impl StoredCookie {
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else { return false };
        let domain_ok = match &self.domain {
            Some(domain) => {
                host.eq_ignore_ascii_case(domain)
                    || host.to_ascii_lowercase().ends_with(&format!(".{}", domain.to_ascii_lowercase()))
            }
            None => false,
        };
        if !domain_ok {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let path = url.path();
        path == self.path
            || (path.starts_with(&self.path)
                && (self.path.ends_with('/') || path.as_bytes().get(self.path.len()) == Some(&b'/')))
    }
}

/// Maintains a cookie jar shared by every call on the pipeline: matching cookies are
/// injected into outgoing requests, and `Set-Cookie` response headers are harvested back.
///
/// The jar is the only shared mutable state among the built-in policies and is
/// synchronized internally; the policy itself stays immutable and freely shareable.
#[derive(Debug, Default)]
pub struct CookiePolicy {
    jar: Mutex<Vec<StoredCookie>>,
}

impl CookiePolicy {
    /// Creates the policy with an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    fn inject(&self, ctx: &mut PolicyContext) {
        let url = ctx.request().url().clone();
        let header = {
            let jar = self.jar.lock().unwrap_or_else(|e| e.into_inner());
            let pairs: Vec<String> = jar
                .iter()
                .filter(|c| c.matches(&url))
                .map(|c| format!("{}={}", c.name, c.value))
                .collect();
            if pairs.is_empty() { None } else { Some(pairs.join("; ")) }
        };
        if let Some(header) = header {
            let merged = match ctx.request().headers().get("cookie") {
                Some(existing) => format!("{existing}; {header}"),
                None => header,
            };
            ctx.request_mut().headers_mut().set("Cookie", merged);
        }
    }

    fn harvest(&self, url: &Url, response: &HttpResponse) {
        let set_cookies: Vec<String> =
            response.headers().get_all("set-cookie").map(str::to_string).collect();
        if set_cookies.is_empty() {
            return;
        }
        let mut jar = self.jar.lock().unwrap_or_else(|e| e.into_inner());
        for raw in set_cookies {
            let Ok(parsed) = Cookie::parse(raw) else { continue };
            let expired = parsed
                .max_age()
                .map(|age| age <= cookie::time::Duration::ZERO)
                .unwrap_or(false);
            let domain = parsed.domain().map(|d| d.trim_start_matches('.').to_ascii_lowercase());
            let stored = StoredCookie {
                name: parsed.name().to_string(),
                value: parsed.value().to_string(),
                domain: domain.or_else(|| url.host_str().map(str::to_ascii_lowercase)),
                path: parsed.path().unwrap_or("/").to_string(),
                secure: parsed.secure().unwrap_or(false),
            };
            jar.retain(|c| {
                !(c.name == stored.name && c.domain == stored.domain && c.path == stored.path)
            });
            if !expired {
                jar.push(stored);
            }
        }
    }
}

#[async_trait]
impl Policy for CookiePolicy {
    async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse> {
        self.inject(ctx);
        let url = ctx.request().url().clone();
        let response = next.run(ctx).await?;
        self.harvest(&url, &response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn cookie(name: &str, domain: Option<&str>, path: &str, secure: bool) -> StoredCookie {
        StoredCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: domain.map(str::to_string),
            path: path.to_string(),
            secure,
        }
    }

    #[test]
    fn domain_matching_includes_subdomains() {
        let c = cookie("a", Some("example.com"), "/", false);
        assert!(c.matches(&url("https://example.com/x")));
        assert!(c.matches(&url("https://api.example.com/x")));
        assert!(!c.matches(&url("https://notexample.com/x")));
    }

    #[test]
    fn path_matching_is_prefix_on_segment_boundaries() {
        let c = cookie("a", Some("h"), "/api", false);
        assert!(c.matches(&url("https://h/api")));
        assert!(c.matches(&url("https://h/api/items")));
        assert!(!c.matches(&url("https://h/apiary")));
    }

    #[test]
    fn secure_cookies_require_https() {
        let c = cookie("a", Some("h"), "/", true);
        assert!(c.matches(&url("https://h/")));
        assert!(!c.matches(&url("http://h/")));
    }

    #[test]
    fn harvest_replaces_and_expires() {
        use crate::body::BodyHandle;
        use crate::headers::HttpHeaders;
        use http::StatusCode;

        let policy = CookiePolicy::new();
        let origin = url("https://h/login");

        let mut headers = HttpHeaders::new();
        headers.append("Set-Cookie", "session=one; Path=/");
        let response = HttpResponse::new(StatusCode::OK, headers, BodyHandle::empty());
        policy.harvest(&origin, &response);
        assert_eq!(policy.jar.lock().unwrap().len(), 1);

        let mut headers = HttpHeaders::new();
        headers.append("Set-Cookie", "session=two; Path=/");
        let response = HttpResponse::new(StatusCode::OK, headers, BodyHandle::empty());
        policy.harvest(&origin, &response);
        {
            let jar = policy.jar.lock().unwrap();
            assert_eq!(jar.len(), 1);
            assert_eq!(jar[0].value, "two");
        }

        let mut headers = HttpHeaders::new();
        headers.append("Set-Cookie", "session=gone; Path=/; Max-Age=0");
        let response = HttpResponse::new(StatusCode::OK, headers, BodyHandle::empty());
        policy.harvest(&origin, &response);
        assert!(policy.jar.lock().unwrap().is_empty());
    }
}
