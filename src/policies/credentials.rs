//! Request signing through an injected credential provider.

use async_trait::async_trait;
use std::sync::Arc;

use crate::context::PolicyContext;
use crate::error::Result;
use crate::pipeline::{Next, Policy};
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Supplies authentication material for outgoing requests.
///
/// Implementations own their caching: `sign` is called on every attempt, `refresh` only
/// when the retry policy observes a reported token expiry.
#[async_trait]
pub trait CredentialProvider: Send + Sync + 'static {
    /// Signs the request in place (typically by setting `Authorization`).
    async fn sign(&self, request: &mut HttpRequest) -> Result<()>;

    /// Discards cached material and acquires fresh credentials.
    async fn refresh(&self) -> Result<()>;
}

/// The provider handle published into the per-call context so the retry policy can
/// trigger a refresh on token expiry.
#[derive(Clone)]
pub(crate) struct CredentialHandle(pub(crate) Arc<dyn CredentialProvider>);

impl std::fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialHandle")
    }
}

/// Signs every request through a [`CredentialProvider`] before delegating down the chain.
///
/// Place this *before* the retry policy: a retry re-entry then re-signs the request, which
/// is what makes credential refresh effective.
pub struct CredentialsPolicy {
    provider: Arc<dyn CredentialProvider>,
}

impl CredentialsPolicy {
    /// Creates the policy around a provider.
    pub fn new(provider: impl CredentialProvider) -> Self {
        Self { provider: Arc::new(provider) }
    }

    /// Creates the policy around an already-shared provider.
    pub fn from_arc(provider: Arc<dyn CredentialProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Policy for CredentialsPolicy {
    async fn process(&self, ctx: &mut PolicyContext, next: Next<'_>) -> Result<HttpResponse> {
        ctx.extensions_mut().insert(CredentialHandle(self.provider.clone()));
        self.provider.sign(ctx.request_mut()).await?;
        next.run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyHandle;
    use crate::headers::HttpHeaders;
    use crate::pipeline::Pipeline;
    use crate::transport::{Transport, TransportError};
    use http::{Method, StatusCode};
    use url::Url;

    struct StaticToken(&'static str);

    #[async_trait]
    impl CredentialProvider for StaticToken {
        async fn sign(&self, request: &mut HttpRequest) -> Result<()> {
            request.headers_mut().set("Authorization", format!("Bearer {}", self.0));
            Ok(())
        }

        async fn refresh(&self) -> Result<()> {
            Ok(())
        }
    }

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            let mut response = HttpResponse::new(StatusCode::OK, HttpHeaders::new(), BodyHandle::empty());
            response.set_request(request);
            Ok(response)
        }
    }

    #[tokio::test]
    async fn signs_before_dispatch() {
        let pipeline = Pipeline::builder()
            .policy(CredentialsPolicy::new(StaticToken("t0k3n")))
            .transport(Echo)
            .build();

        let request = HttpRequest::new(Method::GET, Url::parse("https://h/x").unwrap());
        let response = pipeline.send_request(request).await.unwrap();
        assert_eq!(
            response.request().unwrap().headers().get("authorization"),
            Some("Bearer t0k3n")
        );
    }
}
