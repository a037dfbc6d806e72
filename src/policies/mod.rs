//! Built-in pipeline policies.
//!
//! The conventional ordering mirrors how the default pipeline is assembled: user-agent,
//! request-id, credentials, retry, cookies, decoding, transport. Retry sits outside
//! cookies so a retried attempt picks up freshly harvested cookies, and inside
//! credentials so a refreshed token is re-signed on re-entry.

mod cookies;
mod credentials;
mod decoding;
mod request_id;
mod retry;
mod user_agent;

pub use cookies::CookiePolicy;
pub use credentials::{CredentialProvider, CredentialsPolicy};
pub use decoding::DecodingPolicy;
pub use request_id::{RequestIdPolicy, REQUEST_ID_HEADER};
pub use retry::RetryPolicy;
pub use user_agent::UserAgentPolicy;
