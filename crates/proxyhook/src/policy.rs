//! Which relayed headers may be copied onto a replayed request
//!
//! References:
//! - https://docs.gitlab.com/ee/user/project/integrations/webhooks.html
//! - https://docs.github.com/en/webhooks/webhook-events-and-payloads#delivery-headers
//! - https://en.wikipedia.org/wiki/List_of_HTTP_header_fields#Request_fields

use proxyhook_protocol::HeaderCollection;

// Not included: Connection, Host, Origin, If-*, Cache-Control,
// Proxy-Authorization, Range, Upgrade
const ALLOWED_HEADERS: &[&str] = &[
    "Accept",
    "Accept-Charset",
    "Accept-Datetime",
    "Accept-Encoding",
    "Accept-Language",
    "Authorization",
    "Content-Length",
    "Content-MD5",
    "Content-Type",
    "Cookie",
    "Date",
    "Expect",
    "Forwarded",
    "From",
    "Front-End-Https",
    "Max-Forwards",
    "Pragma",
    "Referer",
    "TE",
    "User-Agent",
    "Via",
    "Warning",
    "X-Client-Ip",
    "X-Correlation-ID",
    "X-Forwarded-For",
    "X-Forwarded-Host",
    "X-Forwarded-Proto",
    "X-Forwarded-Server",
    "X-Gitlab-Event",
    "X-Gitlab-Token",
    "X-GitHub-Delivery",
    "X-GitHub-Event",
    "X-HTTP-Method-Override",
    "X-Hub-Signature",
    "X-Request-Id",
];

/// Headers that identify a delivery, logged when a webhook arrives
pub const EVENT_ID_HEADERS: &[&str] = &[
    "X-GitHub-Delivery",
    "X-GitHub-Event",
    "X-Gitlab-Event",
    "X-Request-Id",
    "X-Correlation-ID",
];

/// Case-insensitive allowlist of forwardable header names
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderPolicy;

impl HeaderPolicy {
    pub fn allows(&self, name: &str) -> bool {
        ALLOWED_HEADERS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(name))
    }

    /// The subset of `headers` that may be forwarded, in original order
    pub fn filter<'a>(
        &self,
        headers: &'a HeaderCollection,
    ) -> impl Iterator<Item = (&'a str, &'a [String])> + 'a {
        let policy = *self;
        headers.iter().filter(move |(name, _)| policy.allows(name))
    }
}
