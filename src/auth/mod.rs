//! AWS Signature V2 request authentication.
//!
//! Three variants are supported: the `Authorization` header form, the
//! presigned query-string form bounded by an `Expires` instant, and the
//! POST-policy form. The validators consume a plain request view (method,
//! raw request URI, headers) so no HTTP framework leaks into the core; the
//! UTC clock is passed in by the caller.

mod signature;

#[cfg(test)]
mod tests;

pub use signature::{
    verify_header_signature, verify_post_policy_signature, verify_presigned_signature,
};

/// Result of signature validation with error type [`AuthError`].
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication failures. All of them abort request handling early.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is absent or empty.
    #[error("authorization header is empty")]
    AuthHeaderEmpty,
    /// The header names a signature algorithm other than V2.
    #[error("signature version not supported")]
    SignatureVersionNotSupported,
    /// The header does not split into algorithm, access key and signature.
    #[error("missing fields in authorization header")]
    MissingFields,
    /// The presented access key is not the configured one.
    #[error("invalid access key id")]
    InvalidAccessKeyID,
    /// The presented signature differs from the recomputed one.
    #[error("signature does not match")]
    SignatureDoesNotMatch,
    /// The `Expires` query value is not a base-10 integer.
    #[error("malformed expires value")]
    MalformedExpires,
    /// The presigned URL expired before the request arrived.
    #[error("presigned request has expired")]
    ExpiredPresignRequest,
    /// A query segment failed to URL-decode, or a required auth parameter
    /// is missing from the query.
    #[error("invalid query params")]
    InvalidQueryParams,
}

/// Multi-valued request headers with case-insensitive lookup. Also used for
/// the form values of POST-policy requests.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders(Vec<(String, String)>);

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for RequestHeaders {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect())
    }
}

/// The request view consumed by the validators. `request_uri` is the raw
/// encoded URI exactly as sent by the client; the validators never operate
/// on a decoded form of it.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: String,
    pub request_uri: String,
    pub headers: RequestHeaders,
}
