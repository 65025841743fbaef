use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::percent_decode_str;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::auth::{AuthError, RequestHeaders, Result, SignedRequest};
use crate::credential::Credential;

const SIGN_V2_ALGORITHM: &str = "AWS";

/// Sub-resources that participate in the canonical resource, in the order
/// they are emitted. The list is alphabetically sorted and is part of the
/// authentication contract; extending it breaks existing signatures.
const RESOURCE_LIST: [&str; 22] = [
    "acl",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// Verifies the `Authorization: AWS <access>:<signature>` header form.
pub fn verify_header_signature(req: &SignedRequest, cred: &Credential) -> Result<()> {
    let v2_auth = req.headers.get("Authorization").unwrap_or("");
    validate_v2_auth_header(v2_auth, cred)?;

    let (encoded_resource, encoded_query) = split_request_uri(&req.request_uri);
    let expected = signature_v2(&req.method, encoded_resource, encoded_query, &req.headers, cred);
    if !signatures_match(v2_auth, &expected) {
        return Err(AuthError::SignatureDoesNotMatch);
    }
    Ok(())
}

/// Verifies the presigned query-string form. `now_unix` is the caller's UTC
/// clock in seconds since the epoch.
pub fn verify_presigned_signature(
    req: &SignedRequest,
    cred: &Credential,
    now_unix: i64,
) -> Result<()> {
    let (encoded_resource, encoded_query) = split_request_uri(&req.request_uri);

    let mut filtered_queries: Vec<String> = Vec::new();
    let mut access_key = String::new();
    let mut got_signature = String::new();
    let mut expires = String::new();
    for query in encoded_query.split('&') {
        // A raw query with no segments yields one empty split; skip it.
        if query.is_empty() {
            continue;
        }
        let (key, value) = match query.split_once('=') {
            Some((key, value)) => (key, value),
            None => (query, ""),
        };
        match key {
            "AWSAccessKeyId" => access_key = unescape_or_reject(value)?,
            "Signature" => got_signature = unescape_or_reject(value)?,
            "Expires" => expires = unescape_or_reject(value)?,
            // Every other segment is decoded whole and kept, in order, for
            // the string to sign.
            _ => filtered_queries.push(unescape_or_reject(query)?),
        }
    }

    if access_key.is_empty() {
        return Err(AuthError::InvalidQueryParams);
    }
    if access_key != cred.access_key {
        return Err(AuthError::InvalidAccessKeyID);
    }

    let expires_int: i64 = expires.parse().map_err(|_| AuthError::MalformedExpires)?;
    if expires_int < now_unix {
        return Err(AuthError::ExpiredPresignRequest);
    }

    let string_to_sign = presign_v2_sts(
        &req.method,
        encoded_resource,
        &filtered_queries.join("&"),
        &req.headers,
        &expires,
    );
    let expected = calculate_signature_v2(&string_to_sign, &cred.secret_key);
    if !signatures_match(&got_signature, &expected) {
        return Err(AuthError::SignatureDoesNotMatch);
    }
    Ok(())
}

/// Verifies a POST-policy form: the signature covers the `Policy` form value
/// verbatim.
pub fn verify_post_policy_signature(form: &RequestHeaders, cred: &Credential) -> Result<()> {
    let access_key = form.get("AWSAccessKeyId").unwrap_or("");
    if access_key != cred.access_key {
        return Err(AuthError::InvalidAccessKeyID);
    }
    let policy = form.get("Policy").unwrap_or("");
    let signature = form.get("Signature").unwrap_or("");
    if !signatures_match(signature, &calculate_signature_v2(policy, &cred.secret_key)) {
        return Err(AuthError::SignatureDoesNotMatch);
    }
    Ok(())
}

// Authorization = "AWS" + " " + AccessKeyId + ":" + Signature
fn validate_v2_auth_header(v2_auth: &str, cred: &Credential) -> Result<()> {
    if v2_auth.is_empty() {
        return Err(AuthError::AuthHeaderEmpty);
    }
    if !v2_auth.starts_with(SIGN_V2_ALGORITHM) {
        return Err(AuthError::SignatureVersionNotSupported);
    }

    let auth_fields: Vec<&str> = v2_auth.split(' ').collect();
    if auth_fields.len() != 2 {
        return Err(AuthError::MissingFields);
    }

    let key_sign_fields: Vec<&str> = auth_fields[1].trim().split(':').collect();
    if key_sign_fields.len() != 2 {
        return Err(AuthError::MissingFields);
    }

    if key_sign_fields[0] != cred.access_key {
        return Err(AuthError::InvalidAccessKeyID);
    }
    Ok(())
}

fn split_request_uri(request_uri: &str) -> (&str, &str) {
    match request_uri.split_once('?') {
        Some((resource, query)) => (resource, query),
        None => (request_uri, ""),
    }
}

/// Signature = base64(HMAC-SHA1(secret, string-to-sign)).
pub(super) fn calculate_signature_v2(string_to_sign: &str, secret: &str) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .expect("hmac accepts keys of any length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Full authorization header value for the given request pieces.
fn signature_v2(
    method: &str,
    encoded_resource: &str,
    encoded_query: &str,
    headers: &RequestHeaders,
    cred: &Credential,
) -> String {
    let string_to_sign = sign_v2_sts(method, encoded_resource, encoded_query, headers);
    let signature = calculate_signature_v2(&string_to_sign, &cred.secret_key);
    format!("{SIGN_V2_ALGORITHM} {}:{signature}", cred.access_key)
}

fn signatures_match(got: &str, expected: &str) -> bool {
    got.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn unescape_or_reject(value: &str) -> Result<String> {
    query_unescape(value).ok_or_else(|| {
        tracing::warn!(value, "unable to unescape query value");
        AuthError::InvalidQueryParams
    })
}

/// URL-decodes a query value: `+` means space, `%XX` escapes must be two hex
/// digits, and the decoded bytes must be UTF-8.
fn query_unescape(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Lowercased `x-amz-*` headers, multi-values joined by commas, keys sorted,
/// emitted as `key:value` lines.
fn canonicalized_amz_headers(headers: &RequestHeaders) -> String {
    let mut keyval: Vec<(String, String)> = Vec::new();
    for (name, value) in headers.iter() {
        let lname = name.to_ascii_lowercase();
        if !lname.starts_with("x-amz-") {
            continue;
        }
        match keyval.iter_mut().find(|(key, _)| *key == lname) {
            Some((_, joined)) => {
                joined.push(',');
                joined.push_str(value);
            }
            None => keyval.push((lname, value.to_string())),
        }
    }
    keyval.sort_by(|(a, _), (b, _)| a.cmp(b));
    keyval
        .iter()
        .map(|(key, value)| format!("{key}:{value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The encoded path plus the surviving whitelisted sub-resources, in
/// whitelist order. Values are unescaped; a key with an empty value emits
/// just the key.
pub(super) fn canonicalized_resource(encoded_path: &str, encoded_query: &str) -> String {
    let mut keyval: Vec<(&str, &str)> = Vec::new();
    for query in encoded_query.split('&') {
        let (key, value) = match query.split_once('=') {
            Some((key, value)) => (key, value),
            None => (query, ""),
        };
        match keyval.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => keyval.push((key, value)),
        }
    }

    let mut canonical_queries: Vec<String> = Vec::new();
    for key in RESOURCE_LIST {
        let Some((_, value)) = keyval.iter().find(|(k, _)| *k == key) else {
            continue;
        };
        if value.is_empty() {
            canonical_queries.push(key.to_string());
            continue;
        }
        match query_unescape(value) {
            Some(unescaped) => canonical_queries.push(format!("{key}={unescaped}")),
            None => {
                tracing::warn!(key, value, "unable to unescape sub-resource value");
            }
        }
    }

    if canonical_queries.is_empty() {
        return encoded_path.to_string();
    }
    format!("{encoded_path}?{}", canonical_queries.join("&"))
}

// StringToSign = HTTP-Verb + "\n" +
//     Content-Md5 + "\n" +
//     Content-Type + "\n" +
//     Date + "\n" +
//     CanonicalizedAmzHeaders +
//     CanonicalizedResource
pub(super) fn sign_v2_sts(
    method: &str,
    encoded_resource: &str,
    encoded_query: &str,
    headers: &RequestHeaders,
) -> String {
    string_to_sign(
        method,
        encoded_resource,
        encoded_query,
        headers,
        headers.get("Date").unwrap_or(""),
    )
}

// Identical to the header form except that the `Expires` value takes the
// Date slot.
pub(super) fn presign_v2_sts(
    method: &str,
    encoded_resource: &str,
    encoded_query: &str,
    headers: &RequestHeaders,
    expires: &str,
) -> String {
    string_to_sign(method, encoded_resource, encoded_query, headers, expires)
}

fn string_to_sign(
    method: &str,
    encoded_resource: &str,
    encoded_query: &str,
    headers: &RequestHeaders,
    date: &str,
) -> String {
    let mut canonical_headers = canonicalized_amz_headers(headers);
    if !canonical_headers.is_empty() {
        canonical_headers.push('\n');
    }
    [
        method,
        headers.get("Content-MD5").unwrap_or(""),
        headers.get("Content-Type").unwrap_or(""),
        date,
        canonical_headers.as_str(),
    ]
    .join("\n")
        + &canonicalized_resource(encoded_resource, encoded_query)
}
