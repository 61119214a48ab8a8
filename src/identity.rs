//! Owner identity from bearer credentials.
//!
//! The token payload is decoded but its signature is **not** verified: the
//! owner id only namespaces snapshot storage, and the credential is expected
//! to have been authenticated upstream.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;

use crate::{
    error::{AppResult, unauthorized_error},
    store::check_path_segment
};

/// Namespace under which an identity's snapshots are stored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerId(String);

#[derive(Deserialize)]
struct Claims {
    sub: Option<serde_json::Value>
}

impl OwnerId {
    /// Owner id given directly
    ///
    /// # Errors
    ///
    /// Returns an input error if `id` is not usable as a path segment
    pub fn new(id: impl Into<String>) -> AppResult<Self> {
        let id = id.into();
        check_path_segment("owner id", &id)?;
        Ok(Self(id))
    }

    /// Owner from an `Authorization` header value (`Bearer <jwt>`)
    ///
    /// # Errors
    ///
    /// Returns an unauthorized error for a missing scheme or a bad token
    pub fn from_bearer(header: &str) -> AppResult<Self> {
        let header = header.trim();
        let token = header
            .get(..7)
            .filter(|scheme| scheme.eq_ignore_ascii_case("bearer "))
            .map(|_| header[7..].trim())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized_error("unauthorized"))?;
        owner_from_jwt(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read the `sub` claim of a three-part JWT.
///
/// ```
/// use schema_guard::identity::owner_from_jwt;
///
/// // {"alg":"none"} . {"sub":"user-42"} . sig
/// let token = "eyJhbGciOiJub25lIn0.eyJzdWIiOiJ1c2VyLTQyIn0.c2ln";
/// assert_eq!(owner_from_jwt(token).unwrap().as_str(), "user-42");
/// assert!(owner_from_jwt("not-a-token").is_err());
/// ```
///
/// # Errors
///
/// Returns an unauthorized error unless the token has three parts and its
/// payload is JSON carrying a non-empty string `sub`
pub fn owner_from_jwt(token: &str) -> AppResult<OwnerId> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    let [_, payload, _] = parts.as_slice() else {
        return Err(unauthorized_error("invalid_jwt"));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| unauthorized_error("invalid_jwt"))?;
    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|_| unauthorized_error("invalid_jwt"))?;
    let sub = match claims.sub {
        Some(serde_json::Value::String(sub)) if !sub.is_empty() => sub,
        _ => return Err(unauthorized_error("invalid_jwt"))
    };
    OwnerId::new(sub).map_err(|_| unauthorized_error("invalid_jwt"))
}
