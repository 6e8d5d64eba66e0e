//! Service identifier parsing and normalization utilities.
//!
//! Centralizes canonicalization so that the query text, the registry keys and
//! the rewriter all compare service identifiers with the same rules.
//!
//! ## Canonical form
//!
//! - surrounding whitespace is trimmed
//! - one pair of enclosing angle brackets (`<...>`) is stripped
//! - the URI scheme is lower-cased
//! - for `urn:` identifiers the namespace identifier (`urn:NID:`) is lower-cased
//!
//! Everything else is kept byte-for-byte. Two identifiers are equal iff their
//! canonical forms are byte-equal.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// URN scheme used for local service identifiers
pub const SERVICE_URI_SCHEME: &str = "urn";

/// Recommended prefix for local service identifiers
pub const SERVICE_URI_PREFIX: &str = "urn:localfed:service:";

/// A canonicalized service identifier
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceIri(Arc<str>);

impl ServiceIri {
    /// Canonicalize a raw identifier as it appears in query text or configuration.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let unwrapped = trimmed
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .unwrap_or(trimmed)
            .trim();

        if unwrapped.is_empty() {
            return Err(Error::invalid_service_iri(format!(
                "'{}' is empty after normalization",
                raw
            )));
        }

        Ok(Self(Arc::from(canonicalize(unwrapped))))
    }

    /// Canonical string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this identifier uses the local `urn:localfed:service:` scheme
    pub fn is_local_scheme(&self) -> bool {
        self.0.starts_with(SERVICE_URI_PREFIX)
    }

    /// Service name for local-scheme identifiers
    pub fn service_name(&self) -> Option<&str> {
        self.0.strip_prefix(SERVICE_URI_PREFIX)
    }
}

/// Lower-case the scheme, and the NID for URNs.
fn canonicalize(iri: &str) -> String {
    let Some(colon) = iri.find(':') else {
        return iri.to_string();
    };
    let (scheme, rest) = iri.split_at(colon);
    let scheme = scheme.to_ascii_lowercase();

    if scheme == SERVICE_URI_SCHEME {
        // rest = ":NID:NSS"
        let body = &rest[1..];
        if let Some(nid_end) = body.find(':') {
            let (nid, nss) = body.split_at(nid_end);
            return format!("{}:{}{}", scheme, nid.to_ascii_lowercase(), nss);
        }
    }
    format!("{}{}", scheme, rest)
}

/// Create a local service identifier from a bare service name.
///
/// ```
/// use localfed_core::service_iri::create_service_iri;
/// assert_eq!(create_service_iri("  vocab ").unwrap().as_str(), "urn:localfed:service:vocab");
/// ```
pub fn create_service_iri(service_name: &str) -> Result<ServiceIri> {
    let name = service_name.trim();
    if name.is_empty() {
        return Err(Error::invalid_service_name(
            "service name cannot be empty or whitespace",
        ));
    }
    ServiceIri::parse(&format!("{}{}", SERVICE_URI_PREFIX, name))
}

/// Check if a raw identifier follows the local service pattern.
pub fn is_local_service_iri(raw: &str) -> bool {
    ServiceIri::parse(raw)
        .map(|iri| iri.is_local_scheme())
        .unwrap_or(false)
}

/// Extract the service name from a local service identifier.
pub fn extract_service_name(raw: &str) -> Option<String> {
    let iri = ServiceIri::parse(raw).ok()?;
    iri.service_name().map(str::to_string)
}

impl fmt::Display for ServiceIri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ServiceIri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl std::str::FromStr for ServiceIri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for ServiceIri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ServiceIri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ServiceIri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ServiceIri::parse(&raw).map_err(serde::de::Error::custom)
    }
}
