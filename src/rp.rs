//! Relying party identity. A ceremony is bound to a relying party id
//! and the web origins that are allowed to perform ceremonies for it.
//! The variants here cover a single site, a fixed set of sites, and
//! subdomain/port wildcarding for development setups.

use openssl::memcmp;
use url::Url;

use crate::crypto::compute_sha256;
use crate::error::{WebauthnError, WebauthnResult};

/// The identity checks a ceremony performs against its relying party.
pub trait RelyingParty {
    /// The relying party id credentials are scoped to.
    fn rp_id(&self) -> &str;

    /// The sha256 of the relying party id, compared against the
    /// authenticator data rpIdHash.
    fn rp_id_hash(&self) -> &[u8; 32];

    /// Whether a client data origin is acceptable for this relying
    /// party.
    fn origin_matches(&self, origin: &Url) -> bool;

    /// Compare a claimed rpIdHash in constant time.
    fn rp_id_hash_matches(&self, claimed: &[u8; 32]) -> bool {
        memcmp::eq(self.rp_id_hash(), claimed)
    }
}

/// Constant time equality of two origins in their ascii serialisation.
fn origin_eq(a: &Url, b: &Url) -> bool {
    let a = a.origin().ascii_serialization();
    let b = b.origin().ascii_serialization();
    a.len() == b.len() && memcmp::eq(a.as_bytes(), b.as_bytes())
}

/// An effective domain is valid for an rp id when it equals the rp id
/// or is a subdomain of it.
fn assert_domain_scope(origin: &Url, rp_id: &str) -> WebauthnResult<()> {
    match origin.domain() {
        Some(effective_domain) => {
            if effective_domain.ends_with(&format!(".{}", rp_id)) || effective_domain == rp_id {
                Ok(())
            } else {
                error!("rp_id is not an effective_domain of origin");
                Err(WebauthnError::Configuration)
            }
        }
        None => {
            // Domainless origins, generally ip addresses, must name
            // the rp id as their host outright.
            if origin.host_str() == Some(rp_id) {
                Ok(())
            } else {
                error!("origin has no effective domain for rp_id");
                Err(WebauthnError::Configuration)
            }
        }
    }
}

/// A relying party that serves exactly one origin.
#[derive(Debug, Clone)]
pub struct SingleOriginParty {
    rp_id: String,
    rp_id_hash: [u8; 32],
    origin: Url,
}

impl SingleOriginParty {
    /// Construct the identity, checking that the rp id is an effective
    /// domain of the origin.
    pub fn new(rp_id: &str, origin: Url) -> WebauthnResult<Self> {
        assert_domain_scope(&origin, rp_id)?;
        Ok(SingleOriginParty {
            rp_id: rp_id.to_string(),
            rp_id_hash: compute_sha256(rp_id.as_bytes()),
            origin,
        })
    }
}

impl RelyingParty for SingleOriginParty {
    fn rp_id(&self) -> &str {
        &self.rp_id
    }

    fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    fn origin_matches(&self, origin: &Url) -> bool {
        origin_eq(&self.origin, origin)
    }
}

/// A relying party reachable on a fixed set of origins, for example a
/// site with several country code domains sharing a credential store.
#[derive(Debug, Clone)]
pub struct MultiOriginParty {
    rp_id: String,
    rp_id_hash: [u8; 32],
    origins: Vec<Url>,
}

impl MultiOriginParty {
    /// Construct the identity. Every origin must be in scope for the
    /// rp id, and at least one origin is required.
    pub fn new(rp_id: &str, origins: Vec<Url>) -> WebauthnResult<Self> {
        if origins.is_empty() {
            return Err(WebauthnError::Configuration);
        }
        for origin in &origins {
            assert_domain_scope(origin, rp_id)?;
        }
        Ok(MultiOriginParty {
            rp_id: rp_id.to_string(),
            rp_id_hash: compute_sha256(rp_id.as_bytes()),
            origins,
        })
    }
}

impl RelyingParty for MultiOriginParty {
    fn rp_id(&self) -> &str {
        &self.rp_id
    }

    fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    fn origin_matches(&self, origin: &Url) -> bool {
        // Check every candidate so the work done does not depend on
        // which origin matches.
        self.origins
            .iter()
            .fold(false, |acc, o| origin_eq(o, origin) || acc)
    }
}

/// Hosts that browsers treat as secure contexts without https. Any
/// subdomain of localhost is in the family too.
fn is_localhost_family(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1") || host.ends_with(".localhost")
}

/// A relying party that accepts any https origin scoped to its rp id,
/// on any port. The localhost family is exempt from the https
/// requirement, matching how browsers treat secure contexts. Useful
/// when many first-party subdomains share credentials, or in
/// development where the port shifts.
#[derive(Debug, Clone)]
pub struct WildcardOriginParty {
    rp_id: String,
    rp_id_hash: [u8; 32],
}

impl WildcardOriginParty {
    /// Construct the identity for the given rp id.
    pub fn new(rp_id: &str) -> Self {
        WildcardOriginParty {
            rp_id: rp_id.to_string(),
            rp_id_hash: compute_sha256(rp_id.as_bytes()),
        }
    }
}

impl RelyingParty for WildcardOriginParty {
    fn rp_id(&self) -> &str {
        &self.rp_id
    }

    fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    fn origin_matches(&self, origin: &Url) -> bool {
        let host = match origin.host_str() {
            Some(h) => h,
            None => return false,
        };

        let scheme_ok = origin.scheme() == "https" || is_localhost_family(host);

        // Ipv6 hosts serialise in brackets, compare them stripped too.
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        let rp_id = self.rp_id.as_bytes();
        let host_ok = (host.len() == rp_id.len() && memcmp::eq(host.as_bytes(), rp_id))
            || (bare.len() == rp_id.len() && memcmp::eq(bare.as_bytes(), rp_id))
            || host.ends_with(&format!(".{}", self.rp_id));

        scheme_ok && host_ok
    }
}
