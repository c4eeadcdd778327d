//! Types the caller holds on to between ceremonies. The `Credential` is
//! the item you persist in your database, everything else is handed
//! back from a ceremony for you to act on.

use base64urlsafedata::Base64UrlSafeData;
use openssl::x509;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::CHALLENGE_SIZE_BYTES;
use crate::crypto::COSEKey;
use crate::proto::{AuthenticatorTransport, UserVerificationPolicy};

/// A challenge issued to a client for a single ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge(pub Base64UrlSafeData);

impl Challenge {
    /// Generate a new random challenge.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let c: Vec<u8> = (0..CHALLENGE_SIZE_BYTES).map(|_| rng.gen()).collect();
        Challenge(c.into())
    }
}

impl From<Vec<u8>> for Challenge {
    fn from(v: Vec<u8>) -> Self {
        Challenge(v.into())
    }
}

impl AsRef<[u8]> for Challenge {
    fn as_ref(&self) -> &[u8] {
        self.0 .0.as_slice()
    }
}

/// The set of challenges that are outstanding. A challenge must be
/// remembered when issued, and is consumed exactly once when the
/// client's response arrives. A challenge that was never remembered,
/// was already consumed, or has expired must not consume.
pub trait ChallengeRegistry {
    /// Record a newly issued challenge.
    fn remember_challenge(&self, challenge: Challenge);

    /// Atomically look up and remove the challenge. Returns true only
    /// if the challenge was outstanding, so a second consume of the
    /// same value always returns false.
    fn consume_challenge(&self, challenge: &[u8]) -> bool;
}

/// How a regressed signature counter is treated during authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterRegressionPolicy {
    /// Fail the ceremony. A regressed counter means a cloned
    /// authenticator is a real possibility.
    #[default]
    HardReject,
    /// Complete the ceremony but report the regression on the result so
    /// the caller can flag the account.
    FlagAndContinue,
}

/// Format specific information extracted from a verified attestation
/// statement. May inform authenticator allow-listing decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationMetadata {
    /// The attestation carried no usable metadata.
    None,
    /// Packed attestation.
    Packed {
        /// The authenticator model aaguid
        aaguid: Uuid,
    },
    /// TPM attestation.
    Tpm {
        /// The authenticator model aaguid
        aaguid: Uuid,
        /// The TPM firmware version
        firmware_version: u64,
    },
    /// Android SafetyNet attestation.
    AndroidSafetyNet {
        /// The name of the apk that requested the attestation
        apk_package_name: String,
        /// The sha256 digests of the requesting apk's signing certificates
        apk_certificate_digest_sha256: Vec<Base64UrlSafeData>,
        /// Whether the device passed the compatibility test suite
        cts_profile_match: bool,
        /// Whether the device passed basic integrity checks
        basic_integrity: bool,
        /// How the attestation was evaluated
        evaluation_type: Option<String>,
    },
}

/// The attestation type and trust path that a verified attestation
/// statement conveyed, per the levels defined in the W3C specification.
#[derive(Debug, Clone)]
pub enum ParsedAttestationData {
    /// The credential is authenticated by a signing key the vendor
    /// burned into the device batch.
    Basic(Vec<x509::X509>),
    /// The credential is authenticated using its own key pair and no
    /// third party vouches for it.
    Self_,
    /// An authority chain issued the attestation certificate.
    AttCa(Vec<x509::X509>),
    /// An anonymization CA issued the attestation certificate.
    AnonCa(Vec<x509::X509>),
    /// No attestation was conveyed.
    None,
    /// The attestation could not be interpreted, either because the
    /// format is unknown to this library or the statement was opted out
    /// of verification.
    Uncertain,
}

/// A registered credential, the item to persist and supply back for
/// authentication ceremonies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// The credential id as issued by the authenticator.
    pub cred_id: Base64UrlSafeData,
    /// The public key of this credential.
    pub cred: COSEKey,
    /// The signature counter at the last successful ceremony.
    pub counter: u32,
    /// Whether the user was verified when this credential registered.
    pub user_verified: bool,
    /// Whether this credential may be backed up (synced) by the
    /// authenticator platform.
    pub backup_eligible: bool,
    /// Whether this credential was backed up at the last ceremony.
    pub backup_state: bool,
    /// The transports the client reported at registration, if any.
    pub transports: Option<Vec<AuthenticatorTransport>>,
    /// The verification policy this credential registered under.
    /// Needed to interpret `Preferred` consistently at authentication.
    pub registration_policy: UserVerificationPolicy,
    /// Metadata from the verified attestation statement. Not part of
    /// the serialised storage record.
    pub attestation_metadata: AttestationMetadata,
}

impl Credential {
    /// Apply the outcome of an authentication ceremony to this
    /// credential. Returns `None` if the result belongs to a different
    /// credential, else whether anything changed and the stored record
    /// needs to be written back.
    pub fn update(&mut self, res: &AuthenticationResult) -> Option<bool> {
        if res.cred_id != self.cred_id {
            return None;
        }
        let mut changed = false;
        if res.counter > self.counter {
            self.counter = res.counter;
            changed = true;
        }
        if res.backup_state != self.backup_state {
            self.backup_state = res.backup_state;
            changed = true;
        }
        Some(changed)
    }
}

/// The outcome of a successful registration ceremony.
#[derive(Debug)]
pub struct RegistrationResult {
    /// The credential to persist.
    pub credential: Credential,
    /// The attestation type and trust path conveyed. Inspect this if
    /// you intend to restrict which authenticators may register.
    pub attestation: ParsedAttestationData,
}

/// The outcome of a successful authentication ceremony. Apply
/// `counter`, and `backup_state` to the stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    /// The id of the credential that authenticated.
    pub cred_id: Base64UrlSafeData,
    /// The signature counter after this ceremony.
    pub counter: u32,
    /// Whether the user was verified in this ceremony.
    pub user_verified: bool,
    /// The credential's backup state in this ceremony.
    pub backup_state: bool,
    /// True when the counter regressed and the policy was
    /// [CounterRegressionPolicy::FlagAndContinue].
    pub counter_regression: bool,
}
