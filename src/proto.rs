//! Protocol structures of the Webauthn specification. These are the
//! JSON values a client (browser) submits to the server, and the binary
//! structures nested inside them.

use std::collections::BTreeMap;
use std::convert::TryFrom;

use base64urlsafedata::Base64UrlSafeData;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::crypto::compute_sha256;
use crate::cursor::BinaryCursor;
use crate::error::WebauthnError;

/// An identifier of an authenticator model, assigned by the FIDO
/// alliance.
pub type Aaguid = [u8; 16];

/// A policy for how user verification should be treated in a ceremony.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationPolicy {
    /// Require user verification. The ceremony fails if the
    /// authenticator did not verify the user.
    Required,
    /// Prefer user verification if possible, but do not fail the
    /// ceremony without it.
    Preferred,
    /// Do not request user verification. An authenticator that verifies
    /// the user anyway is still accepted.
    Discouraged,
}

/// The transports an authenticator may communicate over, as reported by
/// the client.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorTransport {
    /// Bluetooth Low Energy
    Ble,
    /// A hybrid (caBLE) transport, proximity proven over BLE
    Hybrid,
    /// A platform internal authenticator
    Internal,
    /// Near Field Communication
    Nfc,
    /// A smart card
    SmartCard,
    /// USB HID
    Usb,
}

/// A token binding structure from the collected client data.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenBinding {
    /// The status of the token binding
    pub status: String,
    /// The token binding id
    pub id: Option<String>,
}

/// The data collected by the client during a ceremony, signed over by
/// the authenticator as the client data hash.
#[derive(Debug, Deserialize, Clone)]
pub struct CollectedClientData {
    /// The ceremony type, "webauthn.create" or "webauthn.get".
    #[serde(rename = "type")]
    pub type_: String,
    /// The challenge the client signed over.
    pub challenge: Base64UrlSafeData,
    /// The origin the ceremony was performed within.
    pub origin: Url,
    /// The token binding state, if present.
    #[serde(rename = "tokenBinding")]
    pub token_binding: Option<TokenBinding>,
    /// Whether the ceremony was performed cross-origin.
    #[serde(rename = "crossOrigin")]
    pub cross_origin: Option<bool>,
    /// Any other keys the client emitted. Retained so the client data
    /// hash can be audited against its content.
    #[serde(flatten)]
    pub unknown_keys: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<&[u8]> for CollectedClientData {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<CollectedClientData, Self::Error> {
        let ccd: CollectedClientData = serde_json::from_slice(data)?;
        Ok(ccd)
    }
}

/// The raw form of an authenticator attestation response, as submitted
/// by the client during registration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthenticatorAttestationResponseRaw {
    /// The CBOR encoded attestation object.
    #[serde(rename = "attestationObject")]
    pub attestation_object: Base64UrlSafeData,
    /// The JSON encoded collected client data.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlSafeData,
    /// The transports the client believes the authenticator supports.
    #[serde(default)]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

/// A client's response to a registration challenge.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisterPublicKeyCredential {
    /// The base64url encoded credential id.
    pub id: String,
    /// The binary credential id.
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlSafeData,
    /// The attestation response.
    pub response: AuthenticatorAttestationResponseRaw,
    /// The credential type, always "public-key".
    #[serde(rename = "type")]
    pub type_: String,
}

/// The raw form of an authenticator assertion response, as submitted by
/// the client during authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthenticatorAssertionResponseRaw {
    /// The signed authenticator data.
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: Base64UrlSafeData,
    /// The JSON encoded collected client data.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlSafeData,
    /// The assertion signature.
    pub signature: Base64UrlSafeData,
    /// The user handle, if the authenticator disclosed one.
    #[serde(rename = "userHandle")]
    pub user_handle: Option<Base64UrlSafeData>,
}

/// A client's response to an authentication challenge.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublicKeyCredential {
    /// The base64url encoded credential id.
    pub id: String,
    /// The binary credential id.
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlSafeData,
    /// The assertion response.
    pub response: AuthenticatorAssertionResponseRaw,
    /// The credential type, always "public-key".
    #[serde(rename = "type")]
    pub type_: String,
}

/// The attestation format identifiers registered with IANA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationFormat {
    /// The packed format, used by most modern security keys.
    Packed,
    /// A TPM attestation, generally from Windows Hello.
    Tpm,
    /// Android SafetyNet JWS attestation.
    AndroidSafetyNet,
    /// Apple anonymous attestation.
    AppleAnonymous,
    /// The legacy FIDO U2F format.
    FIDOU2F,
    /// No attestation was provided.
    None,
    /// A format this library has no verifier for. Carried so the caller
    /// can observe what the authenticator claimed.
    Unsupported(String),
}

impl From<&str> for AttestationFormat {
    fn from(a: &str) -> AttestationFormat {
        match a {
            "packed" => AttestationFormat::Packed,
            "tpm" => AttestationFormat::Tpm,
            "android-safetynet" => AttestationFormat::AndroidSafetyNet,
            "apple" => AttestationFormat::AppleAnonymous,
            "fido-u2f" => AttestationFormat::FIDOU2F,
            "none" => AttestationFormat::None,
            other => AttestationFormat::Unsupported(other.to_string()),
        }
    }
}

/// The bit positions of the authenticator data flags byte.
#[allow(dead_code)]
mod authdata_flags {
    pub const USER_PRESENT: u8 = 0b0000_0001;
    pub const RFU1: u8 = 0b0000_0010;
    pub const USER_VERIFIED: u8 = 0b0000_0100;
    pub const BACKUP_ELIGIBLE: u8 = 0b0000_1000;
    pub const BACKUP_STATE: u8 = 0b0001_0000;
    pub const RFU2: u8 = 0b0010_0000;
    pub const ATTESTED_CRED_DATA: u8 = 0b0100_0000;
    pub const EXTENSION_DATA: u8 = 0b1000_0000;
}

/// Attested credential data, present in authenticator data when a new
/// credential was created.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    /// The guid of the authenticator model.
    pub aaguid: Aaguid,
    /// The credential id.
    pub credential_id: Base64UrlSafeData,
    /// The credential public key, still in CBOR form. Not all
    /// attestation formats require it to be a key type we can verify
    /// with, so parsing to a [crate::crypto::COSEKey] is deferred.
    pub credential_pk: serde_cbor_2::Value,
}

/// The parsed authenticator data from a registration or authentication
/// ceremony.
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    /// The sha256 of the relying party id the authenticator scoped this
    /// operation to.
    pub rp_id_hash: [u8; 32],
    /// The signature counter.
    pub counter: u32,
    /// Whether the user was present.
    pub user_present: bool,
    /// Whether the user was verified.
    pub user_verified: bool,
    /// Whether the credential is eligible for backup.
    pub backup_eligible: bool,
    /// Whether the credential is currently backed up.
    pub backup_state: bool,
    /// The attested credential data, when present.
    pub acd: Option<AttestedCredentialData>,
}

impl TryFrom<&[u8]> for AuthenticatorData {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<AuthenticatorData, Self::Error> {
        let mut cursor = BinaryCursor::new(data);

        let rp_id_hash: [u8; 32] = cursor
            .read(32)?
            .try_into()
            .map_err(|_| WebauthnError::ParseInsufficientBytesAvailable)?;
        let flags = cursor.read_u8()?;
        let counter = cursor.read_u32()?;

        let user_present = (flags & authdata_flags::USER_PRESENT) != 0;
        let user_verified = (flags & authdata_flags::USER_VERIFIED) != 0;
        let backup_eligible = (flags & authdata_flags::BACKUP_ELIGIBLE) != 0;
        let backup_state = (flags & authdata_flags::BACKUP_STATE) != 0;
        let attested = (flags & authdata_flags::ATTESTED_CRED_DATA) != 0;
        let extensions = (flags & authdata_flags::EXTENSION_DATA) != 0;

        // A credential can not be backed up without being eligible for
        // backup in the first place.
        if backup_state && !backup_eligible {
            return Err(WebauthnError::AuthenticatorDataInconsistentFlags);
        }

        // We have no extension processing, so we can not safely accept
        // extension data alongside attested credential data where it
        // could alter the meaning of the registration.
        if extensions && attested {
            return Err(WebauthnError::ExtensionDataUnsupported);
        }

        let acd = if attested {
            let aaguid: Aaguid = cursor
                .read(16)?
                .try_into()
                .map_err(|_| WebauthnError::ParseInsufficientBytesAvailable)?;
            let cred_id_len = cursor.read_u16()? as usize;
            let credential_id = cursor.read(cred_id_len)?;

            // The COSE key is self-delimiting CBOR. Decode one value
            // from the remainder and check its exact extent.
            let remaining = cursor.read_remaining();
            let mut deserializer = serde_cbor_2::Deserializer::from_slice(remaining);
            let credential_pk: serde_cbor_2::Value =
                serde::de::Deserialize::deserialize(&mut deserializer)?;
            let consumed = deserializer.byte_offset();
            if consumed != remaining.len() {
                return Err(WebauthnError::AuthenticatorDataTrailingBytes);
            }

            Some(AttestedCredentialData {
                aaguid,
                credential_id: credential_id.to_vec().into(),
                credential_pk,
            })
        } else if extensions {
            // Assertion extension outputs follow. We do not process
            // them, and their presence does not affect the checks we
            // perform, so skip them.
            let _ = cursor.read_remaining();
            None
        } else {
            if !cursor.is_empty() {
                return Err(WebauthnError::AuthenticatorDataTrailingBytes);
            }
            None
        };

        Ok(AuthenticatorData {
            rp_id_hash,
            counter,
            user_present,
            user_verified,
            backup_eligible,
            backup_state,
            acd,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AttestationObjectInner<'a> {
    #[serde(rename = "authData")]
    pub auth_data: &'a [u8],
    pub fmt: String,
    #[serde(rename = "attStmt")]
    pub att_stmt: serde_cbor_2::Value,
}

/// The decoded attestation object from a registration ceremony.
#[derive(Debug)]
pub struct AttestationObject {
    /// The parsed authenticator data.
    pub auth_data: AuthenticatorData,
    /// The raw authenticator data bytes, needed to reconstruct the
    /// signed payloads of the attestation statement.
    pub auth_data_bytes: Vec<u8>,
    /// The attestation format of the statement.
    pub fmt: AttestationFormat,
    /// The attestation statement, left in CBOR form for the
    /// format-specific verifier.
    pub att_stmt: serde_cbor_2::Value,
}

impl TryFrom<&[u8]> for AttestationObject {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<AttestationObject, Self::Error> {
        let aoi: AttestationObjectInner = serde_cbor_2::from_slice(data)?;
        let auth_data_bytes = aoi.auth_data.to_vec();
        let auth_data = AuthenticatorData::try_from(aoi.auth_data)?;

        Ok(AttestationObject {
            auth_data,
            auth_data_bytes,
            fmt: AttestationFormat::from(aoi.fmt.as_str()),
            att_stmt: aoi.att_stmt,
        })
    }
}

/// Compute the client data hash, the sha256 of the exact JSON bytes the
/// client submitted.
pub(crate) fn client_data_hash(client_data_bytes: &[u8]) -> [u8; 32] {
    compute_sha256(client_data_bytes)
}
