//! The serialised credential storage format. A credential is packed to
//! a compact versioned binary record and wrapped in base64 so it can be
//! stored as an opaque string column.
//!
//! Version 1 records are `[ver][u16 id len][id][u32 key len][cose key]
//! [u32 sign count]`. Version 2 adds a state flags byte after the
//! version, moves the sign count before the key, and appends an
//! optional transports byte: `[ver][flags][u16 id len][id]
//! [u32 sign count][u32 key len][cose key][transports?]`. The high bit
//! of the version byte is reserved, so records from future revisions
//! fail loudly instead of being misread.

use std::convert::TryFrom;

use crate::constants::{
    CREDENTIAL_MAX_SIZE_BYTES, CREDENTIAL_VERSION_1, CREDENTIAL_VERSION_2,
    CREDENTIAL_VERSION_RESERVED_MASK,
};
use crate::crypto::COSEKey;
use crate::cursor::BinaryCursor;
use crate::error::{WebauthnError, WebauthnResult};
use crate::interface::{AttestationMetadata, Credential};
use crate::proto::{AuthenticatorTransport, UserVerificationPolicy};

// Version 2 state flags.
const FLAG_USER_VERIFIED: u8 = 0b0000_0001;
const FLAG_BACKUP_ELIGIBLE: u8 = 0b0000_0010;
const FLAG_BACKUP_STATE: u8 = 0b0000_0100;
const FLAG_TRANSPORTS: u8 = 0b0000_1000;

// Transport bits, in registry order.
const TRANSPORT_BITS: [(AuthenticatorTransport, u8); 6] = [
    (AuthenticatorTransport::Ble, 0b0000_0001),
    (AuthenticatorTransport::Hybrid, 0b0000_0010),
    (AuthenticatorTransport::Internal, 0b0000_0100),
    (AuthenticatorTransport::Nfc, 0b0000_1000),
    (AuthenticatorTransport::SmartCard, 0b0001_0000),
    (AuthenticatorTransport::Usb, 0b0010_0000),
];

fn transports_to_byte(transports: &[AuthenticatorTransport]) -> u8 {
    TRANSPORT_BITS
        .iter()
        .filter(|(t, _)| transports.contains(t))
        .fold(0, |acc, (_, bit)| acc | bit)
}

fn byte_to_transports(b: u8) -> WebauthnResult<Vec<AuthenticatorTransport>> {
    let known: u8 = TRANSPORT_BITS.iter().fold(0, |acc, (_, bit)| acc | bit);
    if b & !known != 0 {
        return Err(WebauthnError::CredentialCodecInvalid);
    }
    Ok(TRANSPORT_BITS
        .iter()
        .filter(|(_, bit)| b & bit != 0)
        .map(|(t, _)| *t)
        .collect())
}

/// Serialise a credential to its base64 wrapped storage record. Always
/// emits the current (version 2) format.
pub fn serialise_credential(cred: &Credential) -> WebauthnResult<String> {
    let raw = credential_to_bytes(cred)?;
    Ok(base64::encode(raw))
}

/// Deserialise a credential from its base64 wrapped storage record.
/// Accepts any record version this library has ever emitted.
pub fn deserialise_credential(record: &str) -> WebauthnResult<Credential> {
    let raw = base64::decode(record)?;
    credential_from_bytes(&raw)
}

pub(crate) fn credential_to_bytes(cred: &Credential) -> WebauthnResult<Vec<u8>> {
    let cose_bytes = serde_cbor_2::to_vec(&cred.cred.to_cbor_value()?)?;

    let id_len =
        u16::try_from(cred.cred_id.0.len()).map_err(|_| WebauthnError::CredentialCodecTooLarge)?;
    let key_len =
        u32::try_from(cose_bytes.len()).map_err(|_| WebauthnError::CredentialCodecTooLarge)?;

    let mut flags = 0;
    if cred.user_verified {
        flags |= FLAG_USER_VERIFIED;
    }
    if cred.backup_eligible {
        flags |= FLAG_BACKUP_ELIGIBLE;
    }
    if cred.backup_state {
        flags |= FLAG_BACKUP_STATE;
    }
    if cred.transports.is_some() {
        flags |= FLAG_TRANSPORTS;
    }

    let mut out = Vec::with_capacity(12 + cred.cred_id.0.len() + cose_bytes.len());
    out.push(CREDENTIAL_VERSION_2);
    out.push(flags);
    out.extend_from_slice(&id_len.to_be_bytes());
    out.extend_from_slice(cred.cred_id.0.as_slice());
    out.extend_from_slice(&cred.counter.to_be_bytes());
    out.extend_from_slice(&key_len.to_be_bytes());
    out.extend_from_slice(&cose_bytes);
    if let Some(transports) = &cred.transports {
        out.push(transports_to_byte(transports));
    }

    if out.len() > CREDENTIAL_MAX_SIZE_BYTES {
        return Err(WebauthnError::CredentialCodecTooLarge);
    }

    Ok(out)
}

pub(crate) fn credential_from_bytes(raw: &[u8]) -> WebauthnResult<Credential> {
    if raw.len() > CREDENTIAL_MAX_SIZE_BYTES {
        return Err(WebauthnError::CredentialCodecTooLarge);
    }

    let mut cursor = BinaryCursor::new(raw);
    let version = cursor.read_u8()?;

    if version & CREDENTIAL_VERSION_RESERVED_MASK != 0 {
        return Err(WebauthnError::CredentialCodecVersionUnsupported(version));
    }

    let cred = match version {
        CREDENTIAL_VERSION_1 => {
            let id_len = cursor.read_u16()? as usize;
            let cred_id = cursor.read(id_len)?.to_vec();
            let key_len = cursor.read_u32()? as usize;
            let cose_bytes = cursor.read(key_len)?;
            let counter = cursor.read_u32()?;

            let cose_value: serde_cbor_2::Value = serde_cbor_2::from_slice(cose_bytes)?;
            let cred = COSEKey::try_from(&cose_value)?;

            // Version 1 predates the state flags, so they default off.
            Credential {
                cred_id: cred_id.into(),
                cred,
                counter,
                user_verified: false,
                backup_eligible: false,
                backup_state: false,
                transports: None,
                registration_policy: UserVerificationPolicy::Preferred,
                attestation_metadata: AttestationMetadata::None,
            }
        }
        CREDENTIAL_VERSION_2 => {
            let flags = cursor.read_u8()?;
            if flags & !(FLAG_USER_VERIFIED | FLAG_BACKUP_ELIGIBLE | FLAG_BACKUP_STATE | FLAG_TRANSPORTS) != 0 {
                return Err(WebauthnError::CredentialCodecInvalid);
            }
            let id_len = cursor.read_u16()? as usize;
            let cred_id = cursor.read(id_len)?.to_vec();
            let counter = cursor.read_u32()?;
            let key_len = cursor.read_u32()? as usize;
            let cose_bytes = cursor.read(key_len)?;

            let transports = if flags & FLAG_TRANSPORTS != 0 {
                Some(byte_to_transports(cursor.read_u8()?)?)
            } else {
                None
            };

            let cose_value: serde_cbor_2::Value = serde_cbor_2::from_slice(cose_bytes)?;
            let cred = COSEKey::try_from(&cose_value)?;

            Credential {
                cred_id: cred_id.into(),
                cred,
                counter,
                user_verified: flags & FLAG_USER_VERIFIED != 0,
                backup_eligible: flags & FLAG_BACKUP_ELIGIBLE != 0,
                backup_state: flags & FLAG_BACKUP_STATE != 0,
                transports,
                registration_policy: UserVerificationPolicy::Preferred,
                attestation_metadata: AttestationMetadata::None,
            }
        }
        unknown => return Err(WebauthnError::CredentialCodecVersionUnsupported(unknown)),
    };

    if !cursor.is_empty() {
        return Err(WebauthnError::CredentialCodecInvalid);
    }

    Ok(cred)
}
