//! TPM 2.0 structures needed to verify a TPM attestation statement.
//! Layouts follow the TPM 2.0 Library specification part 2, all fields
//! big-endian.

use std::convert::TryFrom;

use crate::cursor::BinaryCursor;
use crate::error::{WebauthnError, WebauthnResult};

/// TPM_GENERATED_VALUE, the magic every attestation structure opens with.
pub(crate) const TPM_GENERATED_VALUE: u32 = 0xff54_4347;

/// TPM_ST, the structure tags we are willing to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TpmSt {
    /// TPM_ST_ATTEST_NV
    AttestNv = 0x8014,
    /// TPM_ST_ATTEST_COMMAND_AUDIT
    AttestCommandAudit = 0x8015,
    /// TPM_ST_ATTEST_SESSION_AUDIT
    AttestSessionAudit = 0x8016,
    /// TPM_ST_ATTEST_CERTIFY
    AttestCertify = 0x8017,
    /// TPM_ST_ATTEST_QUOTE
    AttestQuote = 0x8018,
    /// TPM_ST_ATTEST_TIME
    AttestTime = 0x8019,
    /// TPM_ST_ATTEST_CREATION
    AttestCreation = 0x801a,
}

impl TryFrom<u16> for TpmSt {
    type Error = WebauthnError;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        match v {
            0x8014 => Ok(TpmSt::AttestNv),
            0x8015 => Ok(TpmSt::AttestCommandAudit),
            0x8016 => Ok(TpmSt::AttestSessionAudit),
            0x8017 => Ok(TpmSt::AttestCertify),
            0x8018 => Ok(TpmSt::AttestQuote),
            0x8019 => Ok(TpmSt::AttestTime),
            0x801a => Ok(TpmSt::AttestCreation),
            _ => Err(WebauthnError::AttestationTpmStInvalid),
        }
    }
}

/// TPM_ALG_ID, the algorithm identifiers we are willing to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TpmAlgId {
    /// TPM_ALG_RSA
    Rsa = 0x0001,
    /// TPM_ALG_SHA1
    Sha1 = 0x0004,
    /// TPM_ALG_SHA256
    Sha256 = 0x000b,
    /// TPM_ALG_SHA384
    Sha384 = 0x000c,
    /// TPM_ALG_SHA512
    Sha512 = 0x000d,
    /// TPM_ALG_NULL
    Null = 0x0010,
    /// TPM_ALG_RSASSA
    RsaSsa = 0x0014,
    /// TPM_ALG_RSAPSS
    RsaPss = 0x0016,
    /// TPM_ALG_ECDSA
    EcDsa = 0x0018,
    /// TPM_ALG_ECC
    Ecc = 0x0023,
}

impl TryFrom<u16> for TpmAlgId {
    type Error = WebauthnError;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        match v {
            0x0001 => Ok(TpmAlgId::Rsa),
            0x0004 => Ok(TpmAlgId::Sha1),
            0x000b => Ok(TpmAlgId::Sha256),
            0x000c => Ok(TpmAlgId::Sha384),
            0x000d => Ok(TpmAlgId::Sha512),
            0x0010 => Ok(TpmAlgId::Null),
            0x0014 => Ok(TpmAlgId::RsaSsa),
            0x0016 => Ok(TpmAlgId::RsaPss),
            0x0018 => Ok(TpmAlgId::EcDsa),
            0x0023 => Ok(TpmAlgId::Ecc),
            _ => Err(WebauthnError::ParseNOMFailure),
        }
    }
}

/// A TPM2B sized buffer.
fn read_tpm2b<'a>(cursor: &mut BinaryCursor<'a>) -> WebauthnResult<&'a [u8]> {
    let size = cursor.read_u16()? as usize;
    cursor.read(size)
}

/// TPMS_CLOCK_INFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmsClockInfo {
    /// The TPM clock at the time of attestation
    pub clock: u64,
    /// The reset count
    pub reset_count: u32,
    /// The restart count
    pub restart_count: u32,
    /// Whether the clock is safe against rollback
    pub safe: bool,
}

impl TpmsClockInfo {
    fn parse(cursor: &mut BinaryCursor) -> WebauthnResult<Self> {
        let clock = cursor.read_u64()?;
        let reset_count = cursor.read_u32()?;
        let restart_count = cursor.read_u32()?;
        let safe = match cursor.read_u8()? {
            0 => false,
            1 => true,
            _ => return Err(WebauthnError::ParseNOMFailure),
        };
        Ok(TpmsClockInfo {
            clock,
            reset_count,
            restart_count,
            safe,
        })
    }
}

/// TPMU_ATTEST, the union of attestation bodies. Only the certify form
/// is meaningful to webauthn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmuAttest {
    /// TPMS_CERTIFY_INFO, the name and qualified name of the certified key
    AttestCertify(Vec<u8>, Vec<u8>),
    /// Any other attestation body. Present so parsing is total, but
    /// never accepted by the verifier.
    Invalid,
}

/// TPMS_ATTEST, the structure a TPM signs when certifying a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmsAttest {
    /// The structure tag. Must be AttestCertify for webauthn.
    pub type_: TpmSt,
    /// The qualified name of the signing key
    pub qualified_signer: Vec<u8>,
    /// Externally provided data, for webauthn the hash of the signed
    /// attestation payload
    pub extra_data: Option<Vec<u8>>,
    /// The TPM clock information
    pub clock_info: TpmsClockInfo,
    /// The TPM firmware version
    pub firmware_version: u64,
    /// The attestation body
    pub typeattested: TpmuAttest,
}

impl TryFrom<&[u8]> for TpmsAttest {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<TpmsAttest, Self::Error> {
        let mut cursor = BinaryCursor::new(data);

        let magic = cursor.read_u32()?;
        if magic != TPM_GENERATED_VALUE {
            return Err(WebauthnError::ParseNOMFailure);
        }

        let type_ = TpmSt::try_from(cursor.read_u16()?)?;
        let qualified_signer = read_tpm2b(&mut cursor)?.to_vec();
        let extra_data = {
            let d = read_tpm2b(&mut cursor)?;
            if d.is_empty() {
                None
            } else {
                Some(d.to_vec())
            }
        };
        let clock_info = TpmsClockInfo::parse(&mut cursor)?;
        let firmware_version = cursor.read_u64()?;

        let typeattested = match type_ {
            TpmSt::AttestCertify => {
                let name = read_tpm2b(&mut cursor)?.to_vec();
                let qualified_name = read_tpm2b(&mut cursor)?.to_vec();
                TpmuAttest::AttestCertify(name, qualified_name)
            }
            _ => TpmuAttest::Invalid,
        };

        if !cursor.is_empty() {
            return Err(WebauthnError::ParseNOMFailure);
        }

        Ok(TpmsAttest {
            type_,
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            typeattested,
        })
    }
}

/// TPMU_PUBLIC_PARMS
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmuPublicParms {
    /// TPMS_RSA_PARMS
    Rsa {
        /// The scheme, TPM_ALG_NULL for a general purpose key
        scheme: TpmAlgId,
        /// The size of the modulus in bits
        key_bits: u16,
        /// The public exponent, 0 meaning the default of 2^16 + 1
        exponent: u32,
    },
    /// TPMS_ECC_PARMS
    Ecc {
        /// The scheme
        scheme: TpmAlgId,
        /// The TPM_ECC_CURVE identifier
        curve_id: u16,
    },
}

/// TPMU_PUBLIC_ID, the unique public key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmuPublicId {
    /// An RSA modulus
    Rsa(Vec<u8>),
    /// EC affine coordinates
    Ecc {
        /// The x coordinate
        x: Vec<u8>,
        /// The y coordinate
        y: Vec<u8>,
    },
}

/// TPMT_PUBLIC, the public area of a TPM key object. The name the TPM
/// certifies is a hash of these exact bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmtPublic {
    /// The key algorithm
    pub type_: TpmAlgId,
    /// The algorithm used to compute the object name
    pub name_alg: TpmAlgId,
    /// TPMA_OBJECT attribute flags
    pub object_attributes: u32,
    /// The policy digest controlling key use
    pub auth_policy: Vec<u8>,
    /// The algorithm parameters
    pub parameters: TpmuPublicParms,
    /// The public key material
    pub unique: TpmuPublicId,
}

impl TryFrom<&[u8]> for TpmtPublic {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<TpmtPublic, Self::Error> {
        let mut cursor = BinaryCursor::new(data);

        let type_ = TpmAlgId::try_from(cursor.read_u16()?)?;
        let name_alg = TpmAlgId::try_from(cursor.read_u16()?)?;
        let object_attributes = cursor.read_u32()?;
        let auth_policy = read_tpm2b(&mut cursor)?.to_vec();

        let (parameters, unique) = match type_ {
            TpmAlgId::Rsa => {
                // TPMS_RSA_PARMS. A storage key would carry a full
                // TPMT_SYM_DEF_OBJECT, a signing key has TPM_ALG_NULL.
                // We only deal with signing keys.
                let symmetric = TpmAlgId::try_from(cursor.read_u16()?)?;
                if symmetric != TpmAlgId::Null {
                    return Err(WebauthnError::ParseNOMFailure);
                }
                let scheme = TpmAlgId::try_from(cursor.read_u16()?)?;
                if scheme != TpmAlgId::Null {
                    // A non-null scheme carries its own hash alg.
                    let _hash = TpmAlgId::try_from(cursor.read_u16()?)?;
                }
                let key_bits = cursor.read_u16()?;
                let exponent = cursor.read_u32()?;
                let modulus = read_tpm2b(&mut cursor)?.to_vec();
                (
                    TpmuPublicParms::Rsa {
                        scheme,
                        key_bits,
                        exponent,
                    },
                    TpmuPublicId::Rsa(modulus),
                )
            }
            TpmAlgId::Ecc => {
                // TPMS_ECC_PARMS
                let symmetric = TpmAlgId::try_from(cursor.read_u16()?)?;
                if symmetric != TpmAlgId::Null {
                    return Err(WebauthnError::ParseNOMFailure);
                }
                let scheme = TpmAlgId::try_from(cursor.read_u16()?)?;
                if scheme != TpmAlgId::Null {
                    let _hash = TpmAlgId::try_from(cursor.read_u16()?)?;
                }
                let curve_id = cursor.read_u16()?;
                let kdf = TpmAlgId::try_from(cursor.read_u16()?)?;
                if kdf != TpmAlgId::Null {
                    return Err(WebauthnError::ParseNOMFailure);
                }
                let x = read_tpm2b(&mut cursor)?.to_vec();
                let y = read_tpm2b(&mut cursor)?.to_vec();
                (
                    TpmuPublicParms::Ecc { scheme, curve_id },
                    TpmuPublicId::Ecc { x, y },
                )
            }
            _ => return Err(WebauthnError::ParseNOMFailure),
        };

        if !cursor.is_empty() {
            return Err(WebauthnError::ParseNOMFailure);
        }

        Ok(TpmtPublic {
            type_,
            name_alg,
            object_attributes,
            auth_policy,
            parameters,
            unique,
        })
    }
}

/// TPMT_SIGNATURE. Attestation statements in the wild carry the raw
/// signature bytes rather than the tagged structure, so parsing falls
/// back to treating the input as a bare signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmtSignature {
    /// Signature bytes without TPM framing
    RawSignature(Vec<u8>),
}

impl TryFrom<&[u8]> for TpmtSignature {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<TpmtSignature, Self::Error> {
        Ok(TpmtSignature::RawSignature(data.to_vec()))
    }
}
