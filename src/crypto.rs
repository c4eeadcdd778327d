//! Cryptographic operation wrapper providing COSE key parsing and
//! signature verification on top of OpenSSL.

use std::collections::BTreeMap;
use std::convert::TryFrom;

use base64urlsafedata::Base64UrlSafeData;
use openssl::{bn, ec, hash::MessageDigest, nid, pkey, rsa, sha, sign, x509};
use serde::{Deserialize, Serialize};

use crate::error::{WebauthnError, WebauthnResult};

// Why OpenSSL over another rust crate?
// - The openssl crate allows us to reconstruct a public key from the
//   x/y group coords, where most others want a pkcs formatted structure. As
//   a result, it's easiest to use openssl as it gives us exactly what we need
//   for these operations.

/// Compute the sha256 of a byte slice.
pub fn compute_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = sha::Sha256::new();
    hasher.update(data);
    hasher.finish()
}

/// A COSE signature algorithm identifier.
///
/// Only the algorithms this library can verify are representable. Any
/// other registry value fails to parse with `COSEKeyInvalidAlgorithm`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum COSEAlgorithm {
    /// Identifies this key as ECDSA over P-256 with SHA-256
    ES256,
    /// Identifies this key as RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
}

impl COSEAlgorithm {
    /// The IANA COSE algorithm registry value.
    pub fn to_i128(self) -> i128 {
        match self {
            COSEAlgorithm::ES256 => -7,
            COSEAlgorithm::RS256 => -257,
        }
    }
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = WebauthnError;

    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            -7 => Ok(COSEAlgorithm::ES256),
            -257 => Ok(COSEAlgorithm::RS256),
            _ => Err(WebauthnError::COSEKeyInvalidAlgorithm),
        }
    }
}

/// An EC curve identifier from the COSE elliptic curves registry.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ECDSACurve {
    /// Identifies this curve as SECP256R1 (X9_62_PRIME256V1 in OpenSSL)
    SECP256R1 = 1,
}

impl ECDSACurve {
    fn to_openssl_nid(self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
        }
    }

    /// The size in bytes of an affine coordinate on this curve.
    pub fn coordinate_size(&self) -> usize {
        match self {
            ECDSACurve::SECP256R1 => 32,
        }
    }
}

impl TryFrom<i128> for ECDSACurve {
    type Error = WebauthnError;

    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(ECDSACurve::SECP256R1),
            _ => Err(WebauthnError::COSEKeyECDSAInvalidCurve),
        }
    }
}

/// A COSE Elliptic Curve Public Key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct COSEEC2Key {
    /// The curve that this key references.
    pub curve: ECDSACurve,
    /// The key's public X coordinate.
    pub x: Base64UrlSafeData,
    /// The key's public Y coordinate.
    pub y: Base64UrlSafeData,
}

/// A COSE RSA public key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct COSERSAKey {
    /// An RSA modulus.
    pub n: Base64UrlSafeData,
    /// An RSA exponent.
    pub e: [u8; 3],
}

/// The type of a COSE key and its parameters.
#[allow(non_camel_case_types)]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum COSEKeyType {
    /// Identifies this as an Elliptic Curve public key.
    EC_EC2(COSEEC2Key),
    /// Identifies this as an RSA public key.
    RSA(COSERSAKey),
}

/// The numeric id of a COSE key type.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum COSEKeyTypeId {
    /// Octet Key Pair
    EC_OKP = 1,
    /// Elliptic Curve Keys w/ x and y coordinates
    EC_EC2 = 2,
    /// RSA
    EC_RSA = 3,
}

/// A COSE public key as described by the W3C Webauthn specification,
/// restricted to the key types this library is able to verify.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct COSEKey {
    /// The signature algorithm this key is used with.
    pub type_: COSEAlgorithm,
    /// The public key.
    pub key: COSEKeyType,
}

impl TryFrom<&serde_cbor_2::Value> for COSEKey {
    type Error = WebauthnError;

    fn try_from(d: &serde_cbor_2::Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d)?;

        // https://datatracker.ietf.org/doc/html/rfc8152#section-7
        // label 1 is the key type, label 3 the algorithm.
        let key_type_value = m
            .get(&serde_cbor_2::Value::Integer(1))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let key_type = cbor_try_i128!(key_type_value)?;

        let content_type_value = m
            .get(&serde_cbor_2::Value::Integer(3))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let content_type = cbor_try_i128!(content_type_value)?;
        let type_ = COSEAlgorithm::try_from(content_type)?;

        if key_type == (COSEKeyTypeId::EC_EC2 as i128) {
            if type_ != COSEAlgorithm::ES256 {
                return Err(WebauthnError::COSEKeyInvalidAlgorithm);
            }

            // https://datatracker.ietf.org/doc/html/rfc8152#section-13.1.1
            let curve_type_value = m
                .get(&serde_cbor_2::Value::Integer(-1))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let curve_type = cbor_try_i128!(curve_type_value)?;
            let curve = ECDSACurve::try_from(curve_type)?;

            let x_value = m
                .get(&serde_cbor_2::Value::Integer(-2))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let x = cbor_try_bytes!(x_value)?;

            let y_value = m
                .get(&serde_cbor_2::Value::Integer(-3))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let y = cbor_try_bytes!(y_value)?;

            if x.len() != curve.coordinate_size() || y.len() != curve.coordinate_size() {
                return Err(WebauthnError::COSEKeyECDSAXYInvalid);
            }

            let cose_key = COSEKey {
                type_,
                key: COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: x.to_vec().into(),
                    y: y.to_vec().into(),
                }),
            };

            // Ensure the coordinates actually name a point on the
            // claimed curve before we accept the key.
            cose_key.validate()?;
            Ok(cose_key)
        } else if key_type == (COSEKeyTypeId::EC_RSA as i128) {
            if type_ != COSEAlgorithm::RS256 {
                return Err(WebauthnError::COSEKeyInvalidAlgorithm);
            }

            // https://datatracker.ietf.org/doc/html/rfc8230#section-4
            let n_value = m
                .get(&serde_cbor_2::Value::Integer(-1))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let n = cbor_try_bytes!(n_value)?;

            let e_value = m
                .get(&serde_cbor_2::Value::Integer(-2))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let e = cbor_try_bytes!(e_value)?;

            if n.len() != 256 || e.len() != 3 {
                return Err(WebauthnError::COSEKeyRSANEInvalid);
            }

            let mut e_temp = [0; 3];
            e_temp.copy_from_slice(e.as_slice());

            let cose_key = COSEKey {
                type_,
                key: COSEKeyType::RSA(COSERSAKey {
                    n: n.to_vec().into(),
                    e: e_temp,
                }),
            };

            cose_key.validate()?;
            Ok(cose_key)
        } else {
            // OKP, symmetric and reserved key types.
            Err(WebauthnError::COSEKeyInvalidType)
        }
    }
}

impl TryFrom<(COSEAlgorithm, &x509::X509)> for COSEKey {
    type Error = WebauthnError;

    fn try_from((alg, pubk): (COSEAlgorithm, &x509::X509)) -> Result<COSEKey, Self::Error> {
        let pkey = pubk.public_key()?;
        match alg {
            COSEAlgorithm::ES256 => {
                let ec_key = pkey
                    .ec_key()
                    .map_err(|_| WebauthnError::CertificatePublicKeyInvalid)?;
                ec_key.check_key()?;
                let ec_grpref = ec_key.group();

                let curve_nid = ec_grpref
                    .curve_name()
                    .ok_or(WebauthnError::OpenSSLErrorNoCurveName)?;
                if curve_nid != nid::Nid::X9_62_PRIME256V1 {
                    return Err(WebauthnError::COSEKeyECDSAInvalidCurve);
                }

                let mut ctx = bn::BigNumContext::new()?;
                let mut xbn = bn::BigNum::new()?;
                let mut ybn = bn::BigNum::new()?;
                ec_key
                    .public_key()
                    .affine_coordinates_gfp(ec_grpref, &mut xbn, &mut ybn, &mut ctx)?;

                Ok(COSEKey {
                    type_: alg,
                    key: COSEKeyType::EC_EC2(COSEEC2Key {
                        curve: ECDSACurve::SECP256R1,
                        x: xbn.to_vec_padded(32)?.into(),
                        y: ybn.to_vec_padded(32)?.into(),
                    }),
                })
            }
            COSEAlgorithm::RS256 => {
                let rsa_key = pkey
                    .rsa()
                    .map_err(|_| WebauthnError::CertificatePublicKeyInvalid)?;
                let n = rsa_key.n().to_vec();
                let e = rsa_key.e().to_vec();
                if n.len() != 256 || e.is_empty() || e.len() > 3 {
                    return Err(WebauthnError::COSEKeyRSANEInvalid);
                }
                let mut e_temp = [0; 3];
                e_temp[3 - e.len()..].copy_from_slice(e.as_slice());

                Ok(COSEKey {
                    type_: alg,
                    key: COSEKeyType::RSA(COSERSAKey {
                        n: n.into(),
                        e: e_temp,
                    }),
                })
            }
        }
    }
}

impl COSEKey {
    /// Re-encode this key to its canonical CBOR map form, as it appears
    /// inside attested credential data.
    pub fn to_cbor_value(&self) -> WebauthnResult<serde_cbor_2::Value> {
        let mut map = BTreeMap::new();
        map.insert(
            serde_cbor_2::Value::Integer(3),
            serde_cbor_2::Value::Integer(self.type_.to_i128()),
        );
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                map.insert(
                    serde_cbor_2::Value::Integer(1),
                    serde_cbor_2::Value::Integer(COSEKeyTypeId::EC_EC2 as i128),
                );
                map.insert(
                    serde_cbor_2::Value::Integer(-1),
                    serde_cbor_2::Value::Integer(ec2k.curve as i128),
                );
                map.insert(
                    serde_cbor_2::Value::Integer(-2),
                    serde_cbor_2::Value::Bytes(ec2k.x.0.clone()),
                );
                map.insert(
                    serde_cbor_2::Value::Integer(-3),
                    serde_cbor_2::Value::Bytes(ec2k.y.0.clone()),
                );
            }
            COSEKeyType::RSA(rsak) => {
                map.insert(
                    serde_cbor_2::Value::Integer(1),
                    serde_cbor_2::Value::Integer(COSEKeyTypeId::EC_RSA as i128),
                );
                map.insert(
                    serde_cbor_2::Value::Integer(-1),
                    serde_cbor_2::Value::Bytes(rsak.n.0.clone()),
                );
                map.insert(
                    serde_cbor_2::Value::Integer(-2),
                    serde_cbor_2::Value::Bytes(rsak.e.to_vec()),
                );
            }
        }
        Ok(serde_cbor_2::Value::Map(map))
    }

    /// Retrieve the public key as an OpenSSL structure.
    pub fn get_openssl_pkey(&self) -> WebauthnResult<pkey::PKey<pkey::Public>> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let ec_group = ec::EcGroup::from_curve_name(ec2k.curve.to_openssl_nid())?;
                let xbn = bn::BigNum::from_slice(ec2k.x.0.as_slice())?;
                let ybn = bn::BigNum::from_slice(ec2k.y.0.as_slice())?;
                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)?;
                ec_key.check_key()?;
                let p = pkey::PKey::from_ec_key(ec_key)?;
                Ok(p)
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = bn::BigNum::from_slice(rsak.n.0.as_slice())?;
                let ebn = bn::BigNum::from_slice(&rsak.e)?;
                let rsa_key = rsa::Rsa::from_public_components(nbn, ebn)?;
                let p = pkey::PKey::from_rsa(rsa_key)?;
                Ok(p)
            }
        }
    }

    /// Validate that the key parameters are coherent and usable.
    pub fn validate(&self) -> WebauthnResult<()> {
        self.get_openssl_pkey().map(|_| ())
    }

    /// Verify a signature over `verification_data` with this key.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> WebauthnResult<bool> {
        let pkey = self.get_openssl_pkey()?;
        let mut verifier = sign::Verifier::new(MessageDigest::sha256(), &pkey)?;
        verifier.update(verification_data)?;
        verifier.verify(signature).map_err(WebauthnError::from)
    }
}

impl COSEKey {
    /// The concatenation 0x04 || x || y, the raw ANSI X9.62 form a U2F
    /// signature is computed over.
    pub(crate) fn get_alg_key_ecc_x962_raw(&self) -> WebauthnResult<Vec<u8>> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let r: [u8; 1] = [0x04];
                Ok(r.iter()
                    .chain(ecpk.x.0.iter())
                    .chain(ecpk.y.0.iter())
                    .copied()
                    .collect())
            }
            _ => Err(WebauthnError::COSEKeyInvalidType),
        }
    }
}

/// Verify that attestnCert meets the requirements in § 8.2.1 Packed
/// Attestation Statement Certificate Requirements.
/// <https://w3c.github.io/webauthn/#sctn-packed-attestation-cert-requirements>
pub(crate) fn assert_packed_attest_req(pubk: &x509::X509) -> WebauthnResult<()> {
    use x509_parser::extensions::ParsedExtension;
    use x509_parser::x509::X509Version;

    let der_bytes = pubk.to_der()?;
    let x509_cert = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?
        .1;

    // Version MUST be set to 3 (which is indicated by an ASN.1 INTEGER
    // with value 2).
    if x509_cert.version() != X509Version::V3 {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // Subject field MUST be set to:
    //
    // Subject-C
    //  ISO 3166 code specifying the country where the Authenticator vendor is incorporated (PrintableString)
    // Subject-O
    //  Legal name of the Authenticator vendor (UTF8String)
    // Subject-OU
    //  Literal string "Authenticator Attestation" (UTF8String)
    // Subject-CN
    //  A UTF8String of the vendor's choosing
    let subject_name_ref = pubk.subject_name();

    let subject_c = subject_name_ref
        .entries_by_nid(nid::Nid::COUNTRYNAME)
        .take(1)
        .next();
    let subject_o = subject_name_ref
        .entries_by_nid(nid::Nid::ORGANIZATIONNAME)
        .take(1)
        .next();
    let subject_ou = subject_name_ref
        .entries_by_nid(nid::Nid::ORGANIZATIONALUNITNAME)
        .take(1)
        .next();
    let subject_cn = subject_name_ref
        .entries_by_nid(nid::Nid::COMMONNAME)
        .take(1)
        .next();

    if subject_c.is_none() || subject_o.is_none() || subject_cn.is_none() {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    #[allow(deprecated)]
    match subject_ou {
        Some(ou) => match ou.data().as_utf8() {
            Ok(ou_d) => {
                if ou_d.to_string() != "Authenticator Attestation" {
                    return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
                }
            }
            Err(_) => return Err(WebauthnError::AttestationCertificateRequirementsNotMet),
        },
        None => return Err(WebauthnError::AttestationCertificateRequirementsNotMet),
    }

    // The Basic Constraints extension MUST have the CA component set to false.
    let ca = x509_cert
        .extensions()
        .iter()
        .find_map(|extension| match extension.parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => Some(bc.ca),
            _ => None,
        })
        .unwrap_or(false);

    if ca {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // An Authority Information Access (AIA) extension with entry id-ad-ocsp and a CRL
    // Distribution Point extension are both OPTIONAL as the status of many
    // attestation certificates is available through authenticator metadata services.
    Ok(())
}

pub(crate) const TCG_AT_TPM_MANUFACTURER: der_parser::oid::Oid<'static> =
    der_parser::oid!(2.23.133 .2 .1);
pub(crate) const TCG_AT_TPM_MODEL: der_parser::oid::Oid<'static> =
    der_parser::oid!(2.23.133 .2 .2);
pub(crate) const TCG_AT_TPM_VERSION: der_parser::oid::Oid<'static> =
    der_parser::oid!(2.23.133 .2 .3);
pub(crate) const TCG_KP_AIK_CERTIFICATE: der_parser::oid::Oid<'static> =
    der_parser::oid!(2.23.133 .8 .3);

/// Verify that aikCert meets the requirements in § 8.3.1 TPM Attestation
/// Statement Certificate Requirements.
/// <https://w3c.github.io/webauthn/#sctn-tpm-cert-requirements>
pub(crate) fn assert_tpm_attest_req(pubk: &x509::X509) -> WebauthnResult<()> {
    use x509_parser::extensions::{GeneralName, ParsedExtension};
    use x509_parser::x509::X509Version;

    let der_bytes = pubk.to_der()?;
    let x509_cert = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?
        .1;

    // Version MUST be set to 3.
    if x509_cert.version() != X509Version::V3 {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // Subject field MUST be set to empty.
    if x509_cert.subject().iter_attributes().next().is_some() {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // The Subject Alternative Name extension MUST be set as defined in
    // [TPMv2-EK-Profile] section 3.2.9, carrying the TPM manufacturer,
    // part number and firmware version as directory names.
    let san_ok = x509_cert
        .extensions()
        .iter()
        .find_map(|extension| match extension.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => Some((extension.critical, san)),
            _ => None,
        })
        .map(|(critical, san)| {
            // Since the subject is empty, the SAN must be marked critical.
            let mut manufacturer = false;
            let mut model = false;
            let mut version = false;
            for general_name in &san.general_names {
                if let GeneralName::DirectoryName(dn) = general_name {
                    for attr in dn.iter_attributes() {
                        if *attr.attr_type() == TCG_AT_TPM_MANUFACTURER {
                            manufacturer = true;
                        } else if *attr.attr_type() == TCG_AT_TPM_MODEL {
                            model = true;
                        } else if *attr.attr_type() == TCG_AT_TPM_VERSION {
                            version = true;
                        }
                    }
                }
            }
            critical && manufacturer && model && version
        })
        .unwrap_or(false);

    if !san_ok {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // The Extended Key Usage extension MUST contain the OID
    // 2.23.133.8.3 ("joint-iso-itu-t(2) internationalorganizations(23)
    // 133 tcg-kp(8) tcg-kp-AIKCertificate(3)").
    let eku_ok = x509_cert
        .extensions()
        .iter()
        .find_map(|extension| match extension.parsed_extension() {
            ParsedExtension::ExtendedKeyUsage(eku) => {
                Some(eku.other.iter().any(|oid| *oid == TCG_KP_AIK_CERTIFICATE))
            }
            _ => None,
        })
        .unwrap_or(false);

    if !eku_ok {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // The Basic Constraints extension MUST have the CA component set to false.
    let ca = x509_cert
        .extensions()
        .iter()
        .find_map(|extension| match extension.parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => Some(bc.ca),
            _ => None,
        })
        .unwrap_or(false);

    if ca {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    Ok(())
}

/// Hash `input` with the digest mandated for `alg`. Both supported
/// algorithms use sha256.
pub(crate) fn only_hash_from_type(alg: COSEAlgorithm, input: &[u8]) -> WebauthnResult<Vec<u8>> {
    match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 => Ok(compute_sha256(input).to_vec()),
    }
}

/// Verify a signature over `verification_data` against a certificate's
/// subject public key.
pub(crate) fn verify_signature(
    alg: COSEAlgorithm,
    pubk: &x509::X509,
    signature: &[u8],
    verification_data: &[u8],
) -> WebauthnResult<bool> {
    let pkey = pubk.public_key()?;
    match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 => {
            let mut verifier = sign::Verifier::new(MessageDigest::sha256(), &pkey)?;
            verifier.update(verification_data)?;
            verifier.verify(signature).map_err(WebauthnError::from)
        }
    }
}
