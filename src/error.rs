//! Possible errors that may occur during Webauthn operations.

use thiserror::Error;

/// A wrapper for `Result<T, WebauthnError>`
pub type WebauthnResult<T> = Result<T, WebauthnError>;

/// Possible errors that may occur during Webauthn operations.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum WebauthnError {
    #[error("The configuration was invalid")]
    Configuration,

    #[error("The client data collected was of the wrong ceremony type")]
    InvalidClientDataType,

    #[error("The credential type in the response is not public-key")]
    InvalidCredentialType,

    #[error("The credential id in the response does not match the attested credential data")]
    CredentialIdMismatch,

    #[error("The presented challenge does not match, or was already consumed")]
    MismatchedChallenge,

    #[error("The presented origin does not match the relying party origin")]
    InvalidRPOrigin,

    #[error("The rpIdHash in the authenticator data does not match the relying party")]
    InvalidRPIDHash,

    #[error("The user was not present during the ceremony")]
    UserNotPresent,

    #[error("The user was not verified during the ceremony, but verification is required")]
    UserNotVerified,

    #[error("The authenticator flags claim backup state without backup eligibility")]
    AuthenticatorDataInconsistentFlags,

    #[error("The authenticator data contains extension data, which is not supported")]
    ExtensionDataUnsupported,

    #[error("The authenticator data contains trailing bytes")]
    AuthenticatorDataTrailingBytes,

    #[error("The attestation credential data is missing")]
    MissingAttestationCredentialData,

    #[error("The requested attestation format is not able to be processed by this library")]
    AttestationNotSupported,

    #[error("The attestation type is not able to be verified against a trust root")]
    AttestationNotVerifiable,

    #[error("The attestation statement map is invalid")]
    AttestationStatementMapInvalid,

    #[error("The attestation statement alg is missing")]
    AttestationStatementAlgMissing,

    #[error("The attestation statement alg is invalid")]
    AttestationStatementAlgInvalid,

    #[error("The attestation statement alg does not match the credential algorithm")]
    AttestationStatementAlgMismatch,

    #[error("The attestation statement sig is missing")]
    AttestationStatementSigMissing,

    #[error("The attestation statement sig is invalid")]
    AttestationStatementSigInvalid,

    #[error("The attestation statement ver is missing")]
    AttestationStatementVerMissing,

    #[error("The attestation statement ver is invalid")]
    AttestationStatementVerInvalid,

    #[error("The attestation statement ver is unsupported")]
    AttestationStatementVerUnsupported,

    #[error("The attestation statement x5c is missing")]
    AttestationStatementX5CMissing,

    #[error("The attestation statement x5c is invalid")]
    AttestationStatementX5CInvalid,

    #[error("The attestation statement certInfo is missing")]
    AttestationStatementCertInfoMissing,

    #[error("The attestation statement pubArea is missing")]
    AttestationStatementPubAreaMissing,

    #[error("The attestation statement response is missing")]
    AttestationStatementResponseMissing,

    #[error("The attestation statement response is invalid")]
    AttestationStatementResponseInvalid,

    #[error("The attestation certificate is missing a required extension")]
    AttestationStatementMissingExtension,

    #[error("The attestation certificate aaguid does not match the authenticator data")]
    AttestationCertificateAAGUIDMismatch,

    #[error("The attestation certificate nonce does not match")]
    AttestationCertificateNonceMismatch,

    #[error("The attestation certificate does not meet the certificate requirements")]
    AttestationCertificateRequirementsNotMet,

    #[error("The credential public key does not match the attestation certificate subject key")]
    AttestationCredentialSubjectKeyMismatch,

    #[error("The attestation certInfo type is not TPM_ST_ATTEST_CERTIFY")]
    AttestationTpmStInvalid,

    #[error("The attestation certInfo extraData is invalid")]
    AttestationTpmExtraDataInvalid,

    #[error("The attestation certInfo extraData does not match the signed data hash")]
    AttestationTpmExtraDataMismatch,

    #[error("The TPM pubArea does not match the credential public key")]
    AttestationTpmPubAreaMismatch,

    #[error("The TPM pubArea name algorithm is unknown")]
    AttestationTpmPubAreaHashUnknown,

    #[error("The TPM pubArea name hash is invalid")]
    AttestationTpmPubAreaHashInvalid,

    #[error("The TPM attest structure does not certify the key")]
    AttestationTpmAttestCertifyInvalid,

    #[error("The attestation certificate public key is invalid")]
    CertificatePublicKeyInvalid,

    #[error("A CBOR value was of the incorrect type or absent")]
    COSEKeyInvalidCBORValue,

    #[error("The COSE key type is not supported by this library")]
    COSEKeyInvalidType,

    #[error("The COSE algorithm is not supported by this library")]
    COSEKeyInvalidAlgorithm,

    #[error("The COSE EC2 key x/y coordinates are invalid")]
    COSEKeyECDSAXYInvalid,

    #[error("The COSE EC2 key curve is invalid or unsupported")]
    COSEKeyECDSAInvalidCurve,

    #[error("The COSE RSA key n/e parameters are invalid")]
    COSEKeyRSANEInvalid,

    #[error("The authentication signature was cryptographically invalid")]
    AuthenticationFailure,

    #[error(
        "The credential signature counter regressed, the authenticator may have been cloned"
    )]
    CredentialPossibleCompromise,

    #[error("The serialised credential version {0} is not supported")]
    CredentialCodecVersionUnsupported(u8),

    #[error("The serialised credential exceeds the maximum record size")]
    CredentialCodecTooLarge,

    #[error("The serialised credential record is truncated or has trailing data")]
    CredentialCodecInvalid,

    #[error("Failed to decode base64: {0}")]
    ParseBase64Failure(#[from] base64::DecodeError),

    #[error("Failed to decode CBOR: {0}")]
    ParseCBORFailure(#[from] serde_cbor_2::error::Error),

    #[error("Failed to decode JSON: {0}")]
    ParseJSONFailure(#[from] serde_json::Error),

    #[error("Failed to parse a DER structure")]
    ParseNOMFailure,

    #[error("Insufficient bytes available to complete the parse")]
    ParseInsufficientBytesAvailable,

    #[error("OpenSSL error: {0}")]
    OpenSSLError(#[from] openssl::error::ErrorStack),

    #[error("OpenSSL returned no curve name for the public key")]
    OpenSSLErrorNoCurveName,
}
