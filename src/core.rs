//! The ceremony engine. [Webauthn] drives the server side of the two
//! Webauthn ceremonies, registration (§7.1) and authentication (§7.2),
//! against a [RelyingParty] identity and a [ChallengeRegistry] of
//! outstanding challenges.

use std::convert::TryFrom;

use openssl::memcmp;

use crate::attestation::{
    verify_android_safetynet_attestation, verify_apple_anonymous_attestation,
    verify_fidou2f_attestation, verify_none_attestation, verify_packed_attestation,
    verify_tpm_attestation,
};
use crate::crypto::COSEKey;
use crate::error::{WebauthnError, WebauthnResult};
use crate::interface::{
    AttestationMetadata, AuthenticationResult, Challenge, ChallengeRegistry,
    CounterRegressionPolicy, Credential, ParsedAttestationData, RegistrationResult,
};
use crate::proto::{
    client_data_hash, AttestationFormat, AttestationObject, AuthenticatorData,
    CollectedClientData, PublicKeyCredential, RegisterPublicKeyCredential, UserVerificationPolicy,
};
use crate::rp::RelyingParty;

/// The core of the Webauthn operations.
///
/// Issue a challenge with [Webauthn::generate_challenge_register] or
/// [Webauthn::generate_challenge_authenticate], send it to the client,
/// then pass the client's response to [Webauthn::register_credential]
/// or [Webauthn::authenticate_credential]. The engine performs the
/// full verification procedure of the relevant ceremony, the caller
/// only has to persist the [Credential] and apply the results.
#[derive(Debug)]
pub struct Webauthn<R: RelyingParty> {
    rp: R,
    counter_policy: CounterRegressionPolicy,
    danger_ignore_safetynet_timestamp: bool,
}

impl<R: RelyingParty> Webauthn<R> {
    /// Create an engine for the given relying party, with the default
    /// counter regression policy.
    pub fn new(rp: R) -> Self {
        Webauthn {
            rp,
            counter_policy: CounterRegressionPolicy::default(),
            danger_ignore_safetynet_timestamp: false,
        }
    }

    /// Set how a regressed signature counter is treated during
    /// authentication.
    pub fn counter_regression_policy(mut self, policy: CounterRegressionPolicy) -> Self {
        self.counter_policy = policy;
        self
    }

    /// Disable the timestamp freshness check on android SafetyNet
    /// attestations. Only useful in tests replaying captured
    /// attestations, never enable this in production.
    pub fn danger_ignore_safetynet_timestamp(mut self, ignore: bool) -> Self {
        self.danger_ignore_safetynet_timestamp = ignore;
        self
    }

    /// The relying party this engine verifies for.
    pub fn relying_party(&self) -> &R {
        &self.rp
    }

    /// Issue a challenge for a registration ceremony. The challenge is
    /// remembered in the registry so the eventual response can consume
    /// it.
    pub fn generate_challenge_register(&self, registry: &impl ChallengeRegistry) -> Challenge {
        let chal = Challenge::random();
        registry.remember_challenge(chal.clone());
        chal
    }

    /// Issue a challenge for an authentication ceremony.
    pub fn generate_challenge_authenticate(&self, registry: &impl ChallengeRegistry) -> Challenge {
        let chal = Challenge::random();
        registry.remember_challenge(chal.clone());
        chal
    }

    /// Process the client's response to a registration challenge,
    /// performing the §7.1 verification procedure.
    ///
    /// On success the returned [RegistrationResult] holds the
    /// [Credential] to persist and the attestation trust path that was
    /// conveyed. The engine does not judge attestation trust, inspect
    /// [RegistrationResult::attestation] if your deployment restricts
    /// which authenticators may register.
    pub fn register_credential(
        &self,
        reg: &RegisterPublicKeyCredential,
        registry: &impl ChallengeRegistry,
        policy: UserVerificationPolicy,
    ) -> WebauthnResult<RegistrationResult> {
        // The response's type member must literally be public-key,
        // nothing else registers here.
        if reg.type_ != "public-key" {
            return Err(WebauthnError::InvalidCredentialType);
        }

        // Steps 1 through 4.
        // Let JSONtext be the result of running UTF-8 decode on the value of
        // response.clientDataJSON, and let C be the parsed client data.
        let client_data_bytes = reg.response.client_data_json.0.as_slice();
        let data = CollectedClientData::try_from(client_data_bytes)?;

        // 5. Verify that the value of C.type is webauthn.create.
        if data.type_ != "webauthn.create" {
            return Err(WebauthnError::InvalidClientDataType);
        }

        // 6. Verify that the value of C.challenge matches a challenge that
        // was issued and is still outstanding. Consuming is atomic, a replay
        // of the same response can not pass this step twice.
        if !registry.consume_challenge(data.challenge.0.as_slice()) {
            return Err(WebauthnError::MismatchedChallenge);
        }

        // 7. Verify that the value of C.origin matches the Relying Party's origin.
        if !self.rp.origin_matches(&data.origin) {
            error!("{} is not an origin of this relying party", data.origin);
            return Err(WebauthnError::InvalidRPOrigin);
        }

        // 8. Token binding is not supported by any widely deployed client,
        // its state is parsed but not enforced.

        // 9. Let hash be the result of computing a hash over
        // response.clientDataJSON using SHA-256.
        let cdh = client_data_hash(client_data_bytes);

        // 10. Perform CBOR decoding on the attestationObject field.
        let att_obj = AttestationObject::try_from(reg.response.attestation_object.0.as_slice())?;

        // 11. Verify that the rpIdHash in authData is the SHA-256 hash of the
        // RP ID expected by the Relying Party.
        if !self.rp.rp_id_hash_matches(&att_obj.auth_data.rp_id_hash) {
            return Err(WebauthnError::InvalidRPIDHash);
        }

        // 12. Verify that the User Present bit of the flags in authData is set.
        if !att_obj.auth_data.user_present {
            return Err(WebauthnError::UserNotPresent);
        }

        // 13. If user verification is required for this registration, verify
        // that the User Verified bit of the flags in authData is set.
        if policy == UserVerificationPolicy::Required && !att_obj.auth_data.user_verified {
            return Err(WebauthnError::UserNotVerified);
        }

        // Registration requires attested credential data, there is no
        // credential to create without it.
        let acd = att_obj
            .auth_data
            .acd
            .as_ref()
            .ok_or(WebauthnError::MissingAttestationCredentialData)?;

        // The credential id the response claims at its top level must be
        // the id the authenticator actually attested.
        let claimed_id = reg.raw_id.0.as_slice();
        let attested_id = acd.credential_id.0.as_slice();
        if claimed_id.len() != attested_id.len() || !memcmp::eq(claimed_id, attested_id) {
            error!("the response credential id does not match the attested credential data");
            return Err(WebauthnError::CredentialIdMismatch);
        }

        // 14 - 17. Determine the attestation statement format, and verify the
        // statement with the procedure for that format.
        let (attestation, attestation_metadata) = match &att_obj.fmt {
            AttestationFormat::Packed => verify_packed_attestation(acd, &att_obj, &cdh)?,
            AttestationFormat::Tpm => verify_tpm_attestation(acd, &att_obj, &cdh)?,
            AttestationFormat::AndroidSafetyNet => verify_android_safetynet_attestation(
                acd,
                &att_obj,
                &cdh,
                self.danger_ignore_safetynet_timestamp,
            )?,
            AttestationFormat::AppleAnonymous => {
                verify_apple_anonymous_attestation(acd, &att_obj, &cdh)?
            }
            AttestationFormat::FIDOU2F => verify_fidou2f_attestation(acd, &att_obj, &cdh)?,
            AttestationFormat::None => verify_none_attestation(&att_obj)?,
            AttestationFormat::Unsupported(fmt) => {
                // An unknown format can still register, the caller sees
                // an uncertain trust path and decides for themselves.
                debug!("no verifier for attestation format {}", fmt);
                (ParsedAttestationData::Uncertain, AttestationMetadata::None)
            }
        };

        // The credential public key must be one we can verify assertions
        // with, regardless of what the attestation format required of it.
        let cred_pk = COSEKey::try_from(&acd.credential_pk)?;

        let credential = Credential {
            cred_id: acd.credential_id.clone(),
            cred: cred_pk,
            counter: att_obj.auth_data.counter,
            user_verified: att_obj.auth_data.user_verified,
            backup_eligible: att_obj.auth_data.backup_eligible,
            backup_state: att_obj.auth_data.backup_state,
            transports: reg.response.transports.clone(),
            registration_policy: policy,
            attestation_metadata,
        };

        Ok(RegistrationResult {
            credential,
            attestation,
        })
    }

    /// Process the client's response to an authentication challenge,
    /// performing the §7.2 verification procedure against the supplied
    /// stored credential.
    ///
    /// On success, apply the returned counter and backup state to the
    /// stored credential.
    pub fn authenticate_credential(
        &self,
        rsp: &PublicKeyCredential,
        registry: &impl ChallengeRegistry,
        cred: &Credential,
    ) -> WebauthnResult<AuthenticationResult> {
        if rsp.type_ != "public-key" {
            return Err(WebauthnError::InvalidCredentialType);
        }

        // 5. The credential the client asserted with must be the one we
        // were asked to verify against.
        if rsp.raw_id != cred.cred_id {
            error!("the asserted credential id is not the stored credential");
            return Err(WebauthnError::AuthenticationFailure);
        }

        // 6 - 8. Let cData, authData and sig denote the value of response's
        // clientDataJSON, authenticatorData, and signature respectively.
        let client_data_bytes = rsp.response.client_data_json.0.as_slice();
        let data = CollectedClientData::try_from(client_data_bytes)?;

        // 11. Verify that the value of C.type is the string webauthn.get.
        if data.type_ != "webauthn.get" {
            return Err(WebauthnError::InvalidClientDataType);
        }

        // 12. Verify that the value of C.challenge matches an outstanding
        // challenge, consuming it.
        if !registry.consume_challenge(data.challenge.0.as_slice()) {
            return Err(WebauthnError::MismatchedChallenge);
        }

        // 13. Verify that the value of C.origin matches the Relying Party's origin.
        if !self.rp.origin_matches(&data.origin) {
            error!("{} is not an origin of this relying party", data.origin);
            return Err(WebauthnError::InvalidRPOrigin);
        }

        let auth_data_bytes = rsp.response.authenticator_data.0.as_slice();
        let auth_data = AuthenticatorData::try_from(auth_data_bytes)?;

        // 15. Verify that the rpIdHash in authData is the SHA-256 hash of the
        // RP ID expected by the Relying Party.
        if !self.rp.rp_id_hash_matches(&auth_data.rp_id_hash) {
            return Err(WebauthnError::InvalidRPIDHash);
        }

        // 16. Verify that the User Present bit of the flags in authData is set.
        if !auth_data.user_present {
            return Err(WebauthnError::UserNotPresent);
        }

        // 17. If user verification is required for this assertion, verify that
        // the User Verified bit of the flags in authData is set. A credential
        // registered under Preferred that verified then, must keep verifying,
        // otherwise a stolen synced credential could silently downgrade.
        let uv_required = match cred.registration_policy {
            UserVerificationPolicy::Required => true,
            UserVerificationPolicy::Preferred => cred.user_verified,
            UserVerificationPolicy::Discouraged => false,
        };
        if uv_required && !auth_data.user_verified {
            return Err(WebauthnError::UserNotVerified);
        }

        // Backup eligibility is a property of the credential, set at
        // creation. An authenticator that changes its mind is lying.
        if auth_data.backup_eligible != cred.backup_eligible {
            return Err(WebauthnError::AuthenticatorDataInconsistentFlags);
        }

        // 19 - 20. Let hash be the result of computing a hash over the cData
        // using SHA-256, and verify sig over the binary concatenation of
        // authData and hash using the credential public key.
        let cdh = client_data_hash(client_data_bytes);
        let verification_data: Vec<u8> = auth_data_bytes
            .iter()
            .chain(cdh.iter())
            .copied()
            .collect();

        let verified = cred
            .cred
            .verify_signature(&rsp.response.signature.0, &verification_data)?;
        if !verified {
            return Err(WebauthnError::AuthenticationFailure);
        }

        // 21. The signature counter must advance whenever the authenticator
        // implements one. Both sides zero means the authenticator does not
        // support counters and there is nothing to compare.
        let mut counter_regression = false;
        if (auth_data.counter > 0 || cred.counter > 0) && auth_data.counter <= cred.counter {
            // The counter went backwards. The private key may exist on
            // more than one device.
            match self.counter_policy {
                CounterRegressionPolicy::HardReject => {
                    error!(
                        "signature counter regressed, stored {} received {}",
                        cred.counter, auth_data.counter
                    );
                    return Err(WebauthnError::CredentialPossibleCompromise);
                }
                CounterRegressionPolicy::FlagAndContinue => {
                    warn!(
                        "signature counter regressed, stored {} received {}",
                        cred.counter, auth_data.counter
                    );
                    counter_regression = true;
                }
            }
        }

        Ok(AuthenticationResult {
            cred_id: cred.cred_id.clone(),
            counter: auth_data.counter,
            user_verified: auth_data.user_verified,
            backup_state: auth_data.backup_state,
            counter_regression,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use base64urlsafedata::Base64UrlSafeData;
    use url::Url;

    use crate::crypto::{COSEAlgorithm, COSEEC2Key, COSEKey, COSEKeyType, COSERSAKey, ECDSACurve};
    use crate::ephemeral::EphemeralChallengeRegistry;
    use crate::error::WebauthnError;
    use crate::interface::{
        AttestationMetadata, Challenge, ChallengeRegistry, CounterRegressionPolicy, Credential,
    };
    use crate::proto::{
        AuthenticatorAssertionResponseRaw, AuthenticatorAttestationResponseRaw,
        PublicKeyCredential, RegisterPublicKeyCredential, UserVerificationPolicy,
    };
    use crate::rp::SingleOriginParty;

    use super::Webauthn;

    fn engine(rp_id: &str, origin: &str) -> Webauthn<SingleOriginParty> {
        let rp = SingleOriginParty::new(rp_id, Url::parse(origin).expect("invalid url"))
            .expect("invalid rp");
        Webauthn::new(rp)
    }

    fn registry_with(chal: &Challenge) -> EphemeralChallengeRegistry {
        let registry = EphemeralChallengeRegistry::new();
        registry.remember_challenge(chal.clone());
        registry
    }

    #[test]
    fn test_registration_yubico_u2f() {
        let wan = engine("127.0.0.1", "http://127.0.0.1:8080");

        // Generated by a yubico 5. The challenge is all zeros so the
        // captured response stays valid.
        let zero_chal = Challenge::from(vec![0; crate::constants::CHALLENGE_SIZE_BYTES]);
        let registry = registry_with(&zero_chal);

        let rsp = r#"
        {
            "id":"0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6Ig",
            "rawId":"0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6Ig",
            "response":{
                 "attestationObject":"o2NmbXRoZmlkby11MmZnYXR0U3RtdKJjc2lnWEcwRQIhALjRb43YFcbJ3V9WiYPpIrZkhgzAM6KTR8KIjwCXejBCAiAO5Lvp1VW4dYBhBDv7HZIrxZb1SwKKYOLfFRXykRxMqGN4NWOBWQLBMIICvTCCAaWgAwIBAgIEGKxGwDANBgkqhkiG9w0BAQsFADAuMSwwKgYDVQQDEyNZdWJpY28gVTJGIFJvb3QgQ0EgU2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAwMDBaGA8yMDUwMDkwNDAwMDAwMFowbjELMAkGA1UEBhMCU0UxEjAQBgNVBAoMCVl1YmljbyBBQjEiMCAGA1UECwwZQXV0aGVudGljYXRvciBBdHRlc3RhdGlvbjEnMCUGA1UEAwweWXViaWNvIFUyRiBFRSBTZXJpYWwgNDEzOTQzNDg4MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEeeo7LHxJcBBiIwzSP-tg5SkxcdSD8QC-hZ1rD4OXAwG1Rs3Ubs_K4-PzD4Hp7WK9Jo1MHr03s7y-kqjCrutOOqNsMGowIgYJKwYBBAGCxAoCBBUxLjMuNi4xLjQuMS40MTQ4Mi4xLjcwEwYLKwYBBAGC5RwCAQEEBAMCBSAwIQYLKwYBBAGC5RwBAQQEEgQQy2lIHo_3QDmT7AonKaFUqDAMBgNVHRMBAf8EAjAAMA0GCSqGSIb3DQEBCwUAA4IBAQCXnQOX2GD4LuFdMRx5brr7Ivqn4ITZurTGG7tX8-a0wYpIN7hcPE7b5IND9Nal2bHO2orh_tSRKSFzBY5e4cvda9rAdVfGoOjTaCW6FZ5_ta2M2vgEhoz5Do8fiuoXwBa1XCp61JfIlPtx11PXm5pIS2w3bXI7mY0uHUMGvxAzta74zKXLslaLaSQibSKjWKt9h-SsXy4JGqcVefOlaQlJfXL1Tga6wcO0QTu6Xq-Uw7ZPNPnrpBrLauKDd202RlN4SP7ohL3d9bG6V5hUz_3OusNEBZUn5W3VmPj1ZnFavkMB3RkRMOa58MZAORJT4imAPzrvJ0vtv94_y71C6tZ5aGF1dGhEYXRhWMQSyhe0mvIolDbzA-AWYDCiHlJdJm4gkmdDOAGo_UBxoEEAAAAAAAAAAAAAAAAAAAAAAAAAAABA0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6IqUBAgMmIAEhWCCe1KvqpcVWN416_QZc8vJynt3uo3_WeJ2R4uj6kJbaiiJYIDC5ssxxummKviGgLoP9ZLFb836A9XfRO7op18QY3i5m",
                 "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBIiwiY2xpZW50RXh0ZW5zaW9ucyI6e30sImhhc2hBbGdvcml0aG0iOiJTSEEtMjU2Iiwib3JpZ2luIjoiaHR0cDovLzEyNy4wLjAuMTo4MDgwIiwidHlwZSI6IndlYmF1dGhuLmNyZWF0ZSJ9"
            },
            "type":"public-key"}
        "#;
        let rsp_d: RegisterPublicKeyCredential = serde_json::from_str(rsp).unwrap();

        let result = wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred);
        println!("{:?}", result);
        assert!(result.is_ok());
        let result = result.unwrap();
        assert_eq!(result.credential.counter, 0);
        assert!(!result.credential.user_verified);
    }

    #[test]
    fn test_registration_replayed_challenge_fails() {
        let wan = engine("127.0.0.1", "http://127.0.0.1:8080");
        let zero_chal = Challenge::from(vec![0; crate::constants::CHALLENGE_SIZE_BYTES]);
        let registry = registry_with(&zero_chal);

        let rsp = r#"
        {
            "id":"0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6Ig",
            "rawId":"0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6Ig",
            "response":{
                 "attestationObject":"o2NmbXRoZmlkby11MmZnYXR0U3RtdKJjc2lnWEcwRQIhALjRb43YFcbJ3V9WiYPpIrZkhgzAM6KTR8KIjwCXejBCAiAO5Lvp1VW4dYBhBDv7HZIrxZb1SwKKYOLfFRXykRxMqGN4NWOBWQLBMIICvTCCAaWgAwIBAgIEGKxGwDANBgkqhkiG9w0BAQsFADAuMSwwKgYDVQQDEyNZdWJpY28gVTJGIFJvb3QgQ0EgU2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAwMDBaGA8yMDUwMDkwNDAwMDAwMFowbjELMAkGA1UEBhMCU0UxEjAQBgNVBAoMCVl1YmljbyBBQjEiMCAGA1UECwwZQXV0aGVudGljYXRvciBBdHRlc3RhdGlvbjEnMCUGA1UEAwweWXViaWNvIFUyRiBFRSBTZXJpYWwgNDEzOTQzNDg4MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEeeo7LHxJcBBiIwzSP-tg5SkxcdSD8QC-hZ1rD4OXAwG1Rs3Ubs_K4-PzD4Hp7WK9Jo1MHr03s7y-kqjCrutOOqNsMGowIgYJKwYBBAGCxAoCBBUxLjMuNi4xLjQuMS40MTQ4Mi4xLjcwEwYLKwYBBAGC5RwCAQEEBAMCBSAwIQYLKwYBBAGC5RwBAQQEEgQQy2lIHo_3QDmT7AonKaFUqDAMBgNVHRMBAf8EAjAAMA0GCSqGSIb3DQEBCwUAA4IBAQCXnQOX2GD4LuFdMRx5brr7Ivqn4ITZurTGG7tX8-a0wYpIN7hcPE7b5IND9Nal2bHO2orh_tSRKSFzBY5e4cvda9rAdVfGoOjTaCW6FZ5_ta2M2vgEhoz5Do8fiuoXwBa1XCp61JfIlPtx11PXm5pIS2w3bXI7mY0uHUMGvxAzta74zKXLslaLaSQibSKjWKt9h-SsXy4JGqcVefOlaQlJfXL1Tga6wcO0QTu6Xq-Uw7ZPNPnrpBrLauKDd202RlN4SP7ohL3d9bG6V5hUz_3OusNEBZUn5W3VmPj1ZnFavkMB3RkRMOa58MZAORJT4imAPzrvJ0vtv94_y71C6tZ5aGF1dGhEYXRhWMQSyhe0mvIolDbzA-AWYDCiHlJdJm4gkmdDOAGo_UBxoEEAAAAAAAAAAAAAAAAAAAAAAAAAAABA0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6IqUBAgMmIAEhWCCe1KvqpcVWN416_QZc8vJynt3uo3_WeJ2R4uj6kJbaiiJYIDC5ssxxummKviGgLoP9ZLFb836A9XfRO7op18QY3i5m",
                 "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBIiwiY2xpZW50RXh0ZW5zaW9ucyI6e30sImhhc2hBbGdvcml0aG0iOiJTSEEtMjU2Iiwib3JpZ2luIjoiaHR0cDovLzEyNy4wLjAuMTo4MDgwIiwidHlwZSI6IndlYmF1dGhuLmNyZWF0ZSJ9"
            },
            "type":"public-key"}
        "#;
        let rsp_d: RegisterPublicKeyCredential = serde_json::from_str(rsp).unwrap();

        assert!(wan
            .register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred)
            .is_ok());
        // The exact same response a second time must not register, its
        // challenge was consumed.
        assert!(matches!(
            wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred),
            Err(WebauthnError::MismatchedChallenge)
        ));
    }

    // These are vectors from https://github.com/duo-labs/webauthn
    #[test]
    fn test_registration_duo_go() {
        let wan = engine("webauthn.io", "https://webauthn.io");

        let chal = Challenge::from(
            base64::decode("+Ri5NZTzJ8b6mvW3TVScLotEoALfgBa2Bn4YSaIObHc").unwrap(),
        );
        let registry = registry_with(&chal);

        let rsp = r#"
        {
                "id": "FOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmg",
                "rawId": "FOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmg",
                "response": {
                        "attestationObject": "o2NmbXRoZmlkby11MmZnYXR0U3RtdKJjc2lnWEYwRAIgfyIhwZj-fkEVyT1GOK8chDHJR2chXBLSRg6bTCjODmwCIHH6GXI_BQrcR-GHg5JfazKVQdezp6_QWIFfT4ltTCO2Y3g1Y4FZAlMwggJPMIIBN6ADAgECAgQSNtF_MA0GCSqGSIb3DQEBCwUAMC4xLDAqBgNVBAMTI1l1YmljbyBVMkYgUm9vdCBDQSBTZXJpYWwgNDU3MjAwNjMxMCAXDTE0MDgwMTAwMDAwMFoYDzIwNTAwOTA0MDAwMDAwWjAxMS8wLQYDVQQDDCZZdWJpY28gVTJGIEVFIFNlcmlhbCAyMzkyNTczNDEwMzI0MTA4NzBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABNNlqR5emeDVtDnA2a-7h_QFjkfdErFE7bFNKzP401wVE-QNefD5maviNnGVk4HJ3CsHhYuCrGNHYgTM9zTWriGjOzA5MCIGCSsGAQQBgsQKAgQVMS4zLjYuMS40LjEuNDE0ODIuMS41MBMGCysGAQQBguUcAgEBBAQDAgUgMA0GCSqGSIb3DQEBCwUAA4IBAQAiG5uzsnIk8T6-oyLwNR6vRklmo29yaYV8jiP55QW1UnXdTkEiPn8mEQkUac-Sn6UmPmzHdoGySG2q9B-xz6voVQjxP2dQ9sgbKd5gG15yCLv6ZHblZKkdfWSrUkrQTrtaziGLFSbxcfh83vUjmOhDLFC5vxV4GXq2674yq9F2kzg4nCS4yXrO4_G8YWR2yvQvE2ffKSjQJlXGO5080Ktptplv5XN4i5lS-AKrT5QRVbEJ3B4g7G0lQhdYV-6r4ZtHil8mF4YNMZ0-RaYPxAaYNWkFYdzOZCaIdQbXRZefgGfbMUiAC2gwWN7fiPHV9eu82NYypGU32OijG9BjhGt_aGF1dGhEYXRhWMR0puqSE8mcL3SyJJKzIM9AJiqUwalQoDl_KSULYIQe8EEAAAAAAAAAAAAAAAAAAAAAAAAAAABAFOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmqUBAgMmIAEhWCD_ap3Q9zU8OsGe967t48vyRxqn8NfFTk307mC1WsH2ISJYIIcqAuW3MxhU0uDtaSX8-Ftf_zeNJLdCOEjZJGHsrLxH",
                        "clientDataJSON": "eyJjaGFsbGVuZ2UiOiItUmk1TlpUeko4YjZtdlczVFZTY0xvdEVvQUxmZ0JhMkJuNFlTYUlPYkhjIiwib3JpZ2luIjoiaHR0cHM6Ly93ZWJhdXRobi5pbyIsInR5cGUiOiJ3ZWJhdXRobi5jcmVhdGUifQ"
                },
                "type": "public-key"
        }
        "#;
        let rsp_d: RegisterPublicKeyCredential = serde_json::from_str(rsp).unwrap();
        let result = wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred);
        println!("{:?}", result);
        assert!(result.is_ok());
    }

    #[test]
    fn test_registration_wrong_origin_fails() {
        // The captured duo-labs response asserts https://webauthn.io,
        // a relying party for another site must reject it.
        let wan = engine("webauthn.org", "https://webauthn.org");

        let chal = Challenge::from(
            base64::decode("+Ri5NZTzJ8b6mvW3TVScLotEoALfgBa2Bn4YSaIObHc").unwrap(),
        );
        let registry = registry_with(&chal);

        let rsp = r#"
        {
                "id": "FOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmg",
                "rawId": "FOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmg",
                "response": {
                        "attestationObject": "o2NmbXRoZmlkby11MmZnYXR0U3RtdKJjc2lnWEYwRAIgfyIhwZj-fkEVyT1GOK8chDHJR2chXBLSRg6bTCjODmwCIHH6GXI_BQrcR-GHg5JfazKVQdezp6_QWIFfT4ltTCO2Y3g1Y4FZAlMwggJPMIIBN6ADAgECAgQSNtF_MA0GCSqGSIb3DQEBCwUAMC4xLDAqBgNVBAMTI1l1YmljbyBVMkYgUm9vdCBDQSBTZXJpYWwgNDU3MjAwNjMxMCAXDTE0MDgwMTAwMDAwMFoYDzIwNTAwOTA0MDAwMDAwWjAxMS8wLQYDVQQDDCZZdWJpY28gVTJGIEVFIFNlcmlhbCAyMzkyNTczNDEwMzI0MTA4NzBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABNNlqR5emeDVtDnA2a-7h_QFjkfdErFE7bFNKzP401wVE-QNefD5maviNnGVk4HJ3CsHhYuCrGNHYgTM9zTWriGjOzA5MCIGCSsGAQQBgsQKAgQVMS4zLjYuMS40LjEuNDE0ODIuMS41MBMGCysGAQQBguUcAgEBBAQDAgUgMA0GCSqGSIb3DQEBCwUAA4IBAQAiG5uzsnIk8T6-oyLwNR6vRklmo29yaYV8jiP55QW1UnXdTkEiPn8mEQkUac-Sn6UmPmzHdoGySG2q9B-xz6voVQjxP2dQ9sgbKd5gG15yCLv6ZHblZKkdfWSrUkrQTrtaziGLFSbxcfh83vUjmOhDLFC5vxV4GXq2674yq9F2kzg4nCS4yXrO4_G8YWR2yvQvE2ffKSjQJlXGO5080Ktptplv5XN4i5lS-AKrT5QRVbEJ3B4g7G0lQhdYV-6r4ZtHil8mF4YNMZ0-RaYPxAaYNWkFYdzOZCaIdQbXRZefgGfbMUiAC2gwWN7fiPHV9eu82NYypGU32OijG9BjhGt_aGF1dGhEYXRhWMR0puqSE8mcL3SyJJKzIM9AJiqUwalQoDl_KSULYIQe8EEAAAAAAAAAAAAAAAAAAAAAAAAAAABAFOxcmsqPLNCHtyILvbNkrtHMdKAeqSJXYZDbeFd0kc5Enm8Kl6a0Jp0szgLilDw1S4CjZhe9Z2611EUGbjyEmqUBAgMmIAEhWCD_ap3Q9zU8OsGe967t48vyRxqn8NfFTk307mC1WsH2ISJYIIcqAuW3MxhU0uDtaSX8-Ftf_zeNJLdCOEjZJGHsrLxH",
                        "clientDataJSON": "eyJjaGFsbGVuZ2UiOiItUmk1TlpUeko4YjZtdlczVFZTY0xvdEVvQUxmZ0JhMkJuNFlTYUlPYkhjIiwib3JpZ2luIjoiaHR0cHM6Ly93ZWJhdXRobi5pbyIsInR5cGUiOiJ3ZWJhdXRobi5jcmVhdGUifQ"
                },
                "type": "public-key"
        }
        "#;
        let rsp_d: RegisterPublicKeyCredential = serde_json::from_str(rsp).unwrap();
        assert!(matches!(
            wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred),
            Err(WebauthnError::InvalidRPOrigin)
        ));
    }

    #[test]
    fn test_registration_packed_attestation() {
        let wan = engine("localhost", "https://localhost:8443");

        let chal = Challenge::from(
            base64::decode("lP6mWNAtG+/Vv15iM7lb/XRkdWMvVQ+lTyKwZuOg1Vo=").unwrap(),
        );
        let registry = registry_with(&chal);

        // Example generated using navigator.credentials.create on Chrome Version 77.0.3865.120
        // using Touch ID on MacBook running MacOS 10.15
        let rsp = r#"{
                        "id":"ATk_7QKbi_ntSdp16LXeU6RDf9YnRLIDTCqEjJFzc6rKBhbqoSYccxNa",
                        "rawId":"ATk_7QKbi_ntSdp16LXeU6RDf9YnRLIDTCqEjJFzc6rKBhbqoSYccxNa",
                        "response":{
                            "attestationObject":"o2NmbXRmcGFja2VkZ2F0dFN0bXSiY2FsZyZjc2lnWEcwRQIgLXPjBtVEhBH3KdUDFFk3LAd9EtHogllIf48vjX4wgfECIQCXOymmfg12FPMXEdwpSjjtmrvki4K8y0uYxqWN5Bw6DGhhdXRoRGF0YViuSZYN5YgOjGh0NBcPZHZgW4_krrmihjLHmVzzuoMdl2NFXaqejq3OAAI1vMYKZIsLJfHwVQMAKgE5P-0Cm4v57Unadei13lOkQ3_WJ0SyA0wqhIyRc3OqygYW6qEmHHMTWqUBAgMmIAEhWCDNRS_Gw52ow5PNrC9OdFTFNudDmZO6Y3wmM9N8e0tJICJYIC09iIH5_RrT5tbS0PIw3srdAxYDMGao7yWgu0JFIEzT",
                            "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJsUDZtV05BdEctX1Z2MTVpTTdsYl9YUmtkV012VlEtbFR5S3dadU9nMVZvIiwiZXh0cmFfa2V5c19tYXlfYmVfYWRkZWRfaGVyZSI6ImRvIG5vdCBjb21wYXJlIGNsaWVudERhdGFKU09OIGFnYWluc3QgYSB0ZW1wbGF0ZS4gU2VlIGh0dHBzOi8vZ29vLmdsL3lhYlBleCIsIm9yaWdpbiI6Imh0dHBzOi8vbG9jYWxob3N0Ojg0NDMiLCJ0eXBlIjoid2ViYXV0aG4uY3JlYXRlIn0"
                            },
                        "type":"public-key"
                      }
        "#;
        let rsp_d: RegisterPublicKeyCredential = serde_json::from_str(rsp).unwrap();
        let result = wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred);
        println!("{:?}", result);
        assert!(result.is_ok());
        // A packed self attestation carries no aaguid metadata.
        let result = result.unwrap();
        assert_eq!(
            result.credential.attestation_metadata,
            AttestationMetadata::None
        );
    }

    fn localhost_authentication_credential(
        counter: u32,
        policy: UserVerificationPolicy,
    ) -> Credential {
        // The credential the captured assertion below was minted from.
        Credential {
            cred_id: Base64UrlSafeData(vec![
                106, 223, 133, 124, 161, 172, 56, 141, 181, 18, 27, 66, 187, 181, 113, 251, 187,
                123, 20, 169, 41, 80, 236, 138, 92, 137, 4, 4, 16, 255, 188, 47, 158, 202, 111,
                192, 117, 110, 152, 245, 95, 22, 200, 172, 71, 154, 40, 181, 212, 64, 80, 17, 238,
                238, 21, 13, 27, 145, 140, 27, 208, 101, 166, 81,
            ]),
            cred: COSEKey {
                type_: COSEAlgorithm::ES256,
                key: COSEKeyType::EC_EC2(COSEEC2Key {
                    curve: ECDSACurve::SECP256R1,
                    x: Base64UrlSafeData(vec![
                        46, 121, 76, 233, 118, 208, 250, 74, 227, 182, 8, 145, 45, 46, 5, 9, 199,
                        186, 84, 83, 7, 237, 130, 73, 16, 90, 17, 54, 33, 255, 54, 56,
                    ]),
                    y: Base64UrlSafeData(vec![
                        117, 105, 1, 23, 253, 223, 67, 135, 253, 219, 253, 223, 17, 247, 91, 197,
                        205, 225, 143, 59, 47, 138, 70, 120, 74, 155, 177, 177, 166, 233, 48, 71,
                    ]),
                }),
            },
            counter,
            user_verified: false,
            backup_eligible: false,
            backup_state: false,
            transports: None,
            registration_policy: policy,
            attestation_metadata: AttestationMetadata::None,
        }
    }

    fn localhost_assertion_challenge() -> Challenge {
        Challenge::from(vec![
            90, 5, 243, 254, 68, 239, 221, 101, 20, 214, 76, 60, 134, 111, 142, 26, 129, 146, 225,
            144, 135, 95, 253, 219, 18, 161, 199, 216, 251, 213, 167, 195,
        ])
    }

    fn localhost_assertion() -> PublicKeyCredential {
        // Captured authentication attempt, generated by a yubico 5.
        let rsp = r#"
        {
            "id":"at-FfKGsOI21EhtCu7Vx-7t7FKkpUOyKXIkEBBD_vC-eym_AdW6Y9V8WyKxHmii11EBQEe7uFQ0bkYwb0GWmUQ",
            "rawId":"at-FfKGsOI21EhtCu7Vx-7t7FKkpUOyKXIkEBBD_vC-eym_AdW6Y9V8WyKxHmii11EBQEe7uFQ0bkYwb0GWmUQ",
            "response":{
                "authenticatorData":"SZYN5YgOjGh0NBcPZHZgW4_krrmihjLHmVzzuoMdl2MBAAAAFA",
                "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJXZ1h6X2tUdjNXVVUxa3c4aG0tT0dvR1M0WkNIWF8zYkVxSEgyUHZWcDhNIiwiY2xpZW50RXh0ZW5zaW9ucyI6e30sImhhc2hBbGdvcml0aG0iOiJTSEEtMjU2Iiwib3JpZ2luIjoiaHR0cDovL2xvY2FsaG9zdDo4MDgwIiwidHlwZSI6IndlYmF1dGhuLmdldCJ9",
                "signature":"MEYCIQDmLVOqv85cdRup4Fr8Pf9zC4AWO-XKBJqa8xPwYFCCMAIhAOiExLoyes0xipmUmq0BVlqJaCKLn_MFKG9GIDsCGq_-",
                "userHandle":null
            },
            "type":"public-key"
        }
        "#;
        serde_json::from_str(rsp).unwrap()
    }

    #[test]
    fn test_authentication() {
        let wan = engine("localhost", "http://localhost:8080");
        let chal = localhost_assertion_challenge();
        let registry = registry_with(&chal);
        let cred = localhost_authentication_credential(1, UserVerificationPolicy::Preferred);

        let rsp_d = localhost_assertion();
        let r = wan.authenticate_credential(&rsp_d, &registry, &cred);
        println!("RESULT: {:?}", r);
        assert!(r.is_ok());
        let r = r.unwrap();
        // The counter in the captured authData is 20.
        assert_eq!(r.counter, 20);
        assert!(!r.counter_regression);
        assert!(!r.user_verified);

        let mut cred = cred;
        assert_eq!(cred.update(&r), Some(true));
        assert_eq!(cred.counter, 20);
        // Applying the same result again changes nothing.
        assert_eq!(cred.update(&r), Some(false));
    }

    #[test]
    fn test_authentication_counter_regression_rejects() {
        let wan = engine("localhost", "http://localhost:8080");
        let chal = localhost_assertion_challenge();
        let registry = registry_with(&chal);
        // Stored counter ahead of the asserted counter of 20.
        let cred = localhost_authentication_credential(100, UserVerificationPolicy::Preferred);

        let rsp_d = localhost_assertion();
        assert!(matches!(
            wan.authenticate_credential(&rsp_d, &registry, &cred),
            Err(WebauthnError::CredentialPossibleCompromise)
        ));
    }

    #[test]
    fn test_authentication_counter_regression_flagged() {
        let wan = engine("localhost", "http://localhost:8080")
            .counter_regression_policy(CounterRegressionPolicy::FlagAndContinue);
        let chal = localhost_assertion_challenge();
        let registry = registry_with(&chal);
        let cred = localhost_authentication_credential(100, UserVerificationPolicy::Preferred);

        let rsp_d = localhost_assertion();
        let r = wan.authenticate_credential(&rsp_d, &registry, &cred);
        println!("RESULT: {:?}", r);
        assert!(r.is_ok());
        let r = r.unwrap();
        assert!(r.counter_regression);
        assert_eq!(r.counter, 20);
    }

    #[test]
    fn test_authentication_uv_required_rejects_up_only() {
        let wan = engine("localhost", "http://localhost:8080");
        let chal = localhost_assertion_challenge();
        let registry = registry_with(&chal);
        // The captured assertion has UP only, a credential registered
        // under Required must not accept it.
        let cred = localhost_authentication_credential(1, UserVerificationPolicy::Required);

        let rsp_d = localhost_assertion();
        assert!(matches!(
            wan.authenticate_credential(&rsp_d, &registry, &cred),
            Err(WebauthnError::UserNotVerified)
        ));
    }

    #[test]
    fn test_authentication_wrong_credential_rejects() {
        let wan = engine("localhost", "http://localhost:8080");
        let chal = localhost_assertion_challenge();
        let registry = registry_with(&chal);
        let mut cred = localhost_authentication_credential(1, UserVerificationPolicy::Preferred);
        cred.cred_id = Base64UrlSafeData(vec![0xde, 0xad, 0xbe, 0xef]);

        let rsp_d = localhost_assertion();
        assert!(matches!(
            wan.authenticate_credential(&rsp_d, &registry, &cred),
            Err(WebauthnError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_authentication_expired_challenge_rejects() {
        let wan = engine("localhost", "http://localhost:8080");
        let chal = localhost_assertion_challenge();
        let registry = EphemeralChallengeRegistry::with_timeout(Duration::from_secs(0));
        registry.remember_challenge(chal);
        std::thread::sleep(Duration::from_millis(5));
        let cred = localhost_authentication_credential(1, UserVerificationPolicy::Preferred);

        let rsp_d = localhost_assertion();
        assert!(matches!(
            wan.authenticate_credential(&rsp_d, &registry, &cred),
            Err(WebauthnError::MismatchedChallenge)
        ));
    }

    #[test]
    fn test_registration_ipados_5ci() {
        let wan = engine("172.20.0.141", "https://172.20.0.141:8443");

        let chal = Challenge::from(
            base64::decode("tvR1m+d/ohXrwVxQjMgH8KnovHZ7BRWhZmDN4TVMpNU=").unwrap(),
        );
        let registry = registry_with(&chal);

        let rsp_d = RegisterPublicKeyCredential {
            id: "uZcVDBVS68E_MtAgeQpElJxldF_6cY9sSvbWqx_qRh8wiu42lyRBRmh5yFeD_r9k130dMbFHBHI9RTFgdJQIzQ".to_string(),
            raw_id: Base64UrlSafeData(
                base64::decode("uZcVDBVS68E/MtAgeQpElJxldF/6cY9sSvbWqx/qRh8wiu42lyRBRmh5yFeD/r9k130dMbFHBHI9RTFgdJQIzQ==").unwrap()
            ),
            response: AuthenticatorAttestationResponseRaw {
                attestation_object: Base64UrlSafeData(
                    base64::decode("o2NmbXRmcGFja2VkZ2F0dFN0bXSjY2FsZyZjc2lnWEcwRQIhAKAZODmj+uF5qXsDY2NFol3apRjld544KRUpHzwfk5cbAiBnp2gHmamr2xr46ilQuhzIR9BwMlwtxWd6IT2QEYeo7WN4NWOBWQLBMIICvTCCAaWgAwIBAgIEK/F8eDANBgkqhkiG9w0BAQsFADAuMSwwKgYDVQQDEyNZdWJpY28gVTJGIFJvb3QgQ0EgU2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAwMDBaGA8yMDUwMDkwNDAwMDAwMFowbjELMAkGA1UEBhMCU0UxEjAQBgNVBAoMCVl1YmljbyBBQjEiMCAGA1UECwwZQXV0aGVudGljYXRvciBBdHRlc3RhdGlvbjEnMCUGA1UEAwweWXViaWNvIFUyRiBFRSBTZXJpYWwgNzM3MjQ2MzI4MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEdMLHhCPIcS6bSPJZWGb8cECuTN8H13fVha8Ek5nt+pI8vrSflxb59Vp4bDQlH8jzXj3oW1ZwUDjHC6EnGWB5i6NsMGowIgYJKwYBBAGCxAoCBBUxLjMuNi4xLjQuMS40MTQ4Mi4xLjcwEwYLKwYBBAGC5RwCAQEEBAMCAiQwIQYLKwYBBAGC5RwBAQQEEgQQxe9V/62aS5+1gK3rr+Am0DAMBgNVHRMBAf8EAjAAMA0GCSqGSIb3DQEBCwUAA4IBAQCLbpN2nXhNbunZANJxAn/Cd+S4JuZsObnUiLnLLS0FPWa01TY8F7oJ8bE+aFa4kTe6NQQfi8+yiZrQ8N+JL4f7gNdQPSrH+r3iFd4SvroDe1jaJO4J9LeiFjmRdcVa+5cqNF4G1fPCofvw9W4lKnObuPakr0x/icdVq1MXhYdUtQk6Zr5mBnc4FhN9qi7DXqLHD5G7ZFUmGwfIcD2+0m1f1mwQS8yRD5+/aDCf3vutwddoi3crtivzyromwbKklR4qHunJ75LGZLZA8pJ/mXnUQ6TTsgRqPvPXgQPbSyGMf2z/DIPbQqCD/Bmc4dj9o6LozheBdDtcZCAjSPTAd/uiaGF1dGhEYXRhWMS3tF916xTswLEZrAO3fy8EzMmvvR8f5wWM7F5+4KJ0ikEAAAACxe9V/62aS5+1gK3rr+Am0ABAuZcVDBVS68E/MtAgeQpElJxldF/6cY9sSvbWqx/qRh8wiu42lyRBRmh5yFeD/r9k130dMbFHBHI9RTFgdJQIzaUBAgMmIAEhWCDCfn9t/BeDFfwG32Ms/owb5hFeBYUcaCmQRauVoRrI8yJYII97t5wYshX4dZ+iRas0vPwaOwYvZ1wTOnVn+QDbCF/E").unwrap()
                ),
                client_data_json: Base64UrlSafeData(
                    base64::decode("eyJ0eXBlIjoid2ViYXV0aG4uY3JlYXRlIiwib3JpZ2luIjoiaHR0cHM6XC9cLzE3Mi4yMC4wLjE0MTo4NDQzIiwiY2hhbGxlbmdlIjoidHZSMW0tZF9vaFhyd1Z4UWpNZ0g4S25vdkhaN0JSV2habURONFRWTXBOVSJ9").unwrap()
                ),
                transports: None,
            },
            type_: "public-key".to_string(),
        };

        let result = wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred);
        println!("{:?}", result);
        assert!(result.is_ok());
    }

    #[test]
    fn test_win_hello() {
        let wan = engine("etools-dev.example.com", "https://etools-dev.example.com:8080");

        let chal = Challenge::from(vec![
            74, 241, 134, 112, 56, 220, 92, 176, 0, 36, 111, 199, 249, 62, 118, 186, 192, 85, 50,
            234, 81, 33, 125, 49, 22, 78, 66, 76, 148, 117, 19, 116,
        ]);
        let registry = registry_with(&chal);

        // An RS256 credential from Windows Hello, attestation format none.
        let rsp_d = RegisterPublicKeyCredential {
            id: "PED8_-7TSU5EpNxc-g5lT8WCM53WORIMiHJ6zeXGZwY".to_string(),
            raw_id: Base64UrlSafeData(vec![
                60, 64, 252, 255, 238, 211, 73, 78, 68, 164, 220, 92, 250, 14, 101, 79, 197, 130,
                51, 157, 214, 57, 18, 12, 136, 114, 122, 205, 229, 198, 103, 6,
            ]),
            response: AuthenticatorAttestationResponseRaw {
                attestation_object: Base64UrlSafeData(vec![
                    163, 99, 102, 109, 116, 100, 110, 111, 110, 101, 103, 97, 116, 116, 83, 116,
                    109, 116, 160, 104, 97, 117, 116, 104, 68, 97, 116, 97, 89, 1, 103, 108, 41,
                    129, 232, 231, 178, 172, 146, 198, 102, 0, 255, 160, 250, 221, 227, 137, 40,
                    196, 142, 208, 221, 115, 246, 47, 198, 69, 45, 165, 107, 42, 27, 69, 0, 0, 0,
                    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 32, 60, 64, 252, 255,
                    238, 211, 73, 78, 68, 164, 220, 92, 250, 14, 101, 79, 197, 130, 51, 157, 214,
                    57, 18, 12, 136, 114, 122, 205, 229, 198, 103, 6, 164, 1, 3, 3, 57, 1, 0, 32,
                    89, 1, 0, 173, 194, 213, 63, 70, 46, 44, 10, 86, 206, 39, 143, 89, 219, 12,
                    140, 12, 222, 149, 238, 205, 40, 16, 26, 229, 31, 136, 128, 86, 61, 207, 18,
                    76, 192, 54, 81, 85, 118, 172, 188, 155, 205, 32, 47, 60, 105, 152, 81, 6, 205,
                    242, 36, 64, 78, 112, 21, 37, 150, 78, 160, 236, 177, 31, 104, 120, 216, 6, 52,
                    64, 85, 245, 254, 222, 202, 72, 230, 101, 18, 13, 248, 207, 146, 101, 125, 94,
                    75, 43, 18, 88, 122, 96, 70, 196, 134, 24, 11, 205, 249, 225, 184, 42, 129,
                    153, 205, 94, 106, 6, 161, 78, 73, 137, 203, 232, 92, 231, 26, 48, 122, 54,
                    230, 133, 62, 55, 5, 91, 34, 216, 164, 29, 88, 163, 243, 55, 69, 190, 200, 22,
                    35, 87, 205, 169, 110, 86, 65, 97, 39, 21, 170, 27, 40, 248, 182, 230, 27, 32,
                    57, 32, 223, 75, 174, 108, 220, 15, 12, 0, 142, 143, 120, 60, 143, 162, 24,
                    236, 139, 94, 230, 118, 199, 106, 164, 121, 219, 30, 53, 125, 205, 143, 58, 67,
                    95, 198, 74, 107, 118, 206, 121, 166, 80, 219, 102, 206, 182, 50, 74, 240, 106,
                    203, 81, 32, 136, 178, 224, 39, 39, 146, 65, 61, 94, 119, 240, 158, 99, 167,
                    212, 110, 139, 108, 250, 95, 131, 255, 26, 116, 113, 210, 100, 107, 10, 172,
                    161, 143, 129, 138, 120, 86, 215, 235, 162, 151, 68, 202, 9, 123, 208, 176, 27,
                    33, 67, 1, 0, 1,
                ]),
                client_data_json: Base64UrlSafeData(vec![
                    123, 34, 116, 121, 112, 101, 34, 58, 34, 119, 101, 98, 97, 117, 116, 104, 110,
                    46, 99, 114, 101, 97, 116, 101, 34, 44, 34, 99, 104, 97, 108, 108, 101, 110,
                    103, 101, 34, 58, 34, 83, 118, 71, 71, 99, 68, 106, 99, 88, 76, 65, 65, 74, 71,
                    95, 72, 45, 84, 53, 50, 117, 115, 66, 86, 77, 117, 112, 82, 73, 88, 48, 120,
                    70, 107, 53, 67, 84, 74, 82, 49, 69, 51, 81, 34, 44, 34, 111, 114, 105, 103,
                    105, 110, 34, 58, 34, 104, 116, 116, 112, 115, 58, 47, 47, 101, 116, 111, 111,
                    108, 115, 45, 100, 101, 118, 46, 101, 120, 97, 109, 112, 108, 101, 46, 99, 111,
                    109, 58, 56, 48, 56, 48, 34, 44, 34, 99, 114, 111, 115, 115, 79, 114, 105, 103,
                    105, 110, 34, 58, 102, 97, 108, 115, 101, 125,
                ]),
                transports: None,
            },
            type_: "public-key".to_string(),
        };

        let result = wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Required);
        println!("{:?}", result);
        assert!(result.is_ok());
        let cred = result.unwrap().credential;
        assert!(cred.user_verified);
        assert!(matches!(
            cred.cred.key,
            crate::crypto::COSEKeyType::RSA(_)
        ));
    }

    #[test]
    fn test_authentication_rs256() {
        use openssl::{hash::MessageDigest, pkey::PKey, rsa::Rsa, sign::Signer};

        let wan = engine("localhost", "http://localhost:8080");
        let chal = Challenge::random();
        let registry = registry_with(&chal);

        // A locally generated RSA credential, asserting over a client
        // data built for the issued challenge.
        let rsa = Rsa::generate(2048).unwrap();
        let cred = Credential {
            cred_id: Base64UrlSafeData(vec![0x10; 16]),
            cred: COSEKey {
                type_: COSEAlgorithm::RS256,
                key: COSEKeyType::RSA(COSERSAKey {
                    n: rsa.n().to_vec().into(),
                    e: [0x01, 0x00, 0x01],
                }),
            },
            counter: 1,
            user_verified: false,
            backup_eligible: false,
            backup_state: false,
            transports: None,
            registration_policy: UserVerificationPolicy::Preferred,
            attestation_metadata: AttestationMetadata::None,
        };

        let client_data = format!(
            r#"{{"type":"webauthn.get","challenge":"{}","origin":"http://localhost:8080"}}"#,
            base64::encode_config(chal.as_ref(), base64::URL_SAFE_NO_PAD)
        );
        let client_data_bytes = client_data.into_bytes();

        // rpIdHash, UP flag, counter 2.
        let mut auth_data = crate::crypto::compute_sha256(b"localhost").to_vec();
        auth_data.push(0x01);
        auth_data.extend_from_slice(&2u32.to_be_bytes());

        let cdh = crate::crypto::compute_sha256(&client_data_bytes);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&cdh);

        let pkey = PKey::from_rsa(rsa).unwrap();
        let mut signer = Signer::new(MessageDigest::sha256(), &pkey).unwrap();
        signer.update(&signed).unwrap();
        let signature = signer.sign_to_vec().unwrap();

        let rsp_d = PublicKeyCredential {
            id: "EBAQEBAQEBAQEBAQEBAQEA".to_string(),
            raw_id: Base64UrlSafeData(vec![0x10; 16]),
            response: AuthenticatorAssertionResponseRaw {
                authenticator_data: Base64UrlSafeData(auth_data),
                client_data_json: Base64UrlSafeData(client_data_bytes),
                signature: Base64UrlSafeData(signature),
                user_handle: None,
            },
            type_: "public-key".to_string(),
        };

        let r = wan.authenticate_credential(&rsp_d, &registry, &cred);
        println!("RESULT: {:?}", r);
        assert!(r.is_ok());
        let r = r.unwrap();
        assert_eq!(r.counter, 2);
        assert!(!r.user_verified);
    }

    #[test]
    fn test_registration_mismatched_credential_id_rejects() {
        let wan = engine("127.0.0.1", "http://127.0.0.1:8080");
        let zero_chal = Challenge::from(vec![0; crate::constants::CHALLENGE_SIZE_BYTES]);
        let registry = registry_with(&zero_chal);

        // The yubico u2f response with its top level id swapped out. The
        // attested credential data still names the real id, so the claim
        // must not be believed.
        let rsp = r#"
        {
            "id":"AAAA",
            "rawId":"AAAA",
            "response":{
                 "attestationObject":"o2NmbXRoZmlkby11MmZnYXR0U3RtdKJjc2lnWEcwRQIhALjRb43YFcbJ3V9WiYPpIrZkhgzAM6KTR8KIjwCXejBCAiAO5Lvp1VW4dYBhBDv7HZIrxZb1SwKKYOLfFRXykRxMqGN4NWOBWQLBMIICvTCCAaWgAwIBAgIEGKxGwDANBgkqhkiG9w0BAQsFADAuMSwwKgYDVQQDEyNZdWJpY28gVTJGIFJvb3QgQ0EgU2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAwMDBaGA8yMDUwMDkwNDAwMDAwMFowbjELMAkGA1UEBhMCU0UxEjAQBgNVBAoMCVl1YmljbyBBQjEiMCAGA1UECwwZQXV0aGVudGljYXRvciBBdHRlc3RhdGlvbjEnMCUGA1UEAwweWXViaWNvIFUyRiBFRSBTZXJpYWwgNDEzOTQzNDg4MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEeeo7LHxJcBBiIwzSP-tg5SkxcdSD8QC-hZ1rD4OXAwG1Rs3Ubs_K4-PzD4Hp7WK9Jo1MHr03s7y-kqjCrutOOqNsMGowIgYJKwYBBAGCxAoCBBUxLjMuNi4xLjQuMS40MTQ4Mi4xLjcwEwYLKwYBBAGC5RwCAQEEBAMCBSAwIQYLKwYBBAGC5RwBAQQEEgQQy2lIHo_3QDmT7AonKaFUqDAMBgNVHRMBAf8EAjAAMA0GCSqGSIb3DQEBCwUAA4IBAQCXnQOX2GD4LuFdMRx5brr7Ivqn4ITZurTGG7tX8-a0wYpIN7hcPE7b5IND9Nal2bHO2orh_tSRKSFzBY5e4cvda9rAdVfGoOjTaCW6FZ5_ta2M2vgEhoz5Do8fiuoXwBa1XCp61JfIlPtx11PXm5pIS2w3bXI7mY0uHUMGvxAzta74zKXLslaLaSQibSKjWKt9h-SsXy4JGqcVefOlaQlJfXL1Tga6wcO0QTu6Xq-Uw7ZPNPnrpBrLauKDd202RlN4SP7ohL3d9bG6V5hUz_3OusNEBZUn5W3VmPj1ZnFavkMB3RkRMOa58MZAORJT4imAPzrvJ0vtv94_y71C6tZ5aGF1dGhEYXRhWMQSyhe0mvIolDbzA-AWYDCiHlJdJm4gkmdDOAGo_UBxoEEAAAAAAAAAAAAAAAAAAAAAAAAAAABA0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6IqUBAgMmIAEhWCCe1KvqpcVWN416_QZc8vJynt3uo3_WeJ2R4uj6kJbaiiJYIDC5ssxxummKviGgLoP9ZLFb836A9XfRO7op18QY3i5m",
                 "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBIiwiY2xpZW50RXh0ZW5zaW9ucyI6e30sImhhc2hBbGdvcml0aG0iOiJTSEEtMjU2Iiwib3JpZ2luIjoiaHR0cDovLzEyNy4wLjAuMTo4MDgwIiwidHlwZSI6IndlYmF1dGhuLmNyZWF0ZSJ9"
            },
            "type":"public-key"}
        "#;
        let rsp_d: RegisterPublicKeyCredential = serde_json::from_str(rsp).unwrap();

        assert!(matches!(
            wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred),
            Err(WebauthnError::CredentialIdMismatch)
        ));
    }

    #[test]
    fn test_registration_wrong_credential_type_rejects() {
        let wan = engine("127.0.0.1", "http://127.0.0.1:8080");
        let zero_chal = Challenge::from(vec![0; crate::constants::CHALLENGE_SIZE_BYTES]);
        let registry = registry_with(&zero_chal);

        let rsp = r#"
        {
            "id":"0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6Ig",
            "rawId":"0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6Ig",
            "response":{
                 "attestationObject":"o2NmbXRoZmlkby11MmZnYXR0U3RtdKJjc2lnWEcwRQIhALjRb43YFcbJ3V9WiYPpIrZkhgzAM6KTR8KIjwCXejBCAiAO5Lvp1VW4dYBhBDv7HZIrxZb1SwKKYOLfFRXykRxMqGN4NWOBWQLBMIICvTCCAaWgAwIBAgIEGKxGwDANBgkqhkiG9w0BAQsFADAuMSwwKgYDVQQDEyNZdWJpY28gVTJGIFJvb3QgQ0EgU2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAwMDBaGA8yMDUwMDkwNDAwMDAwMFowbjELMAkGA1UEBhMCU0UxEjAQBgNVBAoMCVl1YmljbyBBQjEiMCAGA1UECwwZQXV0aGVudGljYXRvciBBdHRlc3RhdGlvbjEnMCUGA1UEAwweWXViaWNvIFUyRiBFRSBTZXJpYWwgNDEzOTQzNDg4MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEeeo7LHxJcBBiIwzSP-tg5SkxcdSD8QC-hZ1rD4OXAwG1Rs3Ubs_K4-PzD4Hp7WK9Jo1MHr03s7y-kqjCrutOOqNsMGowIgYJKwYBBAGCxAoCBBUxLjMuNi4xLjQuMS40MTQ4Mi4xLjcwEwYLKwYBBAGC5RwCAQEEBAMCBSAwIQYLKwYBBAGC5RwBAQQEEgQQy2lIHo_3QDmT7AonKaFUqDAMBgNVHRMBAf8EAjAAMA0GCSqGSIb3DQEBCwUAA4IBAQCXnQOX2GD4LuFdMRx5brr7Ivqn4ITZurTGG7tX8-a0wYpIN7hcPE7b5IND9Nal2bHO2orh_tSRKSFzBY5e4cvda9rAdVfGoOjTaCW6FZ5_ta2M2vgEhoz5Do8fiuoXwBa1XCp61JfIlPtx11PXm5pIS2w3bXI7mY0uHUMGvxAzta74zKXLslaLaSQibSKjWKt9h-SsXy4JGqcVefOlaQlJfXL1Tga6wcO0QTu6Xq-Uw7ZPNPnrpBrLauKDd202RlN4SP7ohL3d9bG6V5hUz_3OusNEBZUn5W3VmPj1ZnFavkMB3RkRMOa58MZAORJT4imAPzrvJ0vtv94_y71C6tZ5aGF1dGhEYXRhWMQSyhe0mvIolDbzA-AWYDCiHlJdJm4gkmdDOAGo_UBxoEEAAAAAAAAAAAAAAAAAAAAAAAAAAABA0xYE4bQ_HZM51-XYwp7WHJu8RfeA2Oz3_9HnNIZAKqRTz9gsUlF3QO7EqcJ0pgLSwDcq6cL1_aQpTtKLeGu6IqUBAgMmIAEhWCCe1KvqpcVWN416_QZc8vJynt3uo3_WeJ2R4uj6kJbaiiJYIDC5ssxxummKviGgLoP9ZLFb836A9XfRO7op18QY3i5m",
                 "clientDataJSON":"eyJjaGFsbGVuZ2UiOiJBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFBIiwiY2xpZW50RXh0ZW5zaW9ucyI6e30sImhhc2hBbGdvcml0aG0iOiJTSEEtMjU2Iiwib3JpZ2luIjoiaHR0cDovLzEyNy4wLjAuMTo4MDgwIiwidHlwZSI6IndlYmF1dGhuLmNyZWF0ZSJ9"
            },
            "type":"password"}
        "#;
        let rsp_d: RegisterPublicKeyCredential = serde_json::from_str(rsp).unwrap();

        assert!(matches!(
            wan.register_credential(&rsp_d, &registry, UserVerificationPolicy::Preferred),
            Err(WebauthnError::InvalidCredentialType)
        ));
    }

    #[test]
    fn test_authentication_wrong_credential_type_rejects() {
        let wan = engine("localhost", "http://localhost:8080");
        let chal = localhost_assertion_challenge();
        let registry = registry_with(&chal);
        let cred = localhost_authentication_credential(1, UserVerificationPolicy::Preferred);

        let mut rsp_d = localhost_assertion();
        rsp_d.type_ = "password".to_string();
        assert!(matches!(
            wan.authenticate_credential(&rsp_d, &registry, &cred),
            Err(WebauthnError::InvalidCredentialType)
        ));
    }
}
