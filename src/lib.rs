//! Webauthn credential verification for Rust server applications.
//!
//! Webauthn is a standard allowing communication between servers, browsers and
//! authenticators to allow strong, passwordless, cryptographic authentication
//! to be performed. This library implements the server side of the two
//! ceremonies, registration and authentication, so that you can verify the
//! responses a browser submits and persist the resulting credentials.
//!
//! To use this library you will want a [rp::RelyingParty] describing your
//! site, a [ChallengeRegistry] holding outstanding challenges (the bundled
//! [ephemeral::EphemeralChallengeRegistry] suits a single server process),
//! and the [Webauthn] engine that drives the ceremonies.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
// #![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

#[macro_use]
mod macros;

mod constants;
mod cursor;
mod internals;

mod attestation;
pub mod codec;
pub mod core;
pub mod crypto;
pub mod ephemeral;
pub mod error;
pub mod interface;
pub mod proto;
pub mod rp;

pub use crate::core::Webauthn;
pub use crate::interface::{
    AttestationMetadata, AuthenticationResult, Challenge, ChallengeRegistry,
    CounterRegressionPolicy, Credential, ParsedAttestationData, RegistrationResult,
};
pub use base64urlsafedata::Base64UrlSafeData;
