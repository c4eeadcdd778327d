//! Library wide constants

/// The size of a generated challenge in bytes.
pub const CHALLENGE_SIZE_BYTES: usize = 32;

/// How long a remembered challenge remains valid before it is discarded.
pub const CHALLENGE_TIMEOUT_SECONDS: u64 = 60;

/// Serialised credential format, first revision.
pub(crate) const CREDENTIAL_VERSION_1: u8 = 1;

/// Serialised credential format, second revision. Adds state flags
/// and optional transport hints.
pub(crate) const CREDENTIAL_VERSION_2: u8 = 2;

/// The high bit of the version byte is reserved for future expansion of
/// the version space. Any record with it set is from a future revision
/// of this library and must be rejected.
pub(crate) const CREDENTIAL_VERSION_RESERVED_MASK: u8 = 0x80;

/// Upper bound on the decoded size of a serialised credential. Anything
/// larger is corrupt or hostile.
pub(crate) const CREDENTIAL_MAX_SIZE_BYTES: usize = 65536;
