//! Shroud Cryptographic Primitives
//!
//! Cryptographic building blocks for sealed-sender ("unidentified") delivery.
//! Pure functions with deterministic outputs. Callers provide random bytes for
//! deterministic testing.
//!
//! # Trust Chain
//!
//! A sender certificate is accepted only if every link of the chain verifies
//! and the certificate outlives the caller's validation horizon.
//!
//! ```text
//! Trust Root (compiled in, per deployment)
//!        │ signs
//!        ▼
//! Server Certificate (key_id, server key)
//!        │ signs
//!        ▼
//! Sender Certificate (sender, device, identity key, expiry)
//! ```
//!
//! # Access Keys
//!
//! ```text
//! Profile Key (32 bytes)
//!        │
//!        ▼
//! HKDF-SHA256 → Access Key (16 bytes, deterministic)
//!
//! Random bytes (16) → Access Key (unrestricted recipients)
//! ```
//!
//! # Security
//!
//! - Access keys are zeroized on drop and never printed by `Debug`
//! - Unrestricted keys are fresh per request so that key stability cannot
//!   fingerprint unrestricted accounts
//! - Certificates are validated at a caller-chosen horizon, not at "now", so a
//!   send that starts just after the check cannot outlive the certificate

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod access_key;
pub mod certificate;
mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use access_key::{ACCESS_KEY_LEN, AccessKey, PROFILE_KEY_LEN, derive_access_key};
pub use certificate::{
    CertificateValidator, Deployment, SenderCertificate, ServerCertificate, TrustRoot,
};
pub use error::{AccessKeyError, CertificateError, TrustRootError};
