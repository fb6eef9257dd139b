//! Command implementations.
//!
//! Each command returns its report as text; `main` decides where it goes.

use std::{fmt::Write as _, path::Path};

use shroud_core::{AccessMode, AccessModeStore, RecipientId, RedbStorage, StorageError};
use shroud_crypto::{
    AccessKeyError, CertificateError, CertificateValidator, SenderCertificate, TrustRoot,
    TrustRootError, derive_access_key,
};
use thiserror::Error;
use tracing::{debug, info};

/// Errors reported by the CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// Offending path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Argument was not valid hex
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Profile key had the wrong length
    #[error(transparent)]
    AccessKey(#[from] AccessKeyError),

    /// Certificate blob did not parse
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// Trust root override was unusable
    #[error(transparent)]
    TrustRoot(#[from] TrustRootError),

    /// Database failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of a certificate inspection.
#[derive(Debug)]
pub struct Inspection {
    /// Human-readable report
    pub report: String,
    /// Whether the certificate validated
    pub valid: bool,
}

/// Parse `bytes` as a sender certificate and validate it at
/// `validation_time_ms`.
///
/// A certificate that parses but fails validation is reported, not returned
/// as an error.
pub fn inspect_certificate(
    bytes: &[u8],
    trust_root: TrustRoot,
    revoked_key_ids: &[u32],
    validation_time_ms: u64,
) -> Result<Inspection, CliError> {
    let cert = SenderCertificate::deserialize(bytes)?;
    let validator =
        CertificateValidator::new(trust_root).with_revoked_key_ids(revoked_key_ids.iter().copied());
    let verdict = validator.validate(&cert, validation_time_ms);

    let mut report = String::new();
    let _ = writeln!(report, "sender_uuid:    {}", cert.sender_uuid());
    let _ = writeln!(report, "sender_e164:    {}", cert.sender_e164().unwrap_or("-"));
    let _ = writeln!(report, "sender_device:  {}", cert.sender_device());
    let _ = writeln!(report, "expires_ms:     {}", cert.expires_ms());
    let _ = writeln!(report, "identity_key:   {}", hex::encode(cert.identity_key()));
    let _ = writeln!(report, "server_key_id:  {}", cert.signer().key_id());
    let _ = writeln!(report, "server_key:     {}", hex::encode(cert.signer().key().as_bytes()));
    match &verdict {
        Ok(()) => {
            let _ = write!(report, "status:         valid at {validation_time_ms}");
        },
        Err(e) => {
            let _ = write!(report, "status:         invalid ({e})");
        },
    }

    debug!(valid = verdict.is_ok(), "Inspected certificate");
    Ok(Inspection { report, valid: verdict.is_ok() })
}

/// Read a certificate blob from `path`.
pub fn read_certificate(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path)
        .map_err(|source| CliError::Read { path: path.display().to_string(), source })
}

/// Hex access key derived from a hex profile key.
pub fn derive_key(profile_key_hex: &str) -> Result<String, CliError> {
    let profile_key = hex::decode(profile_key_hex.trim())?;
    let access_key = derive_access_key(&profile_key)?;
    Ok(hex::encode(access_key.as_bytes()))
}

/// Persisted access mode of `recipient` in the database at `db`.
pub fn get_mode(db: &Path, recipient: &str) -> Result<AccessMode, CliError> {
    let store = AccessModeStore::new(RedbStorage::open(db)?);
    Ok(store.get(&RecipientId::from(recipient))?)
}

/// Persist `mode` for `recipient` in the database at `db`.
pub fn set_mode(db: &Path, recipient: &str, mode: AccessMode) -> Result<(), CliError> {
    let store = AccessModeStore::new(RedbStorage::open(db)?);
    store.set(&RecipientId::from(recipient), mode)?;
    info!(recipient, %mode, "Access mode written");
    Ok(())
}

/// Trust root from a hex override.
pub fn parse_trust_root(hex_key: &str) -> Result<TrustRoot, CliError> {
    Ok(TrustRoot::from_bytes(&hex::decode(hex_key.trim())?)?)
}
