//! Per-recipient willingness to receive sealed-sender messages.
//!
//! Every never-configured recipient reads as `Unknown`. Any mode may move to
//! any other, but only through an explicit `set`; entries have no TTL.

use std::{fmt, str::FromStr};

use tracing::debug;

use crate::{
    account::RecipientId,
    storage::{Storage, StorageError, StoredValue},
};

/// Collection holding one entry per configured recipient.
pub const ACCESS_MODE_COLLECTION: &str = "ud.access_mode";

/// Recipient's sealed-sender access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// Never configured. Not eligible, but distinct from `Disabled`
    #[default]
    Unknown,
    /// Accepts sealed sender with a profile-key-derived access key
    Enabled,
    /// Refuses sealed sender
    Disabled,
    /// Accepts sealed sender with any access key
    Unrestricted,
}

impl AccessMode {
    /// Persisted ordinal.
    pub fn ordinal(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Enabled => 1,
            Self::Disabled => 2,
            Self::Unrestricted => 3,
        }
    }

    /// Mode for a persisted ordinal. `None` if unrecognized.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Unknown),
            1 => Some(Self::Enabled),
            2 => Some(Self::Disabled),
            3 => Some(Self::Unrestricted),
            _ => None,
        }
    }

    /// True for the modes that permit sealed-sender delivery.
    pub fn allows_sealed_sender(self) -> bool {
        matches!(self, Self::Enabled | Self::Unrestricted)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Unrestricted => "unrestricted",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            "unrestricted" => Ok(Self::Unrestricted),
            other => Err(format!("unknown access mode: {other}")),
        }
    }
}

/// Persistent recipient → [`AccessMode`] map.
#[derive(Clone)]
pub struct AccessModeStore<S: Storage> {
    storage: S,
}

impl<S: Storage> AccessModeStore<S> {
    /// Store backed by `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Last persisted mode for `recipient`.
    ///
    /// Absent entries, non-integer values, and unrecognized ordinals all read
    /// as `Unknown`. Only backend failures are errors.
    pub fn get(&self, recipient: &RecipientId) -> Result<AccessMode, StorageError> {
        let stored = self.storage.get(ACCESS_MODE_COLLECTION, recipient.as_str())?;

        let mode = match stored {
            None => AccessMode::Unknown,
            Some(StoredValue::Int(ordinal)) => match AccessMode::from_ordinal(ordinal) {
                Some(mode) => mode,
                None => {
                    debug!(
                        %recipient,
                        ordinal,
                        "Unrecognized access mode ordinal, treating as unknown"
                    );
                    AccessMode::Unknown
                },
            },
            Some(other) => {
                debug!(
                    %recipient,
                    ?other,
                    "Access mode stored with wrong type, treating as unknown"
                );
                AccessMode::Unknown
            },
        };

        Ok(mode)
    }

    /// Persist `mode` for `recipient`, unconditionally.
    pub fn set(&self, recipient: &RecipientId, mode: AccessMode) -> Result<(), StorageError> {
        let value = StoredValue::Int(mode.ordinal());
        self.storage.set(ACCESS_MODE_COLLECTION, recipient.as_str(), value)
    }
}
