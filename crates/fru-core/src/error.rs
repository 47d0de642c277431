use std::fmt;

/// Machine-readable error codes shared by the engine, the store adapters and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    UnknownResourceKind,
    SnapshotNotFound,
    DeviceNotFound,
    UnresolvedReference,
    InvalidStateTransition,
    MalformedPayload,
    CorruptRecord,
    StoreUnavailable,
    DuplicateRecord,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::UnknownResourceKind => "E1003",
            Self::SnapshotNotFound => "E2001",
            Self::DeviceNotFound => "E2002",
            Self::UnresolvedReference => "E2003",
            Self::InvalidStateTransition => "E2004",
            Self::MalformedPayload => "E3001",
            Self::CorruptRecord => "E3002",
            Self::StoreUnavailable => "E5001",
            Self::DuplicateRecord => "E5002",
            Self::LockContention => "E5003",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Inventory store not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::UnknownResourceKind => "No identity prefix for resource kind",
            Self::SnapshotNotFound => "Discovery snapshot not found",
            Self::DeviceNotFound => "Device not found",
            Self::UnresolvedReference => "Unresolved device reference",
            Self::InvalidStateTransition => "Invalid snapshot phase transition",
            Self::MalformedPayload => "Malformed discovery payload",
            Self::CorruptRecord => "Corrupt stored record",
            Self::StoreUnavailable => "Device store unavailable",
            Self::DuplicateRecord => "Record already exists",
            Self::LockContention => "Lock contention",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Submit a snapshot with `fru submit` to create the store."),
            Self::ConfigParseError => Some("Fix syntax in .fru/config.toml and retry."),
            Self::UnknownResourceKind => {
                Some("Add the kind to [identity.prefixes] in .fru/config.toml.")
            }
            Self::SnapshotNotFound | Self::DeviceNotFound => None,
            Self::UnresolvedReference => {
                Some("Submit a snapshot containing the parent device; links converge on a later run.")
            }
            Self::InvalidStateTransition => {
                Some("Follow valid phases: Pending -> Processing -> Completed | Error.")
            }
            Self::MalformedPayload => {
                Some("rawData must be a JSON array of device descriptor objects.")
            }
            Self::CorruptRecord => Some("Inspect the stored row; it no longer decodes."),
            Self::StoreUnavailable => Some("Retry `fru reconcile`; the snapshot is not Completed."),
            Self::DuplicateRecord => Some("Retry; a fresh identity will be generated."),
            Self::LockContention => Some("Retry after the other `fru` process releases its lock."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
