use std::fmt;

/// Machine-readable error codes for callers that branch on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfusableKey,
    KindMismatch,
    InvalidCopyCount,
    EmptyColorHandle,
    EmptyColorMix,
    CycleDetected,
    MasterAlreadySet,
    NothingToClaim,
    StepOutOfRange,
    StepNotFound,
    SnapshotHeaderInvalid,
    SnapshotChecksumMismatch,
    SnapshotCorrupt,
    SnapshotWriteFailed,
    SnapshotReadFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfusableKey => "E1001",
            Self::KindMismatch => "E1002",
            Self::InvalidCopyCount => "E2001",
            Self::EmptyColorHandle => "E2002",
            Self::EmptyColorMix => "E2003",
            Self::CycleDetected => "E2004",
            Self::MasterAlreadySet => "E3001",
            Self::NothingToClaim => "E3002",
            Self::StepOutOfRange => "E4001",
            Self::StepNotFound => "E4002",
            Self::SnapshotHeaderInvalid => "E6001",
            Self::SnapshotChecksumMismatch => "E6002",
            Self::SnapshotCorrupt => "E6003",
            Self::SnapshotWriteFailed => "E6004",
            Self::SnapshotReadFailed => "E6005",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfusableKey => "Confusable key type",
            Self::KindMismatch => "Wrong entity kind",
            Self::InvalidCopyCount => "Invalid copy count",
            Self::EmptyColorHandle => "Color has no handle",
            Self::EmptyColorMix => "Color mix has no components",
            Self::CycleDetected => "Cycle would be created",
            Self::MasterAlreadySet => "Owning step already set",
            Self::NothingToClaim => "Nothing left to claim",
            Self::StepOutOfRange => "Step number out of range",
            Self::StepNotFound => "Step not found",
            Self::SnapshotHeaderInvalid => "Snapshot header invalid",
            Self::SnapshotChecksumMismatch => "Snapshot checksum mismatch",
            Self::SnapshotCorrupt => "Snapshot corrupt",
            Self::SnapshotWriteFailed => "Snapshot write failed",
            Self::SnapshotReadFailed => "Snapshot read failed",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfusableKey => Some("Use `color.spray()` or `color.brush()` to get a Paint."),
            Self::InvalidCopyCount => Some("Request at least one copy."),
            Self::EmptyColorHandle => Some("Give the color a code, a name, or both."),
            Self::EmptyColorMix => Some("Mix at least one (color, ratio) pair."),
            Self::CycleDetected => Some("An assembly cannot contain itself, directly or nested."),
            Self::MasterAlreadySet => {
                Some("Each part belongs to one step; `attach` resets ownership of an assembly.")
            }
            Self::NothingToClaim => {
                Some("The assembly and all its members are already owned; attach new parts first.")
            }
            Self::StepOutOfRange => Some("Step numbers start at 1."),
            Self::SnapshotHeaderInvalid => Some("The file is not a modeltrack snapshot."),
            Self::SnapshotChecksumMismatch => {
                Some("The snapshot was modified or truncated; restore it from a backup.")
            }
            Self::SnapshotCorrupt => Some("Restore the snapshot from a backup."),
            Self::SnapshotWriteFailed => Some("Check disk space and write permissions."),
            Self::SnapshotReadFailed => Some("Check that the snapshot path exists and is readable."),
            Self::KindMismatch | Self::StepNotFound => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Broad failure category, independent of the specific code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An argument of the wrong domain type reached a runtime check.
    Type,
    /// A well-typed argument with an invalid value.
    Value,
    /// The call would break a single-assignment or monotonicity rule.
    State,
    /// A step lookup by number or name found nothing.
    Lookup,
}

/// Errors raised by the build graph and model operations.
///
/// Every variant is a contract violation by the caller; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    /// A value of a look-alike type was offered as a status key.
    #[error("{found} used where {expected} was expected")]
    ConfusableKey {
        expected: &'static str,
        found: &'static str,
    },

    /// `copy` was asked for zero copies.
    #[error("copy count must be a positive number, got {0}")]
    InvalidCopyCount(usize),

    /// A color with neither a code nor a name.
    #[error("no handle specified; code and name cannot both be empty")]
    EmptyColorHandle,

    /// A color mix without components.
    #[error("a color mix needs at least one component")]
    EmptyColorMix,

    /// Attaching would make an assembly contain itself.
    #[error("attaching to '{id}' would create a cycle")]
    Cycle { id: String },

    /// The write-once owner of a part was set a second time.
    #[error("owning step of '{id}' is already set")]
    MasterAlreadySet { id: String },

    /// Claiming an assembly changed nothing: it and every member are already owned.
    #[error("'{id}' and all of its members already have an owning step")]
    NothingToClaim { id: String },

    /// `get_step` by number outside `1..=len`.
    #[error("step number {number} is out of range (model has {len} steps)")]
    StepOutOfRange { number: usize, len: usize },

    /// `get_step` by name with no match.
    #[error("no step name matches '{0}'")]
    StepNotFound(String),
}

impl TrackError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ConfusableKey { .. } => ErrorCode::ConfusableKey,
            Self::InvalidCopyCount(_) => ErrorCode::InvalidCopyCount,
            Self::EmptyColorHandle => ErrorCode::EmptyColorHandle,
            Self::EmptyColorMix => ErrorCode::EmptyColorMix,
            Self::Cycle { .. } => ErrorCode::CycleDetected,
            Self::MasterAlreadySet { .. } => ErrorCode::MasterAlreadySet,
            Self::NothingToClaim { .. } => ErrorCode::NothingToClaim,
            Self::StepOutOfRange { .. } => ErrorCode::StepOutOfRange,
            Self::StepNotFound(_) => ErrorCode::StepNotFound,
        }
    }

    /// Failure category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfusableKey { .. } => ErrorKind::Type,
            Self::InvalidCopyCount(_)
            | Self::EmptyColorHandle
            | Self::EmptyColorMix
            | Self::Cycle { .. } => ErrorKind::Value,
            Self::MasterAlreadySet { .. } | Self::NothingToClaim { .. } => ErrorKind::State,
            Self::StepOutOfRange { .. } | Self::StepNotFound(_) => ErrorKind::Lookup,
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
