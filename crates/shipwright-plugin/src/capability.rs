//! Operations and the capability bitset plugins advertise.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

/// A file operation a plugin may support.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    /// Remove files from a target.
    Delete,
    /// Pull files from a target.
    Download,
    /// List a remote directory.
    List,
    /// Deploy files to a target.
    Upload,
}

impl Operation {
    /// The capability bit for this operation.
    pub fn capability(self) -> Capabilities {
        match self {
            Self::Delete => Capabilities::DELETE,
            Self::Download => Capabilities::DOWNLOAD,
            Self::List => Capabilities::LIST,
            Self::Upload => Capabilities::UPLOAD,
        }
    }

    /// Download and list pick one source; delete and upload fan out.
    pub fn is_single_target(self) -> bool {
        matches!(self, Self::Download | Self::List)
    }
}

/// Set of operations a plugin supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const DELETE: Self = Self(1);
    pub const DOWNLOAD: Self = Self(1 << 1);
    pub const LIST: Self = Self(1 << 2);
    pub const UPLOAD: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether `operation` is supported.
    pub fn supports(self, operation: Operation) -> bool {
        self.contains(operation.capability())
    }

    pub fn can_delete(self) -> bool {
        self.supports(Operation::Delete)
    }

    pub fn can_download(self) -> bool {
        self.supports(Operation::Download)
    }

    pub fn can_list(self) -> bool {
        self.supports(Operation::List)
    }

    pub fn can_upload(self) -> bool {
        self.supports(Operation::Upload)
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
