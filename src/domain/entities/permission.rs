use serde::{Deserialize, Serialize};

/// Closed permission set: read, write, delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Delete,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Delete => "delete",
        }
    }
}

/// The operation a request is attempting; maps to exactly one [`Permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Download,
    Upload,
    Mkdir,
    Rename,
    Delete,
    /// WebDAV COPY/MOVE destination checks and source checks are split by
    /// the caller into Write (destination) and Delete (source) already;
    /// this variant exists for the few places that need "either" framing.
    CopyMove,
}

impl Operation {
    /// Operations map: list/download -> R; upload/mkdir/rename -> W; delete -> D.
    pub fn required_permission(&self) -> Permission {
        match self {
            Operation::List | Operation::Download => Permission::Read,
            Operation::Upload | Operation::Mkdir | Operation::Rename => Permission::Write,
            Operation::Delete => Permission::Delete,
            Operation::CopyMove => Permission::Write,
        }
    }
}
