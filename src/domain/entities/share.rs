use std::path::PathBuf;

/// A named, absolute directory on local disk exposed under the same name
/// on both the JSON API and the WebDAV surface.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Share {
    pub name: String,
    pub path: PathBuf,
    /// `None` or `<= 0` means unlimited.
    pub quota_bytes: Option<i64>,
}

impl Share {
    pub fn new(name: impl Into<String>, path: PathBuf, quota_bytes: Option<i64>) -> Self {
        Self {
            name: name.into(),
            path,
            quota_bytes: quota_bytes.filter(|q| *q > 0),
        }
    }

    /// `None` means unlimited, matching spec.md: "quota_bytes <= 0 normalizes to unlimited".
    pub fn quota_limit(&self) -> Option<u64> {
        self.quota_bytes.and_then(|q| if q > 0 { Some(q as u64) } else { None })
    }
}
