use std::sync::Arc;

pub const DEFAULT_USER_HEADER: &str = "X-Remote-User";
pub const DEFAULT_GROUP_HEADER: &str = "X-Remote-Group";
pub const DEFAULT_EXTRA_HEADER_PREFIX: &str = "X-Remote-Extra-";

/// The header names trusted for identity extraction.
///
/// Snapshots are immutable: the watcher publishes a replacement rather than
/// mutating the live value, so a request in flight sees either the old or the
/// new set of names in its entirety.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderConfig {
    /// Names that may carry the authenticated user, scanned in order.
    pub user_headers: Vec<String>,

    /// Names that may carry group membership, scanned in order.
    pub group_headers: Vec<String>,

    /// Prefixes identifying extra-attribute headers, matched case-insensitively.
    pub extra_prefix_headers: Vec<String>,
}

/// Provides the current [`HeaderConfig`] snapshot.
pub trait AuthConfigSource {
    fn current(&self) -> Arc<HeaderConfig>;
}

// === impl HeaderConfig ===

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            user_headers: vec![DEFAULT_USER_HEADER.to_string()],
            group_headers: vec![DEFAULT_GROUP_HEADER.to_string()],
            extra_prefix_headers: vec![DEFAULT_EXTRA_HEADER_PREFIX.to_string()],
        }
    }
}

impl AuthConfigSource for Arc<HeaderConfig> {
    fn current(&self) -> Arc<HeaderConfig> {
        self.clone()
    }
}
