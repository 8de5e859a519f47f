//! Resource version computation for the file adapter.

use sha2::{Digest, Sha256};

use crate::domain::ResourceVersion;

/// Derives a resource version from the stored bytes of a record.
///
/// Any change to the stored document yields a new version, which is what the
/// optimistic-concurrency check compares.
#[must_use]
pub fn version_of(content: &[u8]) -> ResourceVersion {
    let mut hasher = Sha256::new();
    hasher.update(content);
    ResourceVersion::new(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_deterministic() {
        assert_eq!(version_of(b"{\"id\":\"a\"}"), version_of(b"{\"id\":\"a\"}"));
        assert_ne!(version_of(b"{\"id\":\"a\"}"), version_of(b"{\"id\":\"b\"}"));
        assert_eq!(version_of(b"").as_str().len(), 64);
    }
}
