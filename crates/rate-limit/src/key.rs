//! Bucket keys.

use std::fmt;

const LOCK_SUFFIX: &str = ":lock";

/// Store key of one bucket counter, derived from a namespace, a dimension and a caller identity.
///
/// The companion lock entry lives at the same key with a `:lock` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey(String);

impl BucketKey {
    /// Build the key `{namespace}{dimension}:{identity}`.
    pub fn new(namespace: &str, dimension: &str, identity: &str) -> Self {
        Self(format!("{namespace}{dimension}:{identity}"))
    }

    /// The counter key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The lock entry key.
    pub fn lock_key(&self) -> String {
        format!("{}{LOCK_SUFFIX}", self.0)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let key = BucketKey::new("RL:", "ip", "::1");

        assert_eq!(key.as_str(), "RL:ip:::1");
        assert_eq!(key.lock_key(), "RL:ip:::1:lock");
    }

    #[test]
    fn identities_do_not_share_buckets() {
        let a = BucketKey::new("RL:", "ip", "10.0.0.1");
        let b = BucketKey::new("RL:", "ip", "10.0.0.2");
        let c = BucketKey::new("RL:", "client", "10.0.0.1");

        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
