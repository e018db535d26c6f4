//! 64-bit fingerprints of client identity signals.

use sha2::{Digest, Sha256};

/// Fingerprint of `(ip, user agent, identity)`.
///
/// Fields are length-prefixed before hashing so that `("ab", "c")` and
/// `("a", "bc")` do not collide. Absent fields hash differently from empty
/// ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Compute the fingerprint.
    #[must_use]
    pub fn compute(ip: &str, user_agent: Option<&str>, identity: Option<[&str; 3]>) -> Self {
        let mut hasher = Sha256::new();
        feed(&mut hasher, Some(ip));
        feed(&mut hasher, user_agent);
        match identity {
            Some(fields) => {
                hasher.update([1]);
                for field in fields {
                    feed(&mut hasher, Some(field));
                }
            }
            None => hasher.update([0]),
        }
        let digest = hasher.finalize();
        let mut head = [0_u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(head))
    }

    /// Raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// 16 lowercase hex characters, the stored form.
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn feed(hasher: &mut Sha256, field: Option<&str>) {
    match field {
        Some(value) => {
            let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
            hasher.update([1]);
            hasher.update(len.to_le_bytes());
            hasher.update(value.as_bytes());
        }
        None => hasher.update([0]),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_deterministic() {
        let a = Fingerprint::compute("10.0.0.1", Some("curl/8"), Some(["1", "bob", "0001"]));
        let b = Fingerprint::compute("10.0.0.1", Some("curl/8"), Some(["1", "bob", "0001"]));
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 16);
    }

    #[test]
    fn test_every_signal_matters() {
        let base = Fingerprint::compute("10.0.0.1", Some("curl/8"), None);
        assert_ne!(base, Fingerprint::compute("10.0.0.2", Some("curl/8"), None));
        assert_ne!(base, Fingerprint::compute("10.0.0.1", Some("curl/9"), None));
        assert_ne!(base, Fingerprint::compute("10.0.0.1", None, None));
        assert_ne!(base, Fingerprint::compute("10.0.0.1", Some(""), None));
        assert_ne!(
            base,
            Fingerprint::compute("10.0.0.1", Some("curl/8"), Some(["1", "bob", "0001"]))
        );
    }

    proptest! {
        #[test]
        fn prop_field_boundaries_do_not_collide(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let joined = format!("{a}{b}");
            let split = Fingerprint::compute(&a, Some(b.as_str()), None);
            let shifted = Fingerprint::compute(&joined, Some(""), None);
            prop_assert_ne!(split, shifted);
        }

        #[test]
        fn prop_hex_roundtrips_value(ip in "[0-9.]{7,15}") {
            let fp = Fingerprint::compute(&ip, None, None);
            prop_assert_eq!(u64::from_str_radix(&fp.to_hex(), 16).unwrap(), fp.value());
        }
    }
}
