//! `ResponseFingerprint`: a pure function mapping
//! (method, path, normalized-query, authorization-identity, body-bytes) to an
//! opaque fixed-width digest, used to key the `ResponseCache`.

use std::fmt;

/// 32-byte BLAKE3 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Computes the digest from the request facets that distinguish cache entries.
    /// Each facet is length-prefixed into the hasher so that, e.g., an empty query
    /// plus a one-byte body can never collide with a one-byte query plus an empty
    /// body.
    pub fn compute(method: &str, path: &str, query: &str, authorization: &str, body: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in [method.as_bytes(), path.as_bytes(), query.as_bytes(), authorization.as_bytes(), body] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_encode(&self.0))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_identical_digests() {
        let a = Fingerprint::compute("GET", "/health", "", "tenant-a", b"");
        let b = Fingerprint::compute("GET", "/health", "", "tenant-a", b"");
        assert_eq!(a, b);
    }

    #[test]
    fn method_change_flips_digest() {
        let a = Fingerprint::compute("GET", "/health", "", "tenant-a", b"");
        let b = Fingerprint::compute("POST", "/health", "", "tenant-a", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn path_change_flips_digest() {
        let a = Fingerprint::compute("GET", "/health", "", "tenant-a", b"");
        let b = Fingerprint::compute("GET", "/metrics", "", "tenant-a", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn query_change_flips_digest() {
        let a = Fingerprint::compute("GET", "/health", "a=1", "tenant-a", b"");
        let b = Fingerprint::compute("GET", "/health", "a=2", "tenant-a", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn authorization_change_flips_digest() {
        let a = Fingerprint::compute("GET", "/health", "", "tenant-a", b"");
        let b = Fingerprint::compute("GET", "/health", "", "tenant-b", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn body_change_flips_digest() {
        let a = Fingerprint::compute("POST", "/v1/command", "", "tenant-a", b"{}");
        let b = Fingerprint::compute("POST", "/v1/command", "", "tenant-a", b"{\"x\":1}");
        assert_ne!(a, b);
    }

    #[test]
    fn facet_boundaries_do_not_collide() {
        // "ab" + "" must differ from "a" + "b" once facets are concatenated.
        let a = Fingerprint::compute("ab", "", "", "", b"");
        let b = Fingerprint::compute("a", "b", "", "", b"");
        assert_ne!(a, b);
    }
}
