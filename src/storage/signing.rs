//! Time-limited read URLs.
//!
//! `{base}/{bucket}/{path}?expires={unix}&signature={sig}` where `sig` is the
//! URL-safe base64 SHA-256 of `secret \n bucket \n path \n expires`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Produces and checks signed read URLs for one bucket.
#[derive(Clone)]
pub struct UrlSigner {
    base_url: String,
    bucket: String,
    secret: Vec<u8>,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(base_url: &str, bucket: &str, secret: &[u8]) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            secret: secret.to_vec(),
        }
    }

    /// Signer with a random 32-byte secret; URLs do not survive a restart.
    pub fn with_random_secret(base_url: &str, bucket: &str) -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(base_url, bucket, &secret)
    }

    pub fn sign(&self, path: &str, ttl: std::time::Duration) -> String {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        self.sign_until(path, expires)
    }

    pub fn sign_until(&self, path: &str, expires: i64) -> String {
        let signature = self.signature(path, expires);
        format!(
            "{}/{}/{}?expires={expires}&signature={signature}",
            self.base_url, self.bucket, path
        )
    }

    /// Check a signature for `path` at time `now` (unix seconds).
    pub fn verify(&self, path: &str, expires: i64, signature: &str, now: i64) -> bool {
        if now > expires {
            return false;
        }
        let expected = self.signature(path, expires);
        // Constant-time compare over equal-length ASCII strings.
        expected.len() == signature.len()
            && expected
                .bytes()
                .zip(signature.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    fn signature(&self, path: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(b"\n");
        hasher.update(self.bucket.as_bytes());
        hasher.update(b"\n");
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("http://localhost:9000/", "digiarch-documents", b"secret")
    }

    fn split(url: &str) -> (i64, String) {
        let query = url.split_once('?').unwrap().1;
        let mut expires = 0;
        let mut sig = String::new();
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            match k {
                "expires" => expires = v.parse().unwrap(),
                "signature" => sig = v.to_string(),
                _ => {}
            }
        }
        (expires, sig)
    }

    #[test]
    fn url_contains_bucket_and_path() {
        let url = signer().sign_until("General/Invoice_Doe_Jane.pdf", 1_700_000_000);
        assert!(url.starts_with(
            "http://localhost:9000/digiarch-documents/General/Invoice_Doe_Jane.pdf?expires=1700000000&signature="
        ));
    }

    #[test]
    fn signature_verifies_before_expiry() {
        let s = signer();
        let url = s.sign_until("a/b.pdf", 2_000);
        let (expires, sig) = split(&url);
        assert!(s.verify("a/b.pdf", expires, &sig, 1_000));
    }

    #[test]
    fn expired_or_tampered_signature_rejected() {
        let s = signer();
        let url = s.sign_until("a/b.pdf", 2_000);
        let (expires, sig) = split(&url);
        assert!(!s.verify("a/b.pdf", expires, &sig, 2_001));
        assert!(!s.verify("a/c.pdf", expires, &sig, 1_000));
        assert!(!s.verify("a/b.pdf", expires + 1, &sig, 1_000));
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let a = UrlSigner::new("http://x", "b", b"one").sign_until("p.pdf", 10);
        let b = UrlSigner::new("http://x", "b", b"two").sign_until("p.pdf", 10);
        assert_ne!(a, b);
    }

    #[test]
    fn ttl_sets_future_expiry() {
        let url = signer().sign("p.pdf", std::time::Duration::from_secs(86_400));
        let (expires, _) = split(&url);
        assert!(expires > Utc::now().timestamp() + 86_000);
    }
}
