use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE verifier and its S256 challenge (RFC 7636)
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a PKCE verifier and S256 challenge
///
/// 32 random bytes base64url-encode to a 43-character verifier, inside the
/// RFC's 43..128 bound.
pub fn generate_pkce() -> PkcePair {
    let verifier = random_urlsafe(32);

    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    PkcePair {
        verifier,
        challenge,
    }
}

/// Generate the CSRF `state` nonce for an authorization request
pub fn generate_state() -> String {
    random_urlsafe(32)
}

fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_s256_of_verifier() {
        let pair = generate_pkce();

        let mut hasher = Sha256::new();
        hasher.update(pair.verifier.as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(hasher.finalize());

        assert_eq!(pair.challenge, expected);
    }

    #[test]
    fn verifier_length_is_in_rfc_bounds() {
        let pair = generate_pkce();
        assert!((43..=128).contains(&pair.verifier.len()));
    }

    #[test]
    fn state_values_are_unique() {
        assert_ne!(generate_state(), generate_state());
    }
}
