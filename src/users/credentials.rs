use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SALT_BYTES: usize = 16;
const HASH_BYTES: usize = 32;
const ROUNDS: u32 = 10_000;

/// Fresh random salt, hex encoded. Called on every password-set event.
pub fn generate_salt() -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    hex::encode(salt)
}

pub fn hash(password: &str, salt: &str) -> String {
    let mut out = [0u8; HASH_BYTES];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), ROUNDS, &mut out);
    hex::encode(out)
}

pub fn verify(password: &str, salt: &str, hashed: &str) -> bool {
    hash(password, salt).as_bytes().ct_eq(hashed.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash("pw123", "salt"), hash("pw123", "salt"));
        assert_ne!(hash("pw123", "salt"), hash("pw123", "pepper"));
    }

    #[test]
    fn verify_accepts_only_the_exact_password() {
        let salt = generate_salt();
        let hashed = hash("pw123", &salt);
        assert!(verify("pw123", &salt, &hashed));
        for other in ["pw1234", "PW123", "", "pw12", " pw123"] {
            assert!(!verify(other, &salt, &hashed), "{other:?} must not verify");
        }
    }

    #[test]
    fn salts_do_not_repeat() {
        let salts: HashSet<String> = (0..500).map(|_| generate_salt()).collect();
        assert_eq!(salts.len(), 500);
    }

    #[test]
    fn same_password_hashes_differently_per_salt() {
        let a = hash("hunter2", &generate_salt());
        let b = hash("hunter2", &generate_salt());
        assert_ne!(a, b);
    }
}
