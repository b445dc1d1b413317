// PBKDF2-SHA256 password hashes in the modular-crypt form stored in users.json:
// `$pbkdf2-sha256$<rounds>$<salt>$<checksum>`, both parts in adapted base64.
use crate::model::AuthError;
use crate::users::PasswordHasher;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use tracing::debug;

const SCHEME: &str = "pbkdf2-sha256";
const DEFAULT_ROUNDS: u32 = 29000;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

pub struct Pbkdf2Hasher {
    rounds: u32,
}

impl Default for Pbkdf2Hasher {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
        }
    }
}

fn derive_key(password: &str, salt: &[u8], rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut key);
    key
}

/// Base64 without padding, `.` in place of `+`.
fn encode_ab64(bytes: &[u8]) -> String {
    STANDARD_NO_PAD.encode(bytes).replace('+', ".")
}

fn decode_ab64(text: &str) -> Option<Vec<u8>> {
    STANDARD_NO_PAD.decode(text.replace('.', "+")).ok()
}

impl PasswordHasher for Pbkdf2Hasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.is_empty() {
            return Err(AuthError::Hashing("empty password".into()));
        }
        let salt: [u8; SALT_LEN] = rand::random();
        let key = derive_key(password, &salt, self.rounds);
        Ok(format!(
            "${}${}${}${}",
            SCHEME,
            self.rounds,
            encode_ab64(&salt),
            encode_ab64(&key)
        ))
    }

    fn verify(&self, password: &str, hashed: &str) -> bool {
        let parts: Vec<&str> = hashed.split('$').collect();
        let ["", scheme, rounds, salt, checksum] = parts.as_slice() else {
            debug!("Unrecognized password hash format");
            return false;
        };
        if *scheme != SCHEME {
            debug!("Unsupported password scheme {}", scheme);
            return false;
        }
        let (Ok(rounds), Some(salt), Some(expected)) =
            (rounds.parse::<u32>(), decode_ab64(salt), decode_ab64(checksum))
        else {
            return false;
        };
        derive_key(password, &salt, rounds).as_slice() == expected.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Pbkdf2Hasher {
        Pbkdf2Hasher { rounds: 1000 }
    }

    #[test]
    fn hash_then_verify() {
        let hasher = fast();
        let hashed = hasher.hash("s3cret").unwrap();
        assert!(hashed.starts_with("$pbkdf2-sha256$1000$"));
        assert!(hasher.verify("s3cret", &hashed));
        assert!(!hasher.verify("S3cret", &hashed));
        assert_ne!(hashed, hasher.hash("s3cret").unwrap());
    }

    #[test]
    fn other_schemes_and_garbage_fail() {
        let hasher = fast();
        assert!(!hasher.verify("pw", "$2b$12$abcdefghijklmnopqrstuv"));
        assert!(!hasher.verify("pw", "plain"));
        assert!(!hasher.verify("pw", "$pbkdf2-sha256$x$AAAA$AAAA"));
        assert!(matches!(hasher.hash(""), Err(AuthError::Hashing(_))));
    }

    #[test]
    fn ab64_swaps_plus_for_dot() {
        let bytes = [0xfb, 0xef, 0xff];
        let text = encode_ab64(&bytes);
        assert!(!text.contains('+'));
        assert_eq!(decode_ab64(&text).unwrap(), bytes);
    }
}
