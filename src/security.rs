use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// False on mismatch and on an unreadable stored hash alike.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(password, hashed).unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: i64,
}

pub fn issue_token(
    user_id: i64,
    username: &str,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + Duration::days(config.token_ttl_days)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// `None` for anything that is not a valid, unexpired token signed with our secret.
pub fn verify_token(token: &str, config: &Config) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .ok()
}

/// `AC` + YYMMDD + four uppercase hex digits.
pub fn generate_academy_id(today: NaiveDate) -> String {
    let suffix = random_hex(4).to_uppercase();
    format!("AC{}{}", today.format("%y%m%d"), suffix)
}

pub fn is_academy_id(s: &str) -> bool {
    let Some(rest) = s.strip_prefix("AC") else {
        return false;
    };
    let bytes = rest.as_bytes();
    bytes.len() == 10
        && bytes[..6].iter().all(|b| b.is_ascii_digit())
        && bytes[6..]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(b))
}

/// Random 32-hex-digit stem, keeping the original extension.
pub fn generate_secure_filename(original: &str) -> String {
    let stem = random_hex(32);
    let ext = std::path::Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{stem}.{}", ext.to_ascii_lowercase()),
        None => stem,
    }
}

fn random_hex(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        out.push_str(&Uuid::new_v4().simple().to_string());
    }
    out.truncate(len);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            jwt_secret: "test-secret".into(),
            ..Config::default()
        }
    }

    #[test]
    fn password_round_trip_and_mismatch() {
        let hash = hash_password("admin123", 4).expect("hash");
        assert!(verify_password("admin123", &hash));
        assert!(!verify_password("admin124", &hash));
        assert!(!verify_password("admin123", "not-a-bcrypt-hash"));
    }

    #[test]
    fn token_verifies_with_same_secret_only() {
        let cfg = config();
        let token = issue_token(7, "kim", &cfg).expect("token");
        let claims = verify_token(&token, &cfg).expect("claims");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "kim");

        let other = Config {
            jwt_secret: "other".into(),
            ..Config::default()
        };
        assert!(verify_token(&token, &other).is_none());
        assert!(verify_token("garbage", &cfg).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let cfg = Config {
            token_ttl_days: -2,
            ..config()
        };
        let token = issue_token(1, "old", &cfg).expect("token");
        assert!(verify_token(&token, &cfg).is_none());
    }

    #[test]
    fn academy_ids_have_the_fixed_shape() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).expect("date");
        for _ in 0..50 {
            let id = generate_academy_id(day);
            assert!(id.starts_with("AC240309"), "{id}");
            assert!(is_academy_id(&id), "{id}");
        }
        assert!(!is_academy_id("AC240309abcd"));
        assert!(!is_academy_id("XX2403091234"));
        assert!(!is_academy_id("ACA가가AAA"));
        assert!(!is_academy_id("AC240309가"));
    }

    #[test]
    fn secure_filename_keeps_extension() {
        let name = generate_secure_filename("photo.JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 32 + 4);
        assert_eq!(generate_secure_filename("README").len(), 32);
    }
}
