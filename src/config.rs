use std::path::{Path, PathBuf};
use std::ops::RangeInclusive;
use std::str::FromStr;

const TOKEN_TTL_DAYS_RANGE: RangeInclusive<i64> = 1..=3650;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    NotANumber { key: &'static str, value: String },
    #[error("{key} must be between {min} and {max}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("unsupported DATABASE_URL: {0}")]
    UnsupportedDatabaseUrl(String),
}

#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct KakaoConfig {
    pub api_key: Option<String>,
    pub sender_key: Option<String>,
}

/// Where the sqlite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

/// Process-wide settings. Built once in `main` and handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub debug: bool,
    pub timezone: String,
    pub secret_key: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_rounds: u32,
    pub upload_dir: PathBuf,
    pub max_file_size: u64,
    pub database_url: String,
    pub email: EmailConfig,
    pub sms: SmsConfig,
    pub kakao: KakaoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app_name: "학원 관리 시스템".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            debug: true,
            timezone: "Asia/Seoul".to_string(),
            secret_key: "your-secret-key-here".to_string(),
            jwt_secret: "your-jwt-secret-here".to_string(),
            token_ttl_days: 7,
            bcrypt_rounds: 12,
            upload_dir: PathBuf::from("uploads"),
            max_file_size: 5 * 1024 * 1024,
            database_url: "sqlite://database/academy.db".to_string(),
            email: EmailConfig {
                smtp_server: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                ..EmailConfig::default()
            },
            sms: SmsConfig::default(),
            kakao: KakaoConfig::default(),
        }
    }
}

impl Config {
    /// Reads the environment (after loading `.env`, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let text = |key: &str, fallback: &str| lookup(key).unwrap_or_else(|| fallback.to_string());

        let bcrypt_rounds: u32 = number(&lookup, "BCRYPT_ROUNDS", defaults.bcrypt_rounds)?;

        Ok(Config {
            app_name: text("APP_NAME", &defaults.app_name),
            app_version: text("APP_VERSION", &defaults.app_version),
            debug: lookup("DEBUG")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.debug),
            timezone: text("TIMEZONE", &defaults.timezone),
            secret_key: text("SECRET_KEY", &defaults.secret_key),
            jwt_secret: text("JWT_SECRET_KEY", &defaults.jwt_secret),
            token_ttl_days: within(
                "TOKEN_TTL_DAYS",
                number(&lookup, "TOKEN_TTL_DAYS", defaults.token_ttl_days)?,
                TOKEN_TTL_DAYS_RANGE,
            )?,
            bcrypt_rounds: bcrypt_rounds.clamp(4, 31),
            upload_dir: lookup("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_file_size: number(&lookup, "MAX_FILE_SIZE", defaults.max_file_size)?,
            database_url: text("DATABASE_URL", &defaults.database_url),
            email: EmailConfig {
                smtp_server: text("SMTP_SERVER", &defaults.email.smtp_server),
                smtp_port: number(&lookup, "SMTP_PORT", defaults.email.smtp_port)?,
                user: lookup("EMAIL_USER"),
                password: lookup("EMAIL_PASSWORD"),
            },
            sms: SmsConfig {
                account_sid: lookup("TWILIO_ACCOUNT_SID"),
                auth_token: lookup("TWILIO_AUTH_TOKEN"),
                phone_number: lookup("TWILIO_PHONE_NUMBER"),
            },
            kakao: KakaoConfig {
                api_key: lookup("KAKAO_API_KEY"),
                sender_key: lookup("KAKAO_SENDER_KEY"),
            },
        })
    }

    pub fn database_location(&self) -> Result<DatabaseLocation, ConfigError> {
        let url = self.database_url.trim();
        if url == ":memory:" || url == "sqlite::memory:" {
            return Ok(DatabaseLocation::Memory);
        }
        let path = if let Some(rest) = url.strip_prefix("sqlite:///") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite://") {
            rest
        } else if url.contains("://") {
            return Err(ConfigError::UnsupportedDatabaseUrl(url.to_string()));
        } else {
            url
        };
        if path.is_empty() {
            return Err(ConfigError::UnsupportedDatabaseUrl(url.to_string()));
        }
        Ok(DatabaseLocation::File(PathBuf::from(path)))
    }

    /// True while either signing secret is still the shipped placeholder.
    pub fn uses_default_secrets(&self) -> bool {
        let defaults = Config::default();
        self.secret_key == defaults.secret_key || self.jwt_secret == defaults.jwt_secret
    }

    /// Which notification providers carry credentials. Nothing sends yet.
    pub fn configured_providers(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.email.user.is_some() && self.email.password.is_some() && self.email.smtp_port > 0 {
            out.push("email");
        }
        if self.sms.account_sid.is_some()
            && self.sms.auth_token.is_some()
            && self.sms.phone_number.is_some()
        {
            out.push("sms");
        }
        if self.kakao.api_key.is_some() && self.kakao.sender_key.is_some() {
            out.push("kakao");
        }
        out
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.upload_dir.join("profiles")
    }

    /// Creates the upload folder layout: profiles, documents and temp.
    pub fn ensure_upload_directory(&self) -> std::io::Result<()> {
        for sub in ["profiles", "documents", "temp"] {
            std::fs::create_dir_all(self.upload_dir.join(sub))?;
        }
        Ok(())
    }

    pub fn check_file_size(&self, path: &Path) -> std::io::Result<Option<u64>> {
        let len = std::fs::metadata(path)?.len();
        if len > self.max_file_size {
            Ok(Some(len))
        } else {
            Ok(None)
        }
    }
}

fn within(
    key: &'static str,
    value: i64,
    range: RangeInclusive<i64>,
) -> Result<i64, ConfigError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            key,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

fn number<F, T>(lookup: &F, key: &'static str, fallback: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(fallback),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::NotANumber { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let cfg = config_with(&[]).expect("config");
        assert_eq!(cfg.bcrypt_rounds, 12);
        assert_eq!(cfg.token_ttl_days, 7);
        assert_eq!(cfg.max_file_size, 5_242_880);
        assert_eq!(
            cfg.database_location().expect("location"),
            DatabaseLocation::File(PathBuf::from("database/academy.db"))
        );
    }

    #[test]
    fn providers_need_complete_credentials() {
        let cfg = config_with(&[("KAKAO_API_KEY", "k")]).expect("config");
        assert!(cfg.configured_providers().is_empty());
        assert!(cfg.uses_default_secrets());
        let cfg = config_with(&[
            ("KAKAO_API_KEY", "k"),
            ("KAKAO_SENDER_KEY", "s"),
            ("SECRET_KEY", "a"),
            ("JWT_SECRET_KEY", "b"),
        ])
        .expect("config");
        assert_eq!(cfg.configured_providers(), vec!["kakao"]);
        assert!(!cfg.uses_default_secrets());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = config_with(&[("BCRYPT_ROUNDS", "twelve")]).unwrap_err();
        assert!(err.to_string().contains("BCRYPT_ROUNDS"));
    }

    #[test]
    fn token_lifetime_must_stay_in_range() {
        for raw in ["0", "-3", "3651", "9223372036854775807"] {
            let err = config_with(&[("TOKEN_TTL_DAYS", raw)]).unwrap_err();
            assert!(err.to_string().contains("TOKEN_TTL_DAYS"), "{raw}: {err}");
        }
        let cfg = config_with(&[("TOKEN_TTL_DAYS", "3650")]).expect("config");
        assert_eq!(cfg.token_ttl_days, 3650);
    }

    #[test]
    fn bcrypt_rounds_are_clamped() {
        let cfg = config_with(&[("BCRYPT_ROUNDS", "1")]).expect("config");
        assert_eq!(cfg.bcrypt_rounds, 4);
    }

    #[test]
    fn database_url_forms() {
        let cfg = config_with(&[("DATABASE_URL", "sqlite:///tmp/x.db")]).expect("config");
        assert_eq!(
            cfg.database_location().expect("location"),
            DatabaseLocation::File(PathBuf::from("tmp/x.db"))
        );
        let cfg = config_with(&[("DATABASE_URL", ":memory:")]).expect("config");
        assert_eq!(cfg.database_location().expect("location"), DatabaseLocation::Memory);
        let cfg = config_with(&[("DATABASE_URL", "postgres://db")]).expect("config");
        assert!(cfg.database_location().is_err());
    }
}
