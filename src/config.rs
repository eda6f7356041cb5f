use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use url::Url;

/// Deployment environment. The database reset utility is gated on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn allows_reset(self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonzoConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Base URL for resource/token endpoints. Overridable so tests can
    /// point the client at an in-process mock.
    pub api_base: Url,
    /// Base URL for the user-facing consent page.
    pub auth_base: Url,
}

impl Default for MonzoConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            api_base: Url::parse("https://api.monzo.com").expect("static URL"),
            auth_base: Url::parse("https://auth.monzo.com").expect("static URL"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub loglevel: String,
    pub environment: Environment,
    /// HS256 signing key for API JWTs.
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    /// Symmetric key for column encryption (emails, tokens, account names).
    pub encryption_key: String,
    pub monzo: MonzoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:tally.sqlite".to_string(),
            loglevel: "info".to_string(),
            environment: Environment::Development,
            secret_key: "change-me".to_string(),
            access_token_expire_minutes: 30,
            encryption_key: "change-me-too".to_string(),
            monzo: MonzoConfig::default(),
        }
    }
}

impl Config {
    /// Defaults merged with `TALLY_`-prefixed environment variables
    /// (`TALLY_MONZO__CLIENT_ID` reaches `monzo.client_id`).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("TALLY_").split("__"))
            .extract()
    }
}
