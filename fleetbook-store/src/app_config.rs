use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Flat settlement tax rate, as a decimal string ("0.18")
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,
    #[serde(default = "default_return_otp_ttl")]
    pub return_otp_ttl_seconds: u64,
    #[serde(default = "default_otp_length")]
    pub otp_length: usize,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            return_otp_ttl_seconds: default_return_otp_ttl(),
            otp_length: default_otp_length(),
        }
    }
}

fn default_tax_rate() -> Decimal { Decimal::new(18, 2) }
fn default_return_otp_ttl() -> u64 { 600 }
fn default_otp_length() -> usize { 6 }
fn default_max_connections() -> u32 { 5 }
fn default_smtp_port() -> u16 { 587 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Sender mailbox, e.g. `Fleetbook <no-reply@fleetbook.app>`
    pub from: String,
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

fn default_starttls() -> bool { true }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // FLEETBOOK_DATABASE__URL=... overrides database.url
            .add_source(config::Environment::with_prefix("FLEETBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
