use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context as _;
use chrono_tz::Tz;
use lettre::message::Mailbox;

impl Config {
    /// Load a `.toml` file from disk and parse it as a [`Config`].
    pub async fn load(file: &str) -> anyhow::Result<Config> {
        async fn load_inner(file: &str) -> anyhow::Result<Config> {
            let contents = tokio::fs::read_to_string(file).await?;
            Ok(toml::from_str(&contents)?)
        }
        load_inner(file).await.with_context(|| format!("loading config={file}"))
    }
}

/// Bag of app configuration values, parsed from a TOML file with serde.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub db: DbConfig,
    pub net: NetConfig,
    /// Without SMTP, login links are written to the log instead of being emailed.
    pub email: Option<EmailConfig>,
}

/// Webapp configuration.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct AppConfig {
    /// Name shown in page titles, e.g. `Nexora`.
    #[serde(default = "default_name")]
    pub name: String,
    /// Public facing domain, e.g. `nexora.agency`.
    pub domain: String,
    /// Public facing URL, e.g. `https://nexora.agency`.
    pub url: String,
    /// Local timezone.
    pub tz: Tz,
    /// How long a login session lasts.
    #[serde(default = "default_session_expiry_days")]
    pub session_expiry_days: i64,
}

fn default_name() -> String {
    "Nexora".into()
}

fn default_session_expiry_days() -> i64 {
    30
}

/// Database configuration.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct DbConfig {
    /// Path to sqlite3 database file.
    pub file: PathBuf,
    /// Optional TOML file of users to create on startup.
    pub seed_data: Option<PathBuf>,
}

/// Networking configuration.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct NetConfig {
    /// HTTP server bind address.
    pub addr: SocketAddr,
}

/// Email configuration.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct EmailConfig {
    /// SMTP address, starting with `smtp://` or `smtps://`.
    pub smtp_addr: String,
    /// SMTP username.
    pub smtp_username: Option<String>,
    /// SMTP password.
    pub smtp_password: Option<String>,
    /// Mailbox to send email from.
    pub from: Mailbox,
    /// Where new contact form submissions get forwarded. Defaults to `from`.
    pub contact_to: Option<Mailbox>,
}

#[cfg(test)]
impl Config {
    /// A config good enough to build the app around an in-memory database.
    pub fn test() -> Config {
        toml::from_str(
            r#"
            [app]
            domain = "localhost"
            url = "http://localhost:8080"
            tz = "Europe/London"

            [db]
            file = ":memory:"

            [net]
            addr = "127.0.0.1:8080"
            "#,
        )
        .expect("valid test config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let config = Config::test();
        assert_eq!(config.app.name, "Nexora");
        assert_eq!(config.app.session_expiry_days, 30);
        assert_eq!(config.app.tz, chrono_tz::Europe::London);
        assert!(config.email.is_none());
        assert!(config.db.seed_data.is_none());
    }

    #[test]
    fn email_section_parses_mailboxes() {
        let config: Config = toml::from_str(
            r#"
            [app]
            name = "Nexora Studio"
            domain = "nexora.agency"
            url = "https://nexora.agency"
            tz = "America/New_York"

            [db]
            file = "nexora.db"

            [net]
            addr = "0.0.0.0:8080"

            [email]
            smtp_addr = "smtps://smtp.example.com"
            from = "Nexora <hello@nexora.agency>"
            contact_to = "sales@nexora.agency"
            "#,
        )
        .unwrap();

        let email = config.email.unwrap();
        assert_eq!(email.from.email.to_string(), "hello@nexora.agency");
        assert_eq!(email.contact_to.unwrap().email.to_string(), "sales@nexora.agency");
        assert!(email.smtp_username.is_none());
    }
}
