use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    pub server: String,
    pub port: u32,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env_str("SERVER_HOST", "0.0.0.0"),
            port: env_str("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a port number")?,
        };

        let database = DatabaseConfig {
            username: env_str("TABLES_USERNAME", "crmuser"),
            password: env_str("TABLES_PASSWORD", ""),
            server: env_str("TABLES_SERVER", "localhost"),
            port: env_str("TABLES_PORT", "5432")
                .parse()
                .context("TABLES_PORT must be a port number")?,
            database: env_str("TABLES_DATABASE", "crmserver"),
        };

        let mail = MailConfig {
            smtp_host: env_str("MAIL_SMTP_HOST", "localhost"),
            smtp_port: env_str("MAIL_SMTP_PORT", "587")
                .parse()
                .context("MAIL_SMTP_PORT must be a port number")?,
            smtp_username: env_str("MAIL_SMTP_USERNAME", ""),
            smtp_password: env_str("MAIL_SMTP_PASSWORD", ""),
            from_address: env_str("MAIL_FROM", "crm@localhost"),
        };

        Ok(Self {
            server,
            database,
            mail,
        })
    }

    pub fn database_url(&self) -> String {
        // DATABASE_URL wins when set so the diesel CLI and the server agree.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password,
            self.database.server,
            self.database.port,
            self.database.database
        )
    }
}
