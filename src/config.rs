use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_origin: String,
    /// Secure + SameSite=None cookies; on for the prod environment.
    pub secure_cookies: bool,
    pub jwt: JwtConfig,
    pub inference: InferenceConfig,
    pub smtp: SmtpConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let frontend_origin =
            std::env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".into());
        let secure_cookies = std::env::var("ENVIRONMENT")
            .map(|v| v == "prod")
            .unwrap_or(false);
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            ttl_hours: std::env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
        };
        let inference = InferenceConfig {
            base_url: std::env::var("IMAGE_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".into()),
            timeout_secs: std::env::var("IMAGE_SERVICE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(120),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".into()),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("MAIL_USER").unwrap_or_default(),
            password: std::env::var("MAIL_PASS").unwrap_or_default(),
            from: std::env::var("MAIL_FROM")
                .or_else(|_| std::env::var("MAIL_USER"))
                .unwrap_or_else(|_| "no-reply@medtriage.local".into()),
        };
        Ok(Self {
            database_url,
            frontend_origin,
            secure_cookies,
            jwt,
            inference,
            smtp,
        })
    }
}
