use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Implicit TLS (usually port 465).
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587).
    StartTls,
    /// Unencrypted; only for local relays and mail catchers.
    None,
}

impl SmtpSecurity {
    fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "none" => Ok(Self::None),
            other => Err(format!("SMTP_SECURITY must be tls, starttls or none (got {other:?})")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub verify_base_url: String,
    pub font_path: Option<PathBuf>,
    pub template_path: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub smtp: Option<SmtpConfig>,
    pub mail_subject: String,
    pub mail_body: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = var("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let verify_base_url = var("VERIFY_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}/api/verify", port));

        let max_upload_mb: usize = var("MAX_UPLOAD_MB")
            .and_then(|v| v.parse().ok())
            .unwrap_or(25);

        let smtp = match var("SMTP_HOST") {
            Some(host) => {
                let from = var("MAIL_FROM").ok_or("MAIL_FROM must be set when SMTP_HOST is")?;
                Some(SmtpConfig {
                    host,
                    port: var("SMTP_PORT")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(587),
                    username: var("SMTP_USERNAME"),
                    password: var("SMTP_PASSWORD"),
                    security: var("SMTP_SECURITY")
                        .map(|v| SmtpSecurity::parse(&v))
                        .transpose()?
                        .unwrap_or(SmtpSecurity::StartTls),
                    from,
                })
            }
            None => None,
        };

        Ok(Self {
            host,
            port,
            verify_base_url,
            font_path: var("FONT_PATH").map(PathBuf::from),
            template_path: var("TEMPLATE_PATH").map(PathBuf::from),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            smtp,
            mail_subject: var("MAIL_SUBJECT").unwrap_or_else(|| "Your Certificate".to_string()),
            mail_body: var("MAIL_BODY").unwrap_or_else(|| "Please find attached".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, Box<dyn std::error::Error + Send + Sync>> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.verify_base_url, "http://localhost:8080/api/verify");
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert!(config.smtp.is_none());
        assert!(config.font_path.is_none());
        assert_eq!(config.mail_subject, "Your Certificate");
    }

    #[test]
    fn verify_url_follows_port_unless_set() {
        assert_eq!(
            config(&[("PORT", "9000")]).unwrap().verify_base_url,
            "http://localhost:9000/api/verify"
        );
        assert_eq!(
            config(&[("VERIFY_BASE_URL", "https://certs.example.org/verify")])
                .unwrap()
                .verify_base_url,
            "https://certs.example.org/verify"
        );
    }

    #[test]
    fn smtp_block_requires_sender() {
        assert!(config(&[("SMTP_HOST", "mail.example.org")]).is_err());

        let config = config(&[
            ("SMTP_HOST", "mail.example.org"),
            ("MAIL_FROM", "certs@example.org"),
            ("SMTP_SECURITY", "TLS"),
            ("SMTP_PORT", "465"),
        ])
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.security, SmtpSecurity::Tls);
        assert_eq!(smtp.username, None);
    }

    #[test]
    fn blank_smtp_host_disables_mail() {
        assert!(config(&[("SMTP_HOST", "  ")]).unwrap().smtp.is_none());
    }

    #[test]
    fn unknown_smtp_security_is_rejected() {
        assert!(config(&[
            ("SMTP_HOST", "mail.example.org"),
            ("MAIL_FROM", "certs@example.org"),
            ("SMTP_SECURITY", "ssl3"),
        ])
        .is_err());
    }
}
