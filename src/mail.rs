//! SMTP alert delivery.
//!
//! Delivery settings travel inside the workload's opaque `config` JSON; the
//! engine never holds global mail credentials.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

const ALERT_SUBJECT: &str = "Drover price alert";

/// Per-workload SMTP settings, as the submitter serialized them.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub from: String,
    pub password: String,
    pub to: String,
    pub smtp_host: String,
    pub smtp_port: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("invalid SMTP port '{0}'")]
    Port(String),
}

/// Send one plain-text alert. STARTTLS relay on the configured host/port.
pub async fn send_alert(body: &str, config: &DeliveryConfig) -> Result<(), MailError> {
    let port: u16 = config
        .smtp_port
        .parse()
        .map_err(|_| MailError::Port(config.smtp_port.clone()))?;

    let email = Message::builder()
        .from(config.from.parse()?)
        .to(config.to.parse()?)
        .subject(ALERT_SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MailError::Build(e.to_string()))?;

    let credentials = Credentials::new(config.from.clone(), config.password.clone());
    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        .port(port)
        .credentials(credentials)
        .build();

    mailer.send(email).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_config_parses_the_workload_json() {
        let json = r#"{
            "from": "alerts@example.com",
            "password": "hunter2",
            "to": "me@example.com",
            "smtp_host": "smtp.example.com",
            "smtp_port": "587"
        }"#;
        let config: DeliveryConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.smtp_host, "smtp.example.com");
        assert_eq!(config.smtp_port, "587");
    }

    #[tokio::test]
    async fn unparsable_port_is_rejected_before_any_network_io() {
        let config = DeliveryConfig {
            from: "alerts@example.com".into(),
            password: "x".into(),
            to: "me@example.com".into(),
            smtp_host: "smtp.example.com".into(),
            smtp_port: "not-a-port".into(),
        };
        let err = send_alert("body", &config).await.unwrap_err();
        assert!(matches!(err, MailError::Port(_)));
    }
}
