//! Outbound mail over async SMTP.
//!
//! When SMTP is disabled in config the mailer is a logging no-op, so local
//! development never needs a relay.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to send mail: {0}")]
    SendFailed(String),
}

pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    public_base_url: String,
}

impl Mailer {
    pub fn from_config(config: &SmtpConfig, public_base_url: &str) -> Result<Self, MailError> {
        let transport = if config.enabled {
            Some(Self::build_transport(config)?)
        } else {
            None
        };

        Ok(Self {
            transport,
            from: format!("\"{}\" <{}>", config.from_name, config.from_address),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_transport(
        config: &SmtpConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let mut builder = if config.use_tls {
            let tls_params = TlsParameters::new(config.host.clone())
                .map_err(|e| MailError::InvalidConfig(format!("TLS configuration error: {e}")))?;

            // Port 465 is implicit TLS, everything else negotiates STARTTLS.
            if config.port == 465 {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                    .map_err(|e| MailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                    .port(config.port)
                    .tls(Tls::Wrapper(tls_params))
            } else {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| MailError::InvalidConfig(format!("SMTP relay error: {e}")))?
                    .port(config.port)
                    .tls(Tls::Required(tls_params))
            }
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    pub async fn send_verification(
        &self,
        to: &str,
        account_id: i32,
        secret: &str,
    ) -> Result<(), MailError> {
        let link = format!(
            "{}/verify?account={account_id}&secret={secret}",
            self.public_base_url
        );
        let html = format!(
            "<p>Verify your email address to complete the sign up.</p>\
             <p>This link expires in 6 hours.</p>\
             <p>Press <a href=\"{link}\">here</a> to proceed.</p>"
        );
        let text = format!("Verify your email address: {link} (expires in 6 hours)");

        self.send(to, "Verify your email", text, html).await
    }

    pub async fn send_password_reset(
        &self,
        to: &str,
        account_id: i32,
        secret: &str,
    ) -> Result<(), MailError> {
        let link = format!(
            "{}/reset-password?account={account_id}&secret={secret}",
            self.public_base_url
        );
        let html = format!(
            "<p>Use the link below to reset your password.</p>\
             <p>This link expires in 1 hour.</p>\
             <p>Press <a href=\"{link}\">here</a> to proceed.</p>"
        );
        let text = format!("Reset your password: {link} (expires in 1 hour)");

        self.send(to, "Password reset", text, html).await
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        text: String,
        html: String,
    ) -> Result<(), MailError> {
        let Some(transport) = &self.transport else {
            debug!(to, subject, "SMTP disabled, skipping mail");
            return Ok(());
        };

        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| MailError::InvalidConfig(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| MailError::InvalidConfig(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )
            .map_err(|e| MailError::SendFailed(format!("Failed to build mail: {e}")))?;

        transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        info!(to, subject, "Mail sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mailer_skips_sending() {
        let config = SmtpConfig::default();
        let mailer = Mailer::from_config(&config, "http://localhost:6780").unwrap();
        assert!(mailer.transport.is_none());
    }

    // The pooled transport registers timers on the runtime at build time,
    // so this needs an async context even though nothing is sent.
    #[tokio::test]
    async fn builds_transport_without_tls() {
        let config = SmtpConfig {
            enabled: true,
            host: "localhost".to_string(),
            port: 25,
            use_tls: false,
            ..SmtpConfig::default()
        };
        assert!(Mailer::from_config(&config, "http://localhost:6780").is_ok());
    }
}
