//! Outgoing mail.
//!
//! Uses SMTP when a relay is configured and otherwise drops `.eml` files into
//! a local directory.

use std::path::Path;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::Config;

#[derive(Debug)]
pub struct MailError(String);

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mail error: {}", self.0)
    }
}

impl std::error::Error for MailError {}

enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

pub struct Mailer {
    transport: Transport,
    sender: Mailbox,
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self, MailError> {
        let transport = match &config.smtp {
            Some(smtp) => {
                let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
                    .map_err(|e| MailError(format!("create SMTP transport: {e}")))?
                    .port(smtp.port);
                let builder = if smtp.username.is_empty() {
                    builder
                } else {
                    builder.credentials(Credentials::new(
                        smtp.username.clone(),
                        smtp.password.clone(),
                    ))
                };
                Transport::Smtp(builder.build())
            }
            None => Self::file_transport(&config.mail_dir)?,
        };

        let sender = config
            .sender
            .parse::<Mailbox>()
            .map_err(|e| MailError(format!("parse sender: {e}")))?;

        Ok(Self { transport, sender })
    }

    fn file_transport(dir: &Path) -> Result<Transport, MailError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| MailError(format!("create mail directory: {e}")))?;
        Ok(Transport::File(AsyncFileTransport::<Tokio1Executor>::new(dir)))
    }

    /// Welcome a new user and hand them their activation token.
    pub async fn send_welcome(
        &self,
        to: &str,
        user_id: i64,
        activation_token: &str,
    ) -> Result<(), MailError> {
        let body = render_welcome(user_id, activation_token);
        self.send(to, "Welcome to the Quotes API!", body).await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| MailError(format!("parse recipient: {e}")))?;

        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| MailError(format!("build message: {e}")))?;

        match &self.transport {
            Transport::Smtp(smtp) => {
                smtp.send(message)
                    .await
                    .map_err(|e| MailError(format!("send SMTP mail: {e}")))?;
            }
            Transport::File(file) => {
                file.send(message)
                    .await
                    .map_err(|e| MailError(format!("write mail file: {e}")))?;
            }
        }

        Ok(())
    }
}

fn render_welcome(user_id: i64, activation_token: &str) -> String {
    format!(
        "Hi,\n\
         \n\
         Thanks for signing up for a Quotes API account.\n\
         For future reference, your user ID number is {user_id}.\n\
         \n\
         Please send a request to the PUT /v1/users/activated endpoint\n\
         with the following JSON body to activate your account:\n\
         \n\
         {{\"token\": \"{activation_token}\"}}\n\
         \n\
         Please note that this is a one-time use token and it will expire\n\
         in 3 days.\n\
         \n\
         Thanks,\n\
         The Quotes API Team\n"
    )
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn file_config(dir: &Path) -> Config {
        Config {
            db_path: dir.join("unused.sqlite"),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            env: "test".to_string(),
            limiter: crate::limiter::LimiterConfig {
                enabled: false,
                rps: 2.0,
                burst: 4,
            },
            smtp: None,
            sender: "Quotes API <no-reply@quotes.local>".to_string(),
            mail_dir: dir.join("mail"),
        }
    }

    #[test]
    fn test_welcome_body() {
        let body = render_welcome(42, "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU");
        assert!(body.contains("user ID number is 42"));
        assert!(body.contains(r#"{"token": "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"}"#));
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let dir = TempDir::new().unwrap();
        let config = file_config(dir.path());
        let mailer = Mailer::new(&config).unwrap();

        mailer
            .send_welcome("alice@example.com", 7, "Y3QMGX3PJ3WLRL2YRTQGQ6KRHU")
            .await
            .unwrap();

        let files: Vec<_> = std::fs::read_dir(&config.mail_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);

        let contents = std::fs::read_to_string(&files[0]).unwrap();
        assert!(contents.contains("alice@example.com"));
        assert!(contents.contains("Y3QMGX3PJ3WLRL2YRTQGQ6KRHU"));
    }

    #[tokio::test]
    async fn test_bad_recipient_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mailer = Mailer::new(&file_config(dir.path())).unwrap();
        assert!(mailer.send_welcome("not an address", 1, "x").await.is_err());
    }
}
