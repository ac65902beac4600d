//! Outbound email.
//!
//! Delivery sits behind the [`Mailer`] trait. The server ships with
//! [`LogMailer`], which records that a message would have been sent without
//! writing its body (the body carries plaintext activation tokens).

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Delivery attempts made by [`send_with_retry`] before giving up.
pub const SEND_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// A rendered message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub template: &'static str,
    pub subject: String,
    pub plain_body: String,
}

#[derive(Debug, Clone)]
pub enum Template {
    UserWelcome {
        user_id: i64,
        name: String,
        activation_token: String,
    },
}

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::UserWelcome { .. } => "user_welcome",
        }
    }

    pub fn render(&self, from: &str, to: &str) -> Email {
        match self {
            Template::UserWelcome {
                user_id,
                name,
                activation_token,
            } => Email {
                from: from.to_string(),
                to: to.to_string(),
                template: self.name(),
                subject: "Welcome to Reel!".to_string(),
                plain_body: format!(
                    "Hi {name},\n\n\
                     Thanks for signing up for a Reel account. Your user ID number is {user_id}.\n\n\
                     To activate your account, send a request to `PUT /v1/users/activated` with \
                     the following JSON body:\n\n\
                     {{\"token\": \"{activation_token}\"}}\n\n\
                     This is a one-time use token and it will expire in 3 days.\n\n\
                     Thanks,\n\nThe Reel Team\n"
                ),
            },
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailerError>;
}

/// Logs deliveries instead of talking to an SMTP relay.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailerError> {
        info!(to = %email.to, template = email.template, "email handed to log mailer");
        Ok(())
    }
}

/// Try `mailer` up to [`SEND_ATTEMPTS`] times, pausing between attempts.
pub async fn send_with_retry(mailer: &dyn Mailer, email: &Email) -> Result<(), MailerError> {
    let mut attempt = 1;
    loop {
        match mailer.send(email).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < SEND_ATTEMPTS => {
                warn!(to = %email.to, attempt, "email delivery failed, retrying: {}", e);
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Mailer for Flaky {
        async fn send(&self, _email: &Email) -> Result<(), MailerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(MailerError::Delivery("connection refused".to_string()));
            }
            Ok(())
        }
    }

    fn welcome() -> Email {
        Template::UserWelcome {
            user_id: 7,
            name: "Alice".to_string(),
            activation_token: "abcdefghijklmnopqrstuv".to_string(),
        }
        .render("Reel <no-reply@reel.localhost>", "alice@example.com")
    }

    #[test]
    fn welcome_email_carries_the_activation_token() {
        let email = welcome();
        assert_eq!(email.template, "user_welcome");
        assert_eq!(email.to, "alice@example.com");
        assert!(email.plain_body.contains("abcdefghijklmnopqrstuv"));
        assert!(email.plain_body.contains("user ID number is 7"));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let mailer = Flaky {
            failures_left: AtomicU32::new(2),
            calls: AtomicU32::new(0),
        };
        send_with_retry(&mailer, &welcome()).await.unwrap();
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_last_attempt() {
        let mailer = Flaky {
            failures_left: AtomicU32::new(10),
            calls: AtomicU32::new(0),
        };
        assert!(send_with_retry(&mailer, &welcome()).await.is_err());
        assert_eq!(mailer.calls.load(Ordering::SeqCst), SEND_ATTEMPTS);
    }
}
