//! Best-effort delivery of certificates by e-mail.

use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{info, warn};

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::NotifyError;
use crate::pdf::RenderedDocument;
use crate::roster::Row;

/// A message with exactly one attachment.
#[derive(Debug, Clone, Copy)]
pub struct OutgoingMail<'a> {
    pub to: &'a str,
    pub subject: &'a str,
    pub html_body: &'a str,
    pub attachment_name: &'a str,
    pub attachment: &'a [u8],
}

/// Capability to send mail. Injected; absent when no transport is configured.
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: OutgoingMail<'_>) -> Result<(), NotifyError>;
}

pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| NotifyError::Address(config.from.clone()))?;

        let builder = match config.security {
            SmtpSecurity::Tls => SmtpTransport::relay(&config.host),
            SmtpSecurity::StartTls => SmtpTransport::starttls_relay(&config.host),
            SmtpSecurity::None => Ok(SmtpTransport::builder_dangerous(&config.host)),
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let mut builder = builder.port(config.port);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, mail: OutgoingMail<'_>) -> Result<(), NotifyError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|_| NotifyError::Address(mail.to.to_string()))?;
        let mime = mime_guess::from_path(mail.attachment_name).first_or_octet_stream();
        let content_type =
            ContentType::parse(mime.as_ref()).map_err(|e| NotifyError::Message(e.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(mail.html_body.to_string()))
                    .singlepart(
                        Attachment::new(mail.attachment_name.to_string())
                            .body(mail.attachment.to_vec(), content_type),
                    ),
            )
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport
            .send(&message)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Mails each certificate to its row's `email`, never failing the caller.
pub struct Notifier {
    transport: Option<Arc<dyn MailTransport>>,
    subject: String,
    body: String,
}

impl Notifier {
    pub fn new(
        transport: Option<Arc<dyn MailTransport>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Returns whether a message was handed to the transport successfully.
    /// The attachment is read from `document.path` only once a transport and
    /// an address are known. Any failure is logged and yields `false`.
    pub fn notify(&self, row: &Row, document: &RenderedDocument) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };
        let Some(to) = row.non_blank("email") else {
            return false;
        };

        let attachment = match std::fs::read(&document.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not read {} for {}: {}", document.path.display(), to, e);
                return false;
            }
        };

        let mail = OutgoingMail {
            to,
            subject: &self.subject,
            html_body: &self.body,
            attachment_name: &document.file_name,
            attachment: &attachment,
        };
        match transport.send(mail) {
            Ok(()) => {
                info!("Mailed {} to {}", document.file_name, to);
                true
            }
            Err(e) => {
                warn!("Could not mail {} to {}: {}", document.file_name, to, e);
                false
            }
        }
    }
}

#[cfg(test)]
impl Notifier {
    pub(crate) fn disabled() -> Self {
        Self::new(None, "", "")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every message; fails for addresses listed in `reject`.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<(String, String, String)>>,
        pub attachments: Mutex<Vec<Vec<u8>>>,
        pub reject: Vec<String>,
    }

    impl MailTransport for RecordingTransport {
        fn send(&self, mail: OutgoingMail<'_>) -> Result<(), NotifyError> {
            if self.reject.iter().any(|r| r == mail.to) {
                return Err(NotifyError::Transport("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push((
                mail.to.to_string(),
                mail.subject.to_string(),
                mail.attachment_name.to_string(),
            ));
            self.attachments.lock().unwrap().push(mail.attachment.to_vec());
            Ok(())
        }
    }

    /// A certificate on disk; the directory lives as long as the returned guard.
    fn document() -> (TempDir, RenderedDocument) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Ada-1.pdf");
        std::fs::write(&path, b"%PDF-1.3 Ada").unwrap();
        let document = RenderedDocument {
            file_name: "Ada-1.pdf".to_string(),
            path,
            registration_id: "1".to_string(),
        };
        (dir, document)
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().copied().collect()
    }

    #[test]
    fn sends_to_row_address() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(
            Some(transport.clone()),
            "Your Certificate",
            "Please find attached",
        );

        let (_dir, document) = document();
        assert!(notifier.notify(&row(&[("email", "ada@example.com")]), &document));
        assert_eq!(
            transport.sent.lock().unwrap().as_slice(),
            &[(
                "ada@example.com".to_string(),
                "Your Certificate".to_string(),
                "Ada-1.pdf".to_string()
            )]
        );
        assert_eq!(
            transport.attachments.lock().unwrap().as_slice(),
            &[b"%PDF-1.3 Ada".to_vec()]
        );
    }

    #[test]
    fn missing_certificate_file_is_not_sent() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(Some(transport.clone()), "s", "b");

        let (dir, document) = document();
        drop(dir);
        assert!(!notifier.notify(&row(&[("email", "ada@example.com")]), &document));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn no_transport_is_a_silent_no_op() {
        let notifier = Notifier::disabled();
        assert!(!notifier.is_enabled());
        let (_dir, document) = document();
        assert!(!notifier.notify(&row(&[("email", "ada@example.com")]), &document));
    }

    #[test]
    fn blank_or_missing_address_is_skipped() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(Some(transport.clone()), "s", "b");

        let (_dir, document) = document();
        assert!(!notifier.notify(&row(&[("email", "")]), &document));
        assert!(!notifier.notify(&row(&[("name", "Ada")]), &document));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn transport_failure_is_swallowed() {
        let transport = Arc::new(RecordingTransport {
            reject: vec!["bad@example.com".to_string()],
            ..Default::default()
        });
        let notifier = Notifier::new(Some(transport.clone()), "s", "b");

        let (_dir, document) = document();
        assert!(!notifier.notify(&row(&[("email", "bad@example.com")]), &document));
        assert!(notifier.notify(&row(&[("email", "good@example.com")]), &document));
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn smtp_mailer_rejects_invalid_sender() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            security: SmtpSecurity::None,
            from: "not an address".to_string(),
        };
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(NotifyError::Address(_))
        ));
    }

    #[test]
    fn smtp_mailer_rejects_invalid_recipient_before_connecting() {
        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: None,
            password: None,
            security: SmtpSecurity::None,
            from: "certs@example.com".to_string(),
        };
        let mailer = SmtpMailer::from_config(&config).unwrap();
        let err = mailer
            .send(OutgoingMail {
                to: "nobody",
                subject: "s",
                html_body: "b",
                attachment_name: "a.pdf",
                attachment: b"%PDF",
            })
            .unwrap_err();
        assert!(matches!(err, NotifyError::Address(_)));
    }
}
