use chrono::NaiveDateTime;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::error::IqueryError;

pub trait MailTransport {
    fn send(&self, message: &Message) -> Result<(), IqueryError>;
}

/// Plain SMTP relay, no TLS or auth, like a local MTA on port 25.
pub struct SmtpRelay {
    server: String,
}

impl SmtpRelay {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }
}

impl MailTransport for SmtpRelay {
    fn send(&self, message: &Message) -> Result<(), IqueryError> {
        let transport = SmtpTransport::builder_dangerous(self.server.as_str()).build();
        transport
            .send(message)
            .map_err(|err| IqueryError::Mail(err.to_string()))?;
        info!(server = %self.server, "report mailed");
        Ok(())
    }
}

/// Splits a comma separated list; whitespace anywhere is ignored.
pub fn parse_recipients(list: &str) -> Result<Vec<Mailbox>, IqueryError> {
    let compact = list
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>();
    let recipients = compact
        .split(',')
        .filter(|address| !address.is_empty())
        .map(|address| {
            address
                .parse::<Mailbox>()
                .map_err(|_| IqueryError::InvalidAddress(address.to_string()))
        })
        .collect::<Result<Vec<_>, IqueryError>>()?;
    if recipients.is_empty() {
        return Err(IqueryError::InvalidAddress(list.to_string()));
    }
    Ok(recipients)
}

pub fn report_subject(label: &str, now: NaiveDateTime) -> String {
    format!("{label} report {}", now.format("%Y-%m-%d %H:%M:%S"))
}

pub fn build_report_message(
    from: &str,
    recipients: Vec<Mailbox>,
    subject: String,
    body: String,
) -> Result<Message, IqueryError> {
    let from = from
        .parse::<Mailbox>()
        .map_err(|_| IqueryError::InvalidAddress(from.to_string()))?;
    let mut builder = Message::builder()
        .from(from)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN);
    for recipient in recipients {
        builder = builder.to(recipient);
    }
    builder
        .body(body)
        .map_err(|err| IqueryError::Mail(err.to_string()))
}
