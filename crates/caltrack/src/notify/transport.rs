//! Notifier transports.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::Local;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport as _};
use tracing::{debug, warn};

use super::message::Message;
use super::{DueNotice, Notifier};
use crate::config::{Config, Transport};
use crate::error::{Error, Result};

/// How long to wait on the SMTP relay before giving up.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the notifier selected in the configuration.
#[must_use]
pub fn notifier_from_config(config: &Config) -> Box<dyn Notifier> {
    match config.notify.transport {
        Transport::Log => Box::new(LogNotifier),
        Transport::Sendmail => Box::new(SendmailNotifier::new(
            config.notify.sendmail_program.clone(),
            config.notify.sendmail_args.clone(),
            config.notify.sender.clone(),
        )),
        Transport::Outbox => Box::new(OutboxNotifier::new(
            config.outbox_dir(),
            config.notify.sender.clone(),
        )),
        Transport::Smtp => {
            let mut notifier = SmtpNotifier::new(
                config.notify.smtp_server.clone().unwrap_or_default(),
                config.notify.smtp_port,
                config.notify.sender.clone(),
            );
            if let (Some(user), Some(password)) =
                (&config.notify.smtp_user, &config.notify.smtp_password)
            {
                notifier = notifier.with_credentials(user.clone(), password.clone());
            }
            Box::new(notifier)
        }
    }
}

/// Writes each due record to the log instead of sending anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&self, recipients: &[String], due: &[DueNotice]) -> Result<String> {
        for notice in due {
            warn!(
                id = notice.id,
                serial_number = %notice.serial_number,
                location = %notice.location,
                expiry = %notice.formatted_expiry,
                days_remaining = notice.days_remaining,
                "Transducer {:?} close to expiry",
                notice.description
            );
        }
        Ok(format!(
            "Logged {} due transducers ({} recipients configured).",
            due.len(),
            recipients.len()
        ))
    }
}

/// Pipes a MIME message into a sendmail-compatible program.
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    program: String,
    args: Vec<String>,
    sender: String,
}

impl SendmailNotifier {
    /// Create a notifier that runs `program` with `args`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, sender: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            sender: sender.into(),
        }
    }
}

impl Notifier for SendmailNotifier {
    fn name(&self) -> &'static str {
        "sendmail"
    }

    fn notify(&self, recipients: &[String], due: &[DueNotice]) -> Result<String> {
        if recipients.is_empty() {
            return Err(Error::notify(self.name(), "no recipients configured"));
        }

        let raw = Message::render(due)
            .to_email(&self.sender, recipients)?
            .formatted();
        debug!("Running {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::notify(self.name(), format!("failed to start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::notify(self.name(), "stdin of child process unavailable"))?;
        // Feed stdin from its own thread while stderr is drained here.
        let feeder = std::thread::spawn(move || stdin.write_all(&raw));

        let output = child.wait_with_output()?;
        let written = feeder
            .join()
            .map_err(|_| Error::notify(self.name(), "stdin writer panicked"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::notify(
                self.name(),
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }
        written.map_err(|e| Error::notify(self.name(), format!("failed to write message: {e}")))?;

        Ok(format!(
            "Expiry notification sent via {} to {} recipients.",
            self.program,
            recipients.len()
        ))
    }
}

/// Drops the alert as a `.eml` file into a directory.
///
/// A desktop mail client or a relay watching the directory sends it on.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    dir: PathBuf,
    sender: String,
}

impl OutboxNotifier {
    /// Create a notifier writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, sender: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            sender: sender.into(),
        }
    }
}

impl Notifier for OutboxNotifier {
    fn name(&self) -> &'static str {
        "outbox"
    }

    fn notify(&self, recipients: &[String], due: &[DueNotice]) -> Result<String> {
        if recipients.is_empty() {
            return Err(Error::notify(self.name(), "no recipients configured"));
        }

        std::fs::create_dir_all(&self.dir).map_err(|source| Error::DirectoryCreate {
            path: self.dir.clone(),
            source,
        })?;

        let email = Message::render(due).to_email(&self.sender, recipients)?;
        let path = self.dir.join(format!(
            "expiry-alert-{}.eml",
            Local::now().format("%Y%m%dT%H%M%S%.f")
        ));
        std::fs::write(&path, email.formatted())?;

        Ok(format!(
            "Expiry notification for {} recipients written to {}.",
            recipients.len(),
            path.display()
        ))
    }
}

/// Submits the alert to an SMTP relay over implicit TLS.
#[derive(Clone)]
pub struct SmtpNotifier {
    server: String,
    port: u16,
    sender: String,
    credentials: Option<(String, String)>,
}

impl SmtpNotifier {
    /// Create a notifier for `server:port` without authentication.
    #[must_use]
    pub fn new(server: impl Into<String>, port: u16, sender: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port,
            sender: sender.into(),
            credentials: None,
        }
    }

    /// Log in with `user` and `password` before sending.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("user", &self.credentials.as_ref().map(|(user, _)| user))
            .finish_non_exhaustive()
    }
}

impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn notify(&self, recipients: &[String], due: &[DueNotice]) -> Result<String> {
        if recipients.is_empty() {
            return Err(Error::notify(self.name(), "no recipients configured"));
        }

        let email = Message::render(due).to_email(&self.sender, recipients)?;

        let mut builder = SmtpTransport::relay(&self.server)
            .map_err(|e| Error::notify(self.name(), format!("relay {}: {e}", self.server)))?
            .port(self.port)
            .timeout(Some(SMTP_TIMEOUT));
        if let Some((user, password)) = &self.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        debug!(server = %self.server, port = self.port, "Submitting alert over SMTP");
        builder
            .build()
            .send(&email)
            .map_err(|e| Error::notify(self.name(), format!("{}:{}: {e}", self.server, self.port)))?;

        Ok(format!(
            "Expiry notification sent via SMTP to {} recipients.",
            recipients.len()
        ))
    }
}
