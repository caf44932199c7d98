//! Alert message rendering.
//!
//! Produces the subject, an HTML body and a plain-text alternative for a
//! list of due records, and assembles them into an email for the mail
//! transports.

use std::fmt::Write as _;

use lettre::message::{Mailbox, MultiPart};
use lettre::Message as Email;

use super::DueNotice;
use crate::error::{Error, Result};
use crate::validity::DANGER_DAYS;

/// Colour of the days cell for records inside the danger window.
const DANGER_COLOR: &str = "#ED1C24";

/// Colour of the days cell otherwise.
const WARNING_COLOR: &str = "#ffc107";

const STYLE: &str = "\
body { font-family: Arial, sans-serif; color: #333; }
.header { background-color: #4B1F68; color: white; padding: 10px; text-align: center; }
.container { margin: 20px; }
table { width: 100%; border-collapse: collapse; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }";

/// A rendered alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    pub text: String,
}

impl Message {
    /// Render an alert for `due`.
    #[must_use]
    pub fn render(due: &[DueNotice]) -> Self {
        Self {
            subject: subject(due.len()),
            html: html_body(due),
            text: text_body(due),
        }
    }

    /// Build a `multipart/alternative` email carrying both bodies.
    ///
    /// Header encoding and line lengths are left to `lettre`, which picks a
    /// transfer encoding for each part.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Address`] when the sender or a recipient does not
    /// parse, or [`Error::Email`] when there are no recipients.
    pub fn to_email(&self, sender: &str, recipients: &[String]) -> Result<Email> {
        let mut builder = Email::builder()
            .from(parse_mailbox(sender)?)
            .subject(self.subject.as_str());
        for recipient in recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        Ok(builder.multipart(MultiPart::alternative_plain_html(
            self.text.clone(),
            self.html.clone(),
        ))?)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|source| Error::Address {
        address: address.to_string(),
        source,
    })
}

/// Subject line for an alert covering `count` records.
#[must_use]
pub fn subject(count: usize) -> String {
    format!("TRANSDUCER EXPIRY ALERT - {count} Items")
}

/// Colour for the days cell.
#[must_use]
pub fn days_color(days_remaining: i64) -> &'static str {
    if days_remaining <= DANGER_DAYS {
        DANGER_COLOR
    } else {
        WARNING_COLOR
    }
}

fn html_body(due: &[DueNotice]) -> String {
    let mut rows = String::new();
    for notice in due {
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td style='color: {}; font-weight: bold;'>{} days</td></tr>",
            notice.id,
            escape_html(&notice.description),
            escape_html(&notice.serial_number),
            escape_html(&notice.location),
            escape_html(&notice.formatted_expiry),
            days_color(notice.days_remaining),
            notice.days_remaining,
        );
    }

    format!(
        "<html>
<head><style>
{STYLE}
</style></head>
<body>
<div class=\"header\"><h2>Transducer Expiry Alert</h2></div>
<div class=\"container\">
<p>Hello,</p>
<p>The following transducers are close to their expiry date:</p>
<table>
<thead><tr><th>ID</th><th>Description</th><th>Serial No.</th><th>Location</th>\
<th>Expiry (DD/MM/YYYY)</th><th>Days to Expiry</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<p>Please take the necessary action.</p>
<p>This is an automatic message. Please do not reply.</p>
</div>
</body>
</html>
"
    )
}

fn text_body(due: &[DueNotice]) -> String {
    let mut out = String::from("The following transducers are close to their expiry date:\n\n");
    for notice in due {
        let _ = writeln!(
            out,
            "#{} {} (serial: {}, location: {}) expires {} - {} days",
            notice.id,
            notice.description,
            or_dash(&notice.serial_number),
            or_dash(&notice.location),
            notice.formatted_expiry,
            notice.days_remaining,
        );
    }
    out.push_str("\nPlease take the necessary action.\n");
    out.push_str("This is an automatic message. Please do not reply.\n");
    out
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() {
        "-"
    } else {
        s
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
