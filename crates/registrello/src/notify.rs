//! Notification dispatcher: resolves recipients, compiles the update and
//! hands it to the mail transport (or returns a preview without sending).

use crate::error::ApiError;
use crate::mailer::MailTransport;
use crate::report;
use crate::store::SchoolStore;

/// Explicit recipient override from the request (`to` accepts a single
/// string or a list).
#[derive(Debug, Clone)]
pub enum ExplicitTo {
    One(String),
    Many(Vec<String>),
}

/// A fully resolved notification, ready to preview or send.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub preview_only: bool,
}

/// Explicit recipients (trimmed, non-empty) override the stored parent
/// emails. An explicit value that trims away to nothing does NOT fall back.
pub fn resolve_recipients(explicit: Option<&ExplicitTo>, parent_emails: &[String]) -> Vec<String> {
    match explicit {
        Some(ExplicitTo::One(addr)) => {
            let addr = addr.trim();
            if addr.is_empty() {
                Vec::new()
            } else {
                vec![addr.to_string()]
            }
        }
        Some(ExplicitTo::Many(addrs)) => addrs
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        None => parent_emails.to_vec(),
    }
}

/// Compile the update for one student and resolve who should receive it.
///
/// Fails with `NotFound` for an unknown roll number and with `Validation`
/// when nobody would receive the mail — unless this is a preview, which is
/// allowed to come back with an empty recipient list.
pub fn prepare(
    store: &SchoolStore,
    roll_no: &str,
    day: Option<&str>,
    date: Option<&str>,
    to: Option<&ExplicitTo>,
    preview_only: bool,
) -> Result<Prepared, ApiError> {
    let student = store.student(roll_no)?;
    let recipients = resolve_recipients(to, &student.parent_emails);

    if recipients.is_empty() && !preview_only {
        return Err(ApiError::Validation(
            "No parent email configured. Provide 'to' or set parent emails for the student."
                .to_string(),
        ));
    }

    let subject = format!("Update for {} (Roll {roll_no})", student.name);
    let body = report::compile_student_update(store, roll_no, day, date);

    Ok(Prepared {
        subject,
        body,
        recipients,
        preview_only,
    })
}

/// Hand a prepared notification to the transport. Blocking; the server runs
/// this on a blocking thread.
pub fn deliver(transport: &dyn MailTransport, prepared: &Prepared) -> Result<(), ApiError> {
    transport.send(&prepared.recipients, &prepared.subject, &prepared.body)
}
