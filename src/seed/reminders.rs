//! Daily follow-up reminder mail. Each salesperson with pending follow-ups
//! due today or earlier gets at most one message per day; the sent marker
//! lives in the audit log.

use anyhow::{anyhow, Context, Result};
use chrono::{TimeZone, Utc};
use diesel::prelude::*;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::collections::HashMap;
use uuid::Uuid;

use crate::audit::AuditRow;
use crate::config::MailConfig;
use crate::leads::{FollowUpRow, LeadRow};
use crate::shared::enums::FollowUpStatus;
use crate::shared::schema::{audit_log, follow_ups, leads, users};

const REMINDER_ACTION: &str = "reminder.sent";

fn already_notified_today(conn: &mut PgConnection, salesperson_id: Uuid) -> Result<bool> {
    let midnight = Utc
        .from_utc_datetime(
            &Utc::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| anyhow!("invalid midnight"))?,
        );

    let count: i64 = audit_log::table
        .filter(audit_log::action.eq(REMINDER_ACTION))
        .filter(audit_log::detail.eq(format!("user_id={salesperson_id}")))
        .filter(audit_log::created_at.ge(midnight))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

fn mark_notified(conn: &mut PgConnection, salesperson_id: Uuid) -> Result<()> {
    let row = AuditRow {
        id: Uuid::new_v4(),
        user_id: Some(salesperson_id),
        action: REMINDER_ACTION.to_string(),
        detail: format!("user_id={salesperson_id}"),
        ip: "cli".to_string(),
        user_agent: "crmserver".to_string(),
        created_at: Utc::now(),
    };
    diesel::insert_into(audit_log::table).values(&row).execute(conn)?;
    Ok(())
}

fn reminder_body(full_name: &str, due: &[(FollowUpRow, LeadRow)]) -> String {
    let mut body = format!(
        "Hello {full_name},\n\nYou have {} follow-up(s) waiting:\n\n",
        due.len()
    );
    for (follow_up, lead) in due {
        body.push_str(&format!(
            "- {} | {} | {}\n",
            follow_up.due_on, lead.name, follow_up.description
        ));
    }
    body.push_str("\nGood selling,\nCRM Server\n");
    body
}

fn build_mailer(mail: &MailConfig) -> Result<SmtpTransport> {
    let mailer = if mail.smtp_username.is_empty() {
        SmtpTransport::builder_dangerous(&mail.smtp_host)
            .port(mail.smtp_port)
            .build()
    } else {
        SmtpTransport::relay(&mail.smtp_host)
            .context("SMTP relay setup failed")?
            .port(mail.smtp_port)
            .credentials(Credentials::new(
                mail.smtp_username.clone(),
                mail.smtp_password.clone(),
            ))
            .build()
    };
    Ok(mailer)
}

/// Sends (or, with `dry_run`, prints) one reminder per salesperson listing
/// their pending follow-ups due today or earlier.
pub fn send_due_reminders(
    conn: &mut PgConnection,
    mail: &MailConfig,
    dry_run: bool,
) -> Result<()> {
    let today = Utc::now().date_naive();

    let due: Vec<(FollowUpRow, LeadRow)> = follow_ups::table
        .inner_join(leads::table)
        .filter(follow_ups::status.eq(FollowUpStatus::Pending.as_str()))
        .filter(follow_ups::due_on.le(today))
        .filter(leads::owner_id.is_not_null())
        .order(follow_ups::due_on.asc())
        .load(conn)?;

    let mut per_owner: HashMap<Uuid, Vec<(FollowUpRow, LeadRow)>> = HashMap::new();
    for pair in due {
        if let Some(owner) = pair.1.owner_id {
            per_owner.entry(owner).or_default().push(pair);
        }
    }

    if per_owner.is_empty() {
        log::info!("no follow-ups due, nothing to send");
        return Ok(());
    }

    let recipients: HashMap<Uuid, (String, String)> = users::table
        .filter(users::id.eq_any(per_owner.keys().copied().collect::<Vec<_>>()))
        .select((users::id, users::full_name, users::email))
        .load::<(Uuid, String, String)>(conn)?
        .into_iter()
        .map(|(id, name, email)| (id, (name, email)))
        .collect();

    let mailer = if dry_run { None } else { Some(build_mailer(mail)?) };

    for (owner, mut batch) in per_owner {
        let Some((full_name, email)) = recipients.get(&owner) else {
            log::warn!("follow-ups due for unknown user {owner}, skipping");
            continue;
        };
        if already_notified_today(conn, owner)? {
            log::info!("reminder for {full_name} already sent today, skipping");
            continue;
        }
        batch.sort_by_key(|(f, _)| f.due_on);
        let body = reminder_body(full_name, &batch);

        if let Some(mailer) = &mailer {
            let message = Message::builder()
                .from(mail.from_address.parse().context("invalid MAIL_FROM")?)
                .to(email
                    .parse()
                    .with_context(|| format!("invalid recipient address '{email}'"))?)
                .subject("Follow-ups due today")
                .header(ContentType::TEXT_PLAIN)
                .body(body)
                .context("failed to build reminder mail")?;
            mailer
                .send(&message)
                .with_context(|| format!("failed to send reminder to {email}"))?;
            mark_notified(conn, owner)?;
            log::info!("reminder sent to {email} ({} follow-ups)", batch.len());
        } else {
            println!("--- would send to {full_name} <{email}> ---");
            println!("{body}");
        }
    }

    Ok(())
}
