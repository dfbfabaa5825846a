//! Terminal rendering
//!
//! Plain-text tables and summaries for each dashboard page. Everything
//! returns a `String` so the CLI decides where it goes.

use std::fmt::Write;

use crate::job::{JobProgress, JobStatus};
use crate::outreach::{AnalyticsSummary, DailyStat, EmailAccount, Lead, Template, UnreadEmail};

const NOT_AVAILABLE: &str = "N/A";

/// Cut `text` to `max` characters, appending `...` when shortened
pub fn truncate_text(text: Option<&str>, max: usize) -> String {
    match text {
        None | Some("") => NOT_AVAILABLE.to_string(),
        Some(text) if text.chars().count() > max => {
            let head: String = text.chars().take(max).collect();
            format!("{}...", head)
        }
        Some(text) => text.to_string(),
    }
}

/// The scraper writes `Not found` when a listing has no phone
pub fn format_phone_number(phone: Option<&str>) -> String {
    match phone {
        None | Some("") | Some("Not found") => NOT_AVAILABLE.to_string(),
        Some(phone) => phone.to_string(),
    }
}

/// Status line under the scrape progress bar
pub fn scrape_status_message(progress: &JobProgress) -> String {
    match progress.status {
        JobStatus::Starting => "Starting scraping process...".to_string(),
        JobStatus::InProgress => format!(
            "Scraping in progress: {}/{} businesses found",
            progress.done, progress.total
        ),
        JobStatus::Complete => format!("Scraping complete! Found {} businesses.", progress.done),
        JobStatus::Error => "Scraping failed. Please try again.".to_string(),
        JobStatus::Idle => "Ready to start scraping".to_string(),
    }
}

/// Status line under the bulk-send progress bar
pub fn send_status_message(progress: &JobProgress) -> String {
    match progress.status {
        JobStatus::Idle | JobStatus::Starting => "Preparing emails...".to_string(),
        JobStatus::InProgress => format!("Sending {} of {} emails", progress.done, progress.total),
        JobStatus::Complete => format!("Sent {} emails", progress.total),
        JobStatus::Error => "Sending stopped".to_string(),
    }
}

// ============================================
// Leads
// ============================================

pub fn leads_table(leads: &[Lead]) -> String {
    if leads.is_empty() {
        return "No leads found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<33} {:<18} {:<28} {}",
        "Company", "Phone", "Email", "Status"
    );
    let _ = writeln!(out, "{}", "-".repeat(88));

    for lead in leads {
        let _ = writeln!(
            out,
            "{:<33} {:<18} {:<28} {}",
            truncate_text(lead.company_name.as_deref(), 30),
            format_phone_number(lead.contact_number.as_deref()),
            truncate_text(lead.email.as_deref(), 25),
            if lead.mail_sent { "Sent" } else { "Pending" }
        );
    }
    out
}

/// Leads as CSV with a header row
pub fn leads_csv(leads: &[Lead]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "company_name",
        "contact_number",
        "email",
        "owner_name",
        "mail_sent",
    ])?;

    for lead in leads {
        let sent = lead.mail_sent.to_string();
        writer.write_record([
            lead.id.as_str(),
            lead.company_name.as_deref().unwrap_or_default(),
            lead.contact_number.as_deref().unwrap_or_default(),
            lead.email.as_deref().unwrap_or_default(),
            lead.owner_name.as_deref().unwrap_or_default(),
            sent.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ============================================
// Analytics
// ============================================

pub fn analytics_report(summary: &AnalyticsSummary, stats: &[DailyStat], days: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total Leads:       {}", summary.total_leads);
    let _ = writeln!(out, "Emails Sent:       {}", summary.total_emails_sent);
    let _ = writeln!(out, "Unsent Leads:      {}", summary.unsent_leads);
    let _ = writeln!(out);
    let _ = writeln!(out, "Daily Leads & Emails (Last {} Days)", days);
    let _ = writeln!(out, "{:<12} | {:>8} | {:>11}", "Date", "Leads", "Emails Sent");
    let _ = writeln!(out, "{}", "-".repeat(37));

    if stats.is_empty() {
        let _ = writeln!(out, "No data for the selected range");
    }
    for day in stats {
        let _ = writeln!(out, "{:<12} | {:>8} | {:>11}", day.date, day.leads, day.emails_sent);
    }
    out
}

// ============================================
// Send page
// ============================================

/// Active accounts with their selection and daily usage
pub fn accounts_table(accounts: &[EmailAccount], selected: &[String]) -> String {
    let active: Vec<_> = accounts.iter().filter(|a| a.is_active).collect();
    if active.is_empty() {
        return "No active email accounts.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "    {:<14} {:<30} {:<20} {}",
        "ID", "Email", "Sender", "Sent today"
    );
    let _ = writeln!(out, "{}", "-".repeat(80));
    for account in active {
        let mark = if selected.contains(&account.id) { "[x]" } else { "[ ]" };
        let _ = writeln!(
            out,
            "{} {:<14} {:<30} {:<20} {}/{}",
            mark,
            account.id,
            account.email,
            account.sender_name.as_deref().unwrap_or("-"),
            account.emails_sent_today,
            account.daily_limit
        );
    }
    out
}

/// First three active accounts, then a count of the rest
pub fn accounts_summary(accounts: &[EmailAccount]) -> String {
    let active: Vec<_> = accounts.iter().filter(|a| a.is_active).collect();
    let mut out = String::new();
    for account in active.iter().take(3) {
        let _ = writeln!(out, "{:<40} {} sent", account.email, account.emails_sent_today);
    }
    if active.len() > 3 {
        let _ = writeln!(out, "+{} more accounts", active.len() - 3);
    }
    out
}

pub fn templates_table(templates: &[Template]) -> String {
    if templates.is_empty() {
        return "No templates defined.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<14} {:<24} {}", "ID", "Name", "Subject");
    let _ = writeln!(out, "{}", "-".repeat(70));
    for template in templates {
        let _ = writeln!(
            out,
            "{:<14} {:<24} {}",
            template.id,
            truncate_text(Some(&template.name), 21),
            template.subject
        );
    }
    out
}

// ============================================
// Replies
// ============================================

pub fn unread_list(emails: &[UnreadEmail]) -> String {
    if emails.is_empty() {
        return "No unread emails found.\n".to_string();
    }

    let mut out = String::new();
    for (i, email) in emails.iter().enumerate() {
        if i > 0 {
            let _ = writeln!(out);
        }
        let _ = writeln!(out, "From:    {}", email.sender_email);
        let _ = writeln!(out, "To:      {}", email.recipient_email);
        let _ = writeln!(out, "Time:    {}", email.time);
        let _ = writeln!(out, "Subject: {}", email.subject);
        let _ = writeln!(out, "  {}", email.preview);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(company: Option<&str>, email: Option<&str>, sent: bool) -> Lead {
        Lead {
            id: "l1".into(),
            company_name: company.map(str::to_string),
            contact_number: Some("Not found".into()),
            email: email.map(str::to_string),
            owner_name: None,
            mail_sent: sent,
        }
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text(None, 25), "N/A");
        assert_eq!(truncate_text(Some(""), 25), "N/A");
        assert_eq!(truncate_text(Some("short"), 25), "short");
        assert_eq!(truncate_text(Some("abcdefghij"), 4), "abcd...");
        assert_eq!(truncate_text(Some("café crème"), 4), "café...");
    }

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number(Some("Not found")), "N/A");
        assert_eq!(format_phone_number(None), "N/A");
        assert_eq!(format_phone_number(Some("+1 555 0100")), "+1 555 0100");
    }

    #[test]
    fn test_scrape_status_messages() {
        let mut progress = JobProgress::idle();
        assert_eq!(scrape_status_message(&progress), "Ready to start scraping");

        progress = JobProgress::starting(10);
        assert_eq!(scrape_status_message(&progress), "Starting scraping process...");

        progress.advance(JobStatus::InProgress);
        progress.record(4);
        assert_eq!(
            scrape_status_message(&progress),
            "Scraping in progress: 4/10 businesses found"
        );

        progress.advance(JobStatus::Complete);
        assert_eq!(
            scrape_status_message(&progress),
            "Scraping complete! Found 4 businesses."
        );

        assert_eq!(
            scrape_status_message(&JobProgress::failed()),
            "Scraping failed. Please try again."
        );
    }

    #[test]
    fn test_leads_table() {
        let long = "The Very Long Company Name Bakery Ltd";
        let table = leads_table(&[lead(Some(long), Some("owner@example.com"), false)]);
        assert!(table.contains("The Very Long Company Name Bak..."));
        assert!(table.contains("N/A"));
        assert!(table.contains("Pending"));

        assert_eq!(leads_table(&[]), "No leads found.\n");
    }

    #[test]
    fn test_leads_csv() {
        let csv = leads_csv(&[lead(Some("Acme, Inc"), None, true)]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,company_name,contact_number,email,owner_name,mail_sent")
        );
        assert_eq!(lines.next(), Some("l1,\"Acme, Inc\",Not found,,,true"));
    }

    #[test]
    fn test_analytics_report() {
        let summary = AnalyticsSummary {
            total_leads: 120,
            total_emails_sent: 80,
            unsent_leads: 40,
        };
        let stats = vec![DailyStat {
            date: "2024-05-01".into(),
            leads: 12,
            emails_sent: 8,
        }];
        let report = analytics_report(&summary, &stats, 7);
        assert!(report.contains("Daily Leads & Emails (Last 7 Days)"));
        assert!(report.contains("Total Leads:       120"));
        assert!(report.contains("2024-05-01"));
    }

    #[test]
    fn test_accounts_summary() {
        let accounts: Vec<EmailAccount> = (1..=5)
            .map(|i| EmailAccount {
                id: format!("acc-{}", i),
                email: format!("s{}@acme.io", i),
                sender_name: None,
                daily_limit: 50,
                emails_sent_today: i,
                is_active: i != 2,
            })
            .collect();

        let summary = accounts_summary(&accounts);
        assert!(summary.contains("s1@acme.io"));
        assert!(!summary.contains("s2@acme.io"));
        assert!(summary.contains("s4@acme.io"));
        assert!(!summary.contains("s5@acme.io"));
        assert!(summary.ends_with("+1 more accounts\n"));

        let table = accounts_table(&accounts, &["acc-1".to_string()]);
        assert!(table.contains("[x] acc-1"));
        assert!(table.contains("[ ] acc-3"));
    }

    #[test]
    fn test_unread_list() {
        assert_eq!(unread_list(&[]), "No unread emails found.\n");

        let list = unread_list(&[UnreadEmail {
            sender_email: "owner@bakery.io".into(),
            subject: "Re: Hello".into(),
            ..Default::default()
        }]);
        assert!(list.contains("From:    owner@bakery.io"));
        assert!(list.contains("Subject: Re: Hello"));
    }
}
