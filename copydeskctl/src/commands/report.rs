use anyhow::{Context, Result};
use backend::{UsageReport, UserUsage};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use tabled::{settings::style::Style, Table, Tabled};

use super::{check_range, connect, format_instant, format_tokens, parse_instant};

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Per-user sessions and token usage over a period
    Usage(UsageArgs),
}

#[derive(Args, Debug)]
pub struct UsageArgs {
    /// Period start (RFC 3339)
    #[arg(long, value_parser = parse_instant)]
    pub from: Option<DateTime<Utc>>,
    /// Period end (RFC 3339)
    #[arg(long, value_parser = parse_instant)]
    pub to: Option<DateTime<Utc>>,
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Tabled)]
struct UsageRow {
    #[tabled(rename = "EMAIL")]
    email: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SESSIONS")]
    sessions: u64,
    #[tabled(rename = "TOKENS USED")]
    tokens_used: u64,
    #[tabled(rename = "TOKENS ALLOWED")]
    tokens_allowed: String,
    #[tabled(rename = "LAST ACTIVITY")]
    last_activity: String,
}

impl From<&UserUsage> for UsageRow {
    fn from(u: &UserUsage) -> Self {
        Self {
            email: u.email.clone(),
            name: u.full_name.clone().unwrap_or_default(),
            sessions: u.session_count,
            tokens_used: u.tokens_used,
            tokens_allowed: format_tokens(u.tokens_allowed),
            last_activity: format_instant(u.last_activity),
        }
    }
}

pub async fn handle(cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::Usage(args) => usage(args).await,
    }
}

async fn usage(args: UsageArgs) -> Result<()> {
    check_range(args.from, args.to)?;
    let backend = connect()?;
    let report = backend
        .fetch_usage_report(args.from, args.to)
        .await
        .context("Failed to build usage report")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &UsageReport) {
    println!(
        "Usage from {} to {}",
        format_instant(report.from),
        format_instant(report.to)
    );
    if !report.rows.is_empty() {
        let mut table = Table::new(report.rows.iter().map(UsageRow::from));
        table.with(Style::rounded());
        println!("{}", table);
    }
    println!(
        "Totals: {} user(s), {} session(s), {} token(s)",
        report.totals.users, report.totals.sessions, report.totals.tokens_used
    );
}
