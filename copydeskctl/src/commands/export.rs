use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use backend::{export, PrincipalFilter};
use backend::sessions::SessionFilter;
use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};

use super::{check_range, connect, parse_instant};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Users,
    Sessions,
    Usage,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// What to export
    #[arg(value_enum)]
    pub kind: ExportKind,
    /// Period start (RFC 3339); sessions and usage only
    #[arg(long, value_parser = parse_instant)]
    pub from: Option<DateTime<Utc>>,
    /// Period end (RFC 3339); sessions and usage only
    #[arg(long, value_parser = parse_instant)]
    pub to: Option<DateTime<Utc>>,
    /// Destination CSV file
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,
}

pub async fn run(args: ExportArgs) -> Result<()> {
    if args.kind == ExportKind::Users && (args.from.is_some() || args.to.is_some()) {
        anyhow::bail!("--from/--to do not apply to the users export");
    }
    check_range(args.from, args.to)?;
    let backend = connect()?;

    let (csv, rows) = match args.kind {
        ExportKind::Users => {
            let users = backend
                .principals()
                .list_all(&PrincipalFilter::default())
                .await
                .context("Failed to list users")?;
            (export::users_csv(&users)?, users.len())
        }
        ExportKind::Sessions => {
            let sessions = backend
                .sessions()
                .list_all(&SessionFilter {
                    user_id: None,
                    from: args.from,
                    to: args.to,
                    limit: None,
                })
                .await
                .context("Failed to list sessions")?;
            (export::sessions_csv(&sessions)?, sessions.len())
        }
        ExportKind::Usage => {
            let report = backend
                .fetch_usage_report(args.from, args.to)
                .await
                .context("Failed to build usage report")?;
            (export::usage_report_csv(&report.rows)?, report.rows.len())
        }
    };

    fs::write(&args.out, csv).with_context(|| format!("Failed to write {:?}", args.out))?;
    tracing::info!(rows, path = ?args.out, "export written");
    println!("✓ Wrote {} row(s) to {}", rows, args.out.display());
    Ok(())
}
