//! `access check`: run the access policy for one account and print the decision.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use wards::{config as policy_config, AccessDecision, AccessPolicy};

use super::{connect, format_tokens, should_use_color};

#[derive(Subcommand, Debug)]
pub enum AccessCommands {
    /// Evaluate subscription window and token quota (exit code 1 when denied)
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long)]
    pub principal_id: String,
    #[arg(long)]
    pub email: String,
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn handle(cmd: AccessCommands) -> Result<()> {
    match cmd {
        AccessCommands::Check(args) => check(args).await,
    }
}

async fn check(args: CheckArgs) -> Result<()> {
    let backend = Arc::new(connect()?);
    let policy_cfg = policy_config::load_from_env().context("Invalid access policy settings")?;
    let policy = AccessPolicy::new(backend.clone(), backend, policy_cfg);

    let decision = policy.check_access(&args.principal_id, &args.email).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print_decision(&decision);
    }

    if !decision.granted {
        std::process::exit(1);
    }
    Ok(())
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

fn print_decision(decision: &AccessDecision) {
    let verdict = if decision.granted { "GRANTED" } else { "DENIED" };
    let verdict = match (should_use_color(), decision.granted) {
        (false, _) => verdict.to_string(),
        (true, true) => verdict.green().to_string(),
        (true, false) => verdict.red().to_string(),
    };

    println!("Access: {}", verdict);
    println!("Reason: {}", decision.reason);
    if let Some(kind) = decision.denial {
        println!("Denial: {}", kind);
    }
    println!("Subscription valid: {}", yes_no(decision.subscription_valid));
    println!(
        "Within quota: {} ({} / {} tokens)",
        yes_no(decision.within_quota),
        decision.tokens_used_in_period,
        format_tokens(Some(decision.tokens_allowed))
    );
    if decision.usage_lookup_degraded {
        println!("Warning: usage ledger unavailable, quota not enforced");
    }
    println!("Evaluated at: {}", decision.evaluated_at.to_rfc3339());
}
