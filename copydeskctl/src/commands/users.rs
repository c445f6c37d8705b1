use anyhow::{Context, Result};
use backend::{PrincipalFilter, UserProfile};
use clap::{Args, Subcommand};
use tabled::{settings::style::Style, Table, Tabled};
use wards::Role;

use super::{connect, format_instant, format_tokens};

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    /// List user profiles, newest first
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive match on email or full name
    #[arg(long)]
    pub search: Option<String>,
    /// Only users with this role (user or admin)
    #[arg(long, value_parser = parse_role)]
    pub role: Option<Role>,
    #[arg(long, default_value = "100", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub limit: u32,
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::parse(raw).ok_or_else(|| format!("unknown role '{}' (expected user or admin)", raw))
}

#[derive(Debug, Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "EMAIL")]
    email: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ROLE")]
    role: String,
    #[tabled(rename = "TOKENS ALLOWED")]
    tokens_allowed: String,
    #[tabled(rename = "SUBSCRIPTION END")]
    subscription_end: String,
}

impl From<&UserProfile> for UserRow {
    fn from(p: &UserProfile) -> Self {
        Self {
            id: p.id.clone(),
            email: p.email.clone(),
            name: p.full_name.clone().unwrap_or_default(),
            role: p.role().to_string(),
            tokens_allowed: format_tokens(p.tokens_allowed),
            subscription_end: format_instant(p.subscription_end),
        }
    }
}

pub async fn handle(cmd: UsersCommands) -> Result<()> {
    match cmd {
        UsersCommands::List(args) => list(args).await,
    }
}

async fn list(args: ListArgs) -> Result<()> {
    let backend = connect()?;
    let users = backend
        .principals()
        .list(&PrincipalFilter {
            search: args.search,
            role: args.role,
            limit: Some(args.limit),
        })
        .await
        .context("Failed to list users")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }
    if users.is_empty() {
        println!("No users found");
        return Ok(());
    }

    let mut table = Table::new(users.iter().map(UserRow::from));
    table.with(Style::rounded());
    println!("{}", table);
    println!("{} user(s)", users.len());
    Ok(())
}
