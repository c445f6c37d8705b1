//! Query strings for the PostgREST-style table endpoints.

use chrono::{DateTime, SecondsFormat, Utc};

pub const MAX_LIMIT: u32 = 1000;
pub const DEFAULT_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Accumulates `column=op.value` filters plus `select`, `order` and `limit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            params: vec![("select".to_string(), "*".to_string())],
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params[0].1 = columns.to_string();
        self
    }

    pub fn eq(self, column: &str, value: impl AsRef<str>) -> Self {
        self.filter(column, "eq", value.as_ref())
    }

    pub fn neq(self, column: &str, value: impl AsRef<str>) -> Self {
        self.filter(column, "neq", value.as_ref())
    }

    pub fn gte(self, column: &str, at: DateTime<Utc>) -> Self {
        self.filter(column, "gte", &timestamp(at))
    }

    pub fn lte(self, column: &str, at: DateTime<Utc>) -> Self {
        self.filter(column, "lte", &timestamp(at))
    }

    /// Case-insensitive substring match on any of `columns`.
    pub fn search_any(mut self, columns: &[&str], needle: &str) -> Self {
        let needle = sanitize(needle);
        let clauses: Vec<String> = columns
            .iter()
            .map(|c| format!("{}.ilike.*{}*", c, needle))
            .collect();
        self.params
            .push(("or".to_string(), format!("({})", clauses.join(","))));
        self
    }

    /// Adds a sort key. Later calls break ties left by earlier ones.
    pub fn order(mut self, column: &str, order: Order) -> Self {
        let dir = match order {
            Order::Asc => "asc",
            Order::Desc => "desc",
        };
        let key = format!("{}.{}", column, dir);
        match self.params.iter_mut().find(|(k, _)| k == "order") {
            Some((_, v)) => {
                v.push(',');
                v.push_str(&key);
            }
            None => self.params.push(("order".to_string(), key)),
        }
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.params.push(("limit".to_string(), limit.to_string()));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.params.push(("offset".to_string(), offset.to_string()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn filter(mut self, column: &str, op: &str, value: &str) -> Self {
        self.params
            .push((column.to_string(), format!("{}.{}", op, value)));
        self
    }
}

/// Clamps a caller-supplied limit to `1..=MAX_LIMIT`, defaulting when absent.
pub fn effective_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Reserved characters in PostgREST filter grammar.
fn sanitize(needle: &str) -> String {
    needle
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '%'))
        .collect()
}
