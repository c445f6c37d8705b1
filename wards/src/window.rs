use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time-bounded validity of a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl SubscriptionWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Whether the subscription admits access at `now`. Both bounds are
    /// inclusive. A start without an end does not constrain access.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start <= now && now <= end,
            (None, Some(end)) => now <= end,
            (Some(_), None) | (None, None) => true,
        }
    }

    /// Bounds used to restrict the usage sum: whichever ends are set.
    pub fn usage_range(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (self.start, self.end)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}
