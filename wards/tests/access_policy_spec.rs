use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use wards::config::PolicyConfig;
use wards::memory::{InMemoryPrincipalStore, InMemoryUsageLedger};
use wards::{AccessPolicy, DenialKind, Principal};

struct Fixture {
    principals: Arc<InMemoryPrincipalStore>,
    usage: Arc<InMemoryUsageLedger>,
    policy: AccessPolicy,
}

fn fixture_with(cfg: PolicyConfig) -> Fixture {
    let principals = Arc::new(InMemoryPrincipalStore::new());
    let usage = Arc::new(InMemoryUsageLedger::new());
    let policy = AccessPolicy::new(principals.clone(), usage.clone(), cfg);
    Fixture {
        principals,
        usage,
        policy,
    }
}

fn fixture() -> Fixture {
    fixture_with(PolicyConfig::default())
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

fn principal(id: &str) -> Principal {
    Principal::new(id, format!("{id}@example.com"))
}

#[tokio::test]
async fn no_dates_is_valid_at_any_instant() {
    let f = fixture();
    f.principals.upsert(principal("u1"));

    for instant in [
        Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
        now(),
        Utc.with_ymd_and_hms(2999, 12, 31, 23, 59, 59).unwrap(),
    ] {
        let d = f.policy.check_access_at("u1", "u1@example.com", instant).await;
        assert!(d.subscription_valid);
        assert!(d.granted);
    }
}

#[tokio::test]
async fn end_only_window_is_inclusive_at_boundary() {
    let f = fixture();
    let mut p = principal("u1");
    p.subscription_end = Some(now());
    f.principals.upsert(p);

    let at_end = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(at_end.subscription_valid);
    assert!(at_end.granted);

    let after = f
        .policy
        .check_access_at("u1", "u1@example.com", now() + ChronoDuration::milliseconds(1))
        .await;
    assert!(!after.subscription_valid);
    assert!(!after.granted);
}

#[tokio::test]
async fn both_bounds_are_inclusive() {
    let f = fixture();
    let start = now() - ChronoDuration::days(30);
    let end = now();
    let mut p = principal("u1");
    p.subscription_start = Some(start);
    p.subscription_end = Some(end);
    f.principals.upsert(p);

    let cases = [
        (start - ChronoDuration::seconds(1), false),
        (start, true),
        (start + ChronoDuration::days(10), true),
        (end, true),
        (end + ChronoDuration::seconds(1), false),
    ];
    for (instant, expected) in cases {
        let d = f.policy.check_access_at("u1", "u1@example.com", instant).await;
        assert_eq!(d.subscription_valid, expected, "at {instant}");
        assert_eq!(d.granted, expected, "at {instant}");
    }
}

#[tokio::test]
async fn start_only_is_treated_as_valid() {
    let f = fixture();
    let mut p = principal("u1");
    p.subscription_start = Some(now() + ChronoDuration::days(7));
    f.principals.upsert(p);

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(d.subscription_valid);
    assert!(d.granted);
}

#[tokio::test]
async fn quota_boundary_sweep() {
    for (used, allowed, expected) in [(0, 0, true), (999, 1000, true), (1000, 1000, true), (1001, 1000, false), (1, 0, false)] {
        let f = fixture();
        let mut p = principal("u1");
        p.tokens_allowed = Some(allowed);
        f.principals.upsert(p);
        if used > 0 {
            f.usage.record("u1", used, now() - ChronoDuration::hours(1));
        }

        let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
        assert_eq!(d.within_quota, expected, "used={used} allowed={allowed}");
        assert_eq!(d.granted, expected);
        assert_eq!(d.tokens_used_in_period, used);
        assert_eq!(d.tokens_allowed, allowed);
    }
}

#[tokio::test]
async fn usage_outside_window_is_not_counted() {
    let f = fixture();
    let start = now() - ChronoDuration::days(10);
    let end = now() + ChronoDuration::days(10);
    let mut p = principal("u1");
    p.subscription_start = Some(start);
    p.subscription_end = Some(end);
    p.tokens_allowed = Some(100);
    f.principals.upsert(p);

    f.usage.record("u1", 5_000, start - ChronoDuration::seconds(1));
    f.usage.record("u1", 60, start);
    f.usage.record("u1", 40, now());
    f.usage.record("u1", 5_000, end + ChronoDuration::seconds(1));
    f.usage.record("someone-else", 5_000, now());

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert_eq!(d.tokens_used_in_period, 100);
    assert!(d.within_quota);
    assert!(d.granted);
}

#[tokio::test]
async fn principal_lookup_failure_denies_regardless_of_usage() {
    let f = fixture();
    f.principals.upsert(principal("u1"));
    f.principals.fail_lookups(true);

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(!d.granted);
    assert_eq!(d.denial, Some(DenialKind::PrincipalLookupFailure));
    assert_eq!(f.usage.lookups(), 0);
}

#[tokio::test]
async fn invalid_subscription_never_queries_usage() {
    let f = fixture();
    let mut p = principal("u1");
    p.subscription_end = Some(now() - ChronoDuration::days(1));
    f.principals.upsert(p);

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(!d.granted);
    assert_eq!(d.denial, Some(DenialKind::SubscriptionExpired));
    assert_eq!(f.principals.lookups(), 1);
    assert_eq!(f.usage.lookups(), 0);
}

#[tokio::test]
async fn usage_failure_with_valid_subscription_is_fail_open() {
    let f = fixture();
    let mut p = principal("u1");
    p.tokens_allowed = Some(10);
    f.principals.upsert(p);
    f.usage.record("u1", 1_000_000, now());
    f.usage.fail_lookups(true);

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(d.granted);
    assert!(d.within_quota);
    assert!(d.usage_lookup_degraded);
    assert_eq!(f.usage.lookups(), 1);
}

#[tokio::test]
async fn evaluations_at_same_instant_are_identical() {
    let f = fixture();
    let mut p = principal("u1");
    p.subscription_end = Some(now() + ChronoDuration::days(3));
    p.tokens_allowed = Some(500);
    f.principals.upsert(p);
    f.usage.record("u1", 120, now() - ChronoDuration::days(1));

    let first = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    let second = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn scenario_a_expired_yesterday() {
    let f = fixture();
    let mut p = principal("u1");
    p.subscription_end = Some(Utc::now() - ChronoDuration::days(1));
    f.principals.upsert(p);

    let d = f.policy.check_access("u1", "u1@example.com").await;
    assert!(!d.granted);
    assert!(!d.subscription_valid);
}

#[tokio::test]
async fn scenario_b_usage_equal_to_allowance_is_granted() {
    let f = fixture();
    let mut p = principal("u1");
    p.tokens_allowed = Some(1000);
    f.principals.upsert(p);
    f.usage.record("u1", 600, now() - ChronoDuration::days(2));
    f.usage.record("u1", 400, now() - ChronoDuration::days(1));

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(d.granted);
    assert_eq!(d.tokens_used_in_period, 1000);
}

#[tokio::test]
async fn scenario_c_usage_over_allowance_is_denied() {
    let f = fixture();
    let mut p = principal("u1");
    p.tokens_allowed = Some(1000);
    f.principals.upsert(p);
    f.usage.record("u1", 1001, now() - ChronoDuration::days(1));

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(!d.granted);
    assert!(!d.within_quota);
    assert!(d.subscription_valid);
    assert_eq!(d.denial, Some(DenialKind::QuotaExceeded));
}

#[tokio::test]
async fn scenario_d_principal_store_error_yields_generic_denial() {
    let f = fixture();
    f.principals.fail_lookups(true);

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(!d.granted);
    assert_eq!(d.reason, wards::config::DEFAULT_DENIAL_MESSAGE);
}

#[tokio::test]
async fn scenario_e_usage_error_with_valid_subscription_is_granted() {
    let f = fixture();
    let mut p = principal("u1");
    p.subscription_start = Some(now() - ChronoDuration::days(1));
    p.subscription_end = Some(now() + ChronoDuration::days(1));
    f.principals.upsert(p);
    f.usage.fail_lookups(true);

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(d.granted);
}

#[tokio::test]
async fn both_gates_share_one_denial_message() {
    let f = fixture();
    let mut expired = principal("expired");
    expired.subscription_end = Some(now() - ChronoDuration::days(1));
    f.principals.upsert(expired);
    let mut over = principal("over");
    over.tokens_allowed = Some(1);
    f.principals.upsert(over);
    f.usage.record("over", 2, now());

    let a = f.policy.check_access_at("expired", "expired@example.com", now()).await;
    let b = f.policy.check_access_at("over", "over@example.com", now()).await;
    assert_ne!(a.denial, b.denial);
    assert_eq!(a.reason, b.reason);
}

#[tokio::test]
async fn principal_lookup_timeout_is_fail_closed() {
    let f = fixture_with(PolicyConfig {
        lookup_timeout: Duration::from_millis(50),
        ..PolicyConfig::default()
    });
    f.principals.upsert(principal("u1"));
    f.principals.delay_lookups(Some(Duration::from_millis(500)));

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(!d.granted);
    assert_eq!(d.denial, Some(DenialKind::PrincipalLookupFailure));
    assert_eq!(f.usage.lookups(), 0);
}

#[tokio::test]
async fn usage_lookup_timeout_is_fail_open() {
    let f = fixture_with(PolicyConfig {
        lookup_timeout: Duration::from_millis(50),
        ..PolicyConfig::default()
    });
    let mut p = principal("u1");
    p.tokens_allowed = Some(0);
    f.principals.upsert(p);
    f.usage.record("u1", 10, now());
    f.usage.delay_lookups(Some(Duration::from_millis(500)));

    let d = f.policy.check_access_at("u1", "u1@example.com", now()).await;
    assert!(d.granted);
    assert!(d.usage_lookup_degraded);
}

#[tokio::test]
async fn evaluations_for_different_principals_run_in_parallel() {
    let f = fixture();
    for i in 0..16 {
        let mut p = principal(&format!("u{i}"));
        p.tokens_allowed = Some(100);
        f.principals.upsert(p);
        f.usage.record(&format!("u{i}"), if i % 2 == 0 { 50 } else { 150 }, now());
    }
    let policy = Arc::new(f.policy);

    let mut handles = Vec::new();
    for i in 0..16 {
        let policy = policy.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("u{i}");
            let email = format!("{id}@example.com");
            (i, policy.check_access_at(&id, &email, now()).await)
        }));
    }
    for h in handles {
        let (i, d) = h.await.unwrap();
        assert_eq!(d.granted, i % 2 == 0, "principal u{i}");
    }
}
