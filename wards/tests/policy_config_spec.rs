use std::time::Duration;

use serial_test::serial;
use wards::config::{load_from_env, ConfigError, UNLIMITED_TOKENS};

fn clear() {
    std::env::remove_var("WARDS_LOOKUP_TIMEOUT");
    std::env::remove_var("WARDS_DEFAULT_TOKENS_ALLOWED");
    std::env::remove_var("WARDS_DENIAL_MESSAGE");
}

#[test]
#[serial]
fn defaults_when_unset() {
    clear();
    let cfg = load_from_env().unwrap();
    assert_eq!(cfg.lookup_timeout, Duration::from_secs(5));
    assert_eq!(cfg.default_tokens_allowed, UNLIMITED_TOKENS);
    assert!(cfg.denial_message.contains("contact support"));
}

#[test]
#[serial]
fn reads_all_overrides() {
    clear();
    std::env::set_var("WARDS_LOOKUP_TIMEOUT", "750ms");
    std::env::set_var("WARDS_DEFAULT_TOKENS_ALLOWED", "50000");
    std::env::set_var("WARDS_DENIAL_MESSAGE", "No access.");

    let cfg = load_from_env().unwrap();
    assert_eq!(cfg.lookup_timeout, Duration::from_millis(750));
    assert_eq!(cfg.default_tokens_allowed, 50_000);
    assert_eq!(cfg.denial_message, "No access.");
    clear();
}

#[test]
#[serial]
fn unlimited_keyword_is_accepted() {
    clear();
    std::env::set_var("WARDS_DEFAULT_TOKENS_ALLOWED", "Unlimited");
    assert_eq!(
        load_from_env().unwrap().default_tokens_allowed,
        UNLIMITED_TOKENS
    );
    clear();
}

#[test]
#[serial]
fn malformed_values_are_errors() {
    clear();
    std::env::set_var("WARDS_LOOKUP_TIMEOUT", "soon");
    assert!(matches!(
        load_from_env(),
        Err(ConfigError::Malformed {
            var: "WARDS_LOOKUP_TIMEOUT",
            ..
        })
    ));

    std::env::set_var("WARDS_LOOKUP_TIMEOUT", "0s");
    assert!(load_from_env().is_err());
    clear();

    std::env::set_var("WARDS_DEFAULT_TOKENS_ALLOWED", "-5");
    assert!(matches!(
        load_from_env(),
        Err(ConfigError::Malformed {
            var: "WARDS_DEFAULT_TOKENS_ALLOWED",
            ..
        })
    ));
    clear();
}
