#![allow(dead_code)]

use assert_cmd::Command;
use httptest::Server;
use tempfile::TempDir;

const CONFIG_VARS: &[&str] = &[
    "COPYDESK_BACKEND_URL",
    "COPYDESK_API_KEY",
    "COPYDESK_JWT_SECRET",
    "COPYDESK_HTTP_TIMEOUT",
    "COPYDESK_CONNECT_TIMEOUT",
    "COPYDESK_MAX_RETRIES",
    "COPYDESK_SECRETS_FILE",
    "WARDS_LOOKUP_TIMEOUT",
    "WARDS_DEFAULT_TOKENS_ALLOWED",
    "WARDS_DENIAL_MESSAGE",
];

/// A `copydeskctl` invocation isolated from the caller's config and env.
/// `COPYDESK_CONFIG` points at a file that does not exist, so settings come
/// from the environment.
pub fn copydeskctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("copydeskctl").unwrap();
    cmd.current_dir(dir.path())
        .env("COPYDESK_CONFIG", dir.path().join("absent.json"))
        .env("NO_COLOR", "1");
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// `copydeskctl` wired to a stub backend.
pub fn against(server: &Server, dir: &TempDir) -> Command {
    let mut cmd = copydeskctl(dir);
    cmd.env("COPYDESK_BACKEND_URL", format!("http://{}", server.addr()))
        .env("COPYDESK_API_KEY", "service-key")
        .env("COPYDESK_MAX_RETRIES", "1");
    cmd
}
