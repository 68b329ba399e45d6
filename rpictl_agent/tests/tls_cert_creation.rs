use assert_cmd::prelude::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;
use std::time::Instant;

fn expected_paths(config_home: &std::path::Path) -> (PathBuf, PathBuf) {
    let base = config_home.join("rpictl_agent").join("tls");
    (base.join("cert.pem"), base.join("key.pem"))
}

#[test]
fn generates_self_signed_cert_and_key_in_xdg_path() {
    // Create an isolated fake XDG_CONFIG_HOME
    let tmpdir = tempfile::tempdir().expect("tempdir");
    let xdg = tmpdir.path().to_path_buf();

    let mut cmd = Command::cargo_bin("rpictl_agent").expect("binary exists");
    // Bind to an ephemeral port (-p 0) to avoid conflicts/flakes
    cmd.env("XDG_CONFIG_HOME", &xdg)
        .env("RPICTL_AGENT_SYSROOT", &xdg)
        .env("RPICTL_AGENT_EVENT_SOCKET", xdg.join("events.sock"))
        .args(["--use-ssl", "--no-daemon", "-p", "0"]);

    let mut child = cmd.spawn().expect("spawn agent");

    // Poll up to ~3s for files to appear to avoid timing flakes
    let (cert_path, key_path) = expected_paths(&xdg);
    let start = Instant::now();
    let timeout = Duration::from_millis(3000);
    let interval = Duration::from_millis(50);
    while start.elapsed() < timeout {
        if cert_path.exists() && key_path.exists() {
            break;
        }
        std::thread::sleep(interval);
    }
    // let the key write finish
    std::thread::sleep(Duration::from_millis(100));

    let _ = child.kill();
    let _ = child.wait();

    assert!(cert_path.exists(), "cert not found at {}", cert_path.display());
    assert!(key_path.exists(), "key not found at {}", key_path.display());

    let cert = fs::read_to_string(&cert_path).unwrap();
    assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
    let key_md = fs::metadata(&key_path).expect("key metadata");
    assert!(key_md.len() > 0, "key is empty");
    assert_eq!(key_md.permissions().mode() & 0o777, 0o600);
}
