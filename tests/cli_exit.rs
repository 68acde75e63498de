use color_eyre::eyre::Result;
use std::process::{Command, Stdio};

const CLIENT_ENV: [&str; 4] = ["TARGET_SERVICE", "TARGET_PORT", "TEST_DELAY", "TEST_SUBDOMAINS"];

fn client() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hostecho-probe"));
    for var in CLIENT_ENV {
        cmd.env_remove(var);
    }
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    cmd
}

fn server() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hostecho-server"));
    for var in ["PORT", "SERVICE_NAME", "BIND_ADDR"] {
        cmd.env_remove(var);
    }
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    cmd
}

#[test]
fn test_client_exits_1_on_malformed_delay() -> Result<()> {
    let status = client().env("TEST_DELAY", "abc").status()?;
    assert_eq!(status.code(), Some(1));
    Ok(())
}

#[test]
fn test_client_exits_1_on_out_of_range_port() -> Result<()> {
    let status = client().env("TARGET_PORT", "99999").status()?;
    assert_eq!(status.code(), Some(1));
    Ok(())
}

#[test]
fn test_client_help_exits_0() -> Result<()> {
    let status = client().arg("--help").status()?;
    assert_eq!(status.code(), Some(0));
    Ok(())
}

#[test]
fn test_client_exits_1_when_stdout_closes() -> Result<()> {
    let mut child = client()
        .env("TEST_DELAY", "300")
        .env("TEST_SUBDOMAINS", "app")
        .env("TARGET_SERVICE", "invalid")
        .stdout(Stdio::piped())
        .spawn()?;

    // Closing the read end makes every later console write fail
    drop(child.stdout.take());

    let status = child.wait()?;
    assert_eq!(status.code(), Some(1));
    Ok(())
}

#[test]
fn test_server_exits_1_on_malformed_port() -> Result<()> {
    let status = server().env("PORT", "abc").status()?;
    assert_eq!(status.code(), Some(1));
    Ok(())
}
