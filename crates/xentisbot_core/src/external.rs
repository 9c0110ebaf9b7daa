use std::process::Command;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use tracing::{debug, warn};

const DEFAULT_RETRIES: usize = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 350;
const AUTH_REFUSED_MARKERS: [&str; 2] = ["Permission denied", "Too many authentication failures"];

/// Fetches the body of a web page.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Runs one command on a remote host as a given user.
pub trait RemoteShell {
    fn run(&self, host: &str, user: &str, command: &str) -> Result<ShellOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutcome {
    Output(String),
    /// The host refused the user; not worth reporting when probing many hosts.
    AuthenticationRefused,
}

pub struct HttpPageFetcher {
    client: Client,
    user_agent: String,
    retries: usize,
    retry_delay_ms: u64,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build status page HTTP client")?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
            retries: DEFAULT_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let mut last_error = None::<String>;
        for attempt in 0..=self.retries {
            let response = self
                .client
                .get(url)
                .header("User-Agent", self.user_agent.clone())
                .header("Accept", "text/html, text/plain;q=0.9,*/*;q=0.1")
                .send();
            match response {
                Ok(response) if response.status().is_success() => {
                    return response.text().context("failed to read response body");
                }
                Ok(response) => {
                    last_error = Some(format!("HTTP {} while fetching {url}", response.status().as_u16()));
                }
                Err(error) => last_error = Some(format!("failed to fetch {url}: {error}")),
            }
            if attempt < self.retries {
                debug!(url, attempt, "retrying status page request");
                sleep(Duration::from_millis(
                    self.retry_delay_ms.saturating_mul(attempt as u64 + 1),
                ));
            }
        }
        let message = last_error.unwrap_or_else(|| format!("failed to fetch {url}"));
        warn!(url, "status page request failed");
        bail!("{message}")
    }
}

/// Invokes the system `ssh` client non-interactively.
pub struct SshRemoteShell {
    connect_timeout: Duration,
}

impl SshRemoteShell {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl RemoteShell for SshRemoteShell {
    fn run(&self, host: &str, user: &str, command: &str) -> Result<ShellOutcome> {
        let output = Command::new("ssh")
            .args(ssh_arguments(host, user, command, self.connect_timeout))
            .output()
            .context("failed to start ssh")?;
        if output.status.success() {
            return Ok(ShellOutcome::Output(
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_authentication_refusal(&stderr) {
            return Ok(ShellOutcome::AuthenticationRefused);
        }
        bail!("ssh exited with {}: {}", output.status, stderr.trim())
    }
}

fn ssh_arguments(host: &str, user: &str, command: &str, connect_timeout: Duration) -> Vec<String> {
    vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", connect_timeout.as_secs().max(1)),
        "-l".to_string(),
        user.to_string(),
        host.to_string(),
        command.to_string(),
    ]
}

fn is_authentication_refusal(stderr: &str) -> bool {
    AUTH_REFUSED_MARKERS
        .iter()
        .any(|marker| stderr.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_runs_in_batch_mode_with_timeout() {
        let arguments = ssh_arguments("pdvmapp01", "xen", "xentis stat", Duration::from_secs(10));
        assert_eq!(
            arguments,
            vec![
                "-o",
                "BatchMode=yes",
                "-o",
                "ConnectTimeout=10",
                "-l",
                "xen",
                "pdvmapp01",
                "xentis stat"
            ]
        );
    }

    #[test]
    fn sub_second_timeouts_round_up() {
        let arguments = ssh_arguments("h", "u", "c", Duration::from_millis(200));
        assert_eq!(arguments[3], "ConnectTimeout=1");
    }

    #[test]
    fn permission_denied_is_an_authentication_refusal() {
        assert!(is_authentication_refusal(
            "intui@host1: Permission denied (publickey,password)."
        ));
        assert!(!is_authentication_refusal(
            "ssh: connect to host host1 port 22: Connection refused"
        ));
    }
}
