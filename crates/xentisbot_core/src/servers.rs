use tracing::{debug, warn};

use crate::config::ServerSettings;
use crate::external::{RemoteShell, ShellOutcome};
use crate::reply::Reply;

/// Ask the Xentis installation `name` for its status and push the answers to
/// `out`. Returns whether any host answered.
///
/// Names starting with the configured prefix host are servers of their own and
/// are queried as the service user. Any other name is an installation user that
/// is searched for on every search host.
pub fn check_server(
    shell: &dyn RemoteShell,
    settings: &ServerSettings,
    name: &str,
    out: &mut Vec<Reply>,
) -> bool {
    if !settings.prefix_host.is_empty() && name.starts_with(&settings.prefix_host) {
        out.push(Reply::text(format!("Checking xentis server {name}")));
        return match shell.run(name, &settings.prefix_user, &settings.prefix_command) {
            Ok(ShellOutcome::Output(output)) => {
                out.push(responded(&settings.prefix_user, name, &output));
                true
            }
            Ok(ShellOutcome::AuthenticationRefused) => {
                out.push(failed(&settings.prefix_user, name, "authentication refused"));
                false
            }
            Err(error) => {
                out.push(failed(&settings.prefix_user, name, &format!("{error:#}")));
                false
            }
        };
    }

    let mut answered = false;
    for host in &settings.search_hosts {
        match shell.run(host, name, &settings.search_command) {
            Ok(ShellOutcome::Output(output)) => {
                out.push(responded(name, host, &output));
                answered = true;
            }
            Ok(ShellOutcome::AuthenticationRefused) => {
                debug!(host = %host, user = name, "user unknown on host");
            }
            Err(error) => {
                warn!(host = %host, user = name, error = %format!("{error:#}"), "status command failed");
                out.push(failed(name, host, &format!("{error:#}")));
            }
        }
    }
    if !answered {
        let hosts = settings
            .search_hosts
            .iter()
            .map(|host| format!("`{host}`"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push(Reply::text(format!(
            "No user `{name}` found on any of the hosts {hosts}."
        )));
    }
    answered
}

fn responded(user: &str, host: &str, output: &str) -> Reply {
    Reply::text(format!(
        "User `{user}` on host `{host}` responded with:\n```{output}```"
    ))
}

fn failed(user: &str, host: &str, error: &str) -> Reply {
    Reply::text(format!("User `{user}` on host `{host}` failed with {error}"))
}
