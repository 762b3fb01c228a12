//! Transport that delegates to an external helper program.
//!
//! The helper owns the real channel (a browser session, a gateway client, ...)
//! and is invoked once when a session opens, once per readiness probe and once
//! per send attempt:
//!
//! ```text
//! <program> <open_args...>                   exit 0 = profile usable
//! <program> <ready_args...>                  exit 0 = ready
//! <program> <send_args...>  < message         exit 0 = sent, stderr = reason
//! ```
//!
//! `{recipient}` and `{profile}` in any argument are replaced before the
//! helper is spawned.

use std::{
    path::{Path, PathBuf},
    process::{Output, Stdio},
    time::Duration,
};

use async_trait::async_trait;
use herald_common::{Message, RecipientId, channel};
use serde::{Deserialize, Serialize};
use tokio::{io::AsyncWriteExt, process::Command};

use crate::{ProfileSelector, Transport, TransportError};

const RECIPIENT_PLACEHOLDER: &str = "{recipient}";
const PROFILE_PLACEHOLDER: &str = "{profile}";

fn default_send_args() -> Vec<String> {
    vec!["send".to_string(), RECIPIENT_PLACEHOLDER.to_string()]
}

const fn default_send_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTransport {
    /// Helper program, either a path or a name looked up on `PATH`
    pub program: PathBuf,

    /// Arguments for the open probe; empty means every profile is usable
    #[serde(default)]
    pub open_args: Vec<String>,

    /// Arguments for the readiness probe; empty means the helper is always
    /// ready
    #[serde(default)]
    pub ready_args: Vec<String>,

    #[serde(default = "default_send_args")]
    pub send_args: Vec<String>,

    /// Upper bound on a single send (in seconds)
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl CommandTransport {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            open_args: Vec::new(),
            ready_args: Vec::new(),
            send_args: default_send_args(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }

    #[must_use]
    pub fn with_open_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.open_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_ready_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ready_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_send_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_send_timeout(mut self, secs: u64) -> Self {
        self.send_timeout_secs = secs;
        self
    }

    const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

#[derive(Debug)]
pub struct CommandSession {
    program: PathBuf,
    profile: String,
}

/// Why a helper invocation produced no exit status
enum Invocation {
    Spawn(std::io::Error),
    TimedOut(Duration),
}

/// Locate `program`, searching `PATH` when it is a bare name
async fn resolve(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return is_file(program).await.then(|| program.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(program);
        if is_file(&candidate).await {
            return Some(candidate);
        }
    }

    None
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

/// Expand placeholders in a single pass over each argument, so substituted
/// values are never expanded again
fn substitute(args: &[String], recipient: Option<&RecipientId>, profile: &str) -> Vec<String> {
    let expand = |arg: &String| {
        let mut out = String::with_capacity(arg.len());
        let mut rest = arg.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            rest = &rest[start..];

            if let Some(after) = rest.strip_prefix(PROFILE_PLACEHOLDER) {
                out.push_str(profile);
                rest = after;
            } else if let Some(recipient) = recipient
                && let Some(after) = rest.strip_prefix(RECIPIENT_PLACEHOLDER)
            {
                out.push_str(recipient.as_str());
                rest = after;
            } else {
                out.push('{');
                rest = &rest[1..];
            }
        }
        out.push_str(rest);

        out
    };

    args.iter().map(expand).collect()
}

fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        output.status.code().map_or_else(
            || "terminated by signal".to_string(),
            |code| format!("exit status {code}"),
        )
    } else {
        stderr.to_string()
    }
}

async fn invoke(
    program: &Path,
    args: &[String],
    input: Option<&str>,
    limit: Duration,
) -> Result<Output, Invocation> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(Invocation::Spawn)?;

    let run = async move {
        if let Some(input) = input
            && let Some(mut stdin) = child.stdin.take()
        {
            // A helper that exits without reading its input is judged by its
            // exit status alone
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                channel!(level = DEBUG, "Helper did not read the message: {e}");
            }
        }

        child.wait_with_output().await
    };

    // Dropping the pending future kills the child
    tokio::time::timeout(limit, run)
        .await
        .map_err(|_| Invocation::TimedOut(limit))?
        .map_err(Invocation::Spawn)
}

#[async_trait]
impl Transport for CommandTransport {
    type Session = CommandSession;

    async fn open(&self, profile: &ProfileSelector) -> Result<Self::Session, TransportError> {
        let program = resolve(&self.program).await.ok_or_else(|| {
            TransportError::Unavailable(format!(
                "helper program {} not found",
                self.program.display()
            ))
        })?;

        let session = CommandSession {
            program,
            profile: profile.to_string(),
        };

        if !self.open_args.is_empty() {
            let args = substitute(&self.open_args, None, &session.profile);
            match invoke(&session.program, &args, None, self.send_timeout()).await {
                Ok(output) if output.status.success() => {}
                Ok(output) => return Err(TransportError::Unavailable(failure_reason(&output))),
                Err(Invocation::TimedOut(limit)) => {
                    return Err(TransportError::Unavailable(format!(
                        "no answer after {}s",
                        limit.as_secs()
                    )));
                }
                Err(Invocation::Spawn(e)) => {
                    return Err(TransportError::Unavailable(format!(
                        "failed to run helper: {e}"
                    )));
                }
            }
        }

        channel!(
            level = INFO,
            "Using helper {} with profile {profile}",
            session.program.display()
        );

        Ok(session)
    }

    async fn ensure_ready(
        &self,
        session: &mut Self::Session,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        if self.ready_args.is_empty() {
            return Ok(());
        }

        let args = substitute(&self.ready_args, None, &session.profile);
        match invoke(&session.program, &args, None, timeout).await {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(TransportError::ChannelNotReady(failure_reason(&output))),
            Err(Invocation::TimedOut(limit)) => Err(TransportError::ChannelNotReady(format!(
                "not ready after {}s",
                limit.as_secs()
            ))),
            Err(Invocation::Spawn(e)) => Err(TransportError::ChannelNotReady(format!(
                "readiness probe failed: {e}"
            ))),
        }
    }

    async fn send_once(
        &self,
        session: &mut Self::Session,
        recipient: &RecipientId,
        message: &Message,
    ) -> Result<(), TransportError> {
        let args = substitute(&self.send_args, Some(recipient), &session.profile);
        channel!("Invoking helper for {recipient}");

        match invoke(
            &session.program,
            &args,
            Some(message.as_str()),
            self.send_timeout(),
        )
        .await
        {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(TransportError::SendRejected(failure_reason(&output))),
            Err(Invocation::TimedOut(_)) => Err(TransportError::SendRejected("timed out".to_string())),
            Err(Invocation::Spawn(e)) => Err(TransportError::Session(format!(
                "failed to run helper: {e}"
            ))),
        }
    }

    async fn close(&self, session: Self::Session) {
        channel!(
            level = DEBUG,
            "Released helper {} (profile {})",
            session.program.display(),
            session.profile
        );
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn placeholders_are_substituted() {
        let recipient = RecipientId::parse("919876543210").expect("recipient");
        let args = vec![
            "--to={recipient}".to_string(),
            "--profile".to_string(),
            "{profile}".to_string(),
        ];

        assert_eq!(
            substitute(&args, Some(&recipient), "work"),
            vec!["--to=919876543210", "--profile", "work"]
        );
        assert_eq!(
            substitute(&args, None, "work"),
            vec!["--to={recipient}", "--profile", "work"]
        );
    }

    #[test]
    fn substituted_values_are_not_expanded_again() {
        let recipient = RecipientId::parse("919876543210").expect("recipient");
        let args = vec!["{profile}:{recipient}".to_string(), "{{profile}}".to_string()];

        assert_eq!(
            substitute(&args, Some(&recipient), "team-{recipient}"),
            vec!["team-{recipient}:919876543210", "{team-{recipient}}"]
        );
    }

    #[test]
    fn config_defaults_from_ron() {
        let transport: CommandTransport =
            ron::from_str(r#"(program: "wa-helper")"#).expect("parse");

        assert_eq!(transport, CommandTransport::new("wa-helper"));
        assert_eq!(transport.send_args, vec!["send", "{recipient}"]);
        assert_eq!(transport.send_timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let transport = CommandTransport::new("/nonexistent/herald-helper");
        let result = transport.open(&ProfileSelector::Default).await;

        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }
}
