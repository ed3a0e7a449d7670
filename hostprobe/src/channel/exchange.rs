//! One command's exchange over an exec channel.
//!
//! The exchange reads the channel until it closes, classifying every
//! stdout line:
//!
//! - elevation prompt: answer with the secret, or close and return nothing
//!   when there is no secret
//! - elevation rejected: close and discard everything read so far
//! - permission denied: keep as a warning, keep reading
//! - anything else: an output row
//!
//! Stderr is collected on its own and only ever reported as a warning.
//! No state survives between exchanges.

use log::{debug, trace};
use secrecy::{ExposeSecret, SecretString};

use super::lines::LineBuffer;
use super::patterns::{ElevationPatterns, LineClass};
use crate::error::TransportError;
use crate::transport::{ChannelEvent, ShellChannel};

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The channel closed normally.
    Completed,
    /// Elevation was requested but no secret is configured.
    ElevationUnavailable,
    /// The elevation secret was rejected.
    ElevationRejected,
}

/// Result of running one command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Output rows, truncated to the requested limit.
    pub lines: Vec<String>,

    /// Non-fatal problems: permission denials and stderr content.
    pub warnings: Vec<String>,

    /// How the exchange ended.
    pub outcome: ExchangeOutcome,
}

impl CommandOutput {
    /// Whether the exchange completed without an elevation problem.
    pub fn is_complete(&self) -> bool {
        self.outcome == ExchangeOutcome::Completed
    }
}

enum Step {
    Continue,
    Respond,
    Close(ExchangeOutcome),
}

/// State for a single command exchange.
pub struct Exchange<'a> {
    patterns: &'a ElevationPatterns,
    secret: Option<&'a SecretString>,
    stdout: LineBuffer,
    stderr: LineBuffer,
    lines: Vec<String>,
    errors: Vec<String>,
    warnings: Vec<String>,
    secret_sent: bool,
}

impl<'a> Exchange<'a> {
    /// Create an exchange that answers prompts with `secret`, if any.
    pub fn new(patterns: &'a ElevationPatterns, secret: Option<&'a SecretString>) -> Self {
        Self {
            patterns,
            secret,
            stdout: LineBuffer::new(),
            stderr: LineBuffer::new(),
            lines: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            secret_sent: false,
        }
    }

    /// Drive the channel to completion.
    pub async fn run(
        mut self,
        channel: &mut dyn ShellChannel,
        limit: Option<usize>,
    ) -> Result<CommandOutput, TransportError> {
        let mut outcome = ExchangeOutcome::Completed;

        'read: while let Some(event) = channel.next_event().await? {
            match event {
                ChannelEvent::Stdout(data) => {
                    let mut ready = self.stdout.extend(&data);

                    // Prompts usually arrive without a trailing newline
                    if self.patterns.is_prompt(&self.stdout.partial()) {
                        ready.push(self.stdout.take_partial());
                    }

                    for line in ready {
                        match self.inspect(line) {
                            Step::Continue => {}
                            Step::Respond => self.respond(channel).await?,
                            Step::Close(o) => {
                                outcome = o;
                                break 'read;
                            }
                        }
                    }
                }
                ChannelEvent::Stderr(data) => {
                    let lines = self.stderr.extend(&data);
                    self.errors.extend(lines);
                }
            }
        }

        if outcome == ExchangeOutcome::Completed {
            if let Some(tail) = self.stdout.finish() {
                if let Step::Close(o) = self.inspect(tail) {
                    outcome = o;
                }
            }
        }
        if let Some(tail) = self.stderr.finish() {
            self.errors.push(tail);
        }

        if let Err(e) = channel.close().await {
            debug!("exchange: close after {:?} failed: {}", outcome, e);
        }

        if outcome != ExchangeOutcome::Completed {
            self.lines.clear();
        }

        self.errors.retain(|l| !l.trim().is_empty());
        if !self.errors.is_empty() {
            self.warnings.push(self.errors.join("\n"));
        }

        if let Some(limit) = limit {
            self.lines.truncate(limit);
        }

        Ok(CommandOutput {
            lines: self.lines,
            warnings: self.warnings,
            outcome,
        })
    }

    fn inspect(&mut self, line: String) -> Step {
        match self.patterns.classify(&line) {
            LineClass::PasswordPrompt => match (self.secret, self.secret_sent) {
                (None, _) => {
                    debug!("exchange: elevation requested without a secret");
                    Step::Close(ExchangeOutcome::ElevationUnavailable)
                }
                (Some(_), true) => {
                    debug!("exchange: elevation requested again after answering");
                    Step::Close(ExchangeOutcome::ElevationRejected)
                }
                (Some(_), false) => Step::Respond,
            },
            LineClass::Rejected => {
                debug!("exchange: elevation secret rejected");
                Step::Close(ExchangeOutcome::ElevationRejected)
            }
            LineClass::PermissionDenied => {
                self.warnings.push(line);
                Step::Continue
            }
            LineClass::Output => {
                trace!("exchange: {:?}", line);
                self.lines.push(line);
                Step::Continue
            }
        }
    }

    async fn respond(&mut self, channel: &mut dyn ShellChannel) -> Result<(), TransportError> {
        if let Some(secret) = self.secret {
            let mut payload = secret.expose_secret().as_bytes().to_vec();
            payload.push(b'\n');
            channel.send(&payload).await?;
            self.secret_sent = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChannel;

    async fn run(
        channel: &mut MockChannel,
        secret: Option<&SecretString>,
        limit: Option<usize>,
    ) -> CommandOutput {
        let patterns = ElevationPatterns::default();
        Exchange::new(&patterns, secret)
            .run(channel, limit)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_plain_output() {
        let mut channel = MockChannel::stdout(&["a\nb\n", "c\n"]);
        let output = run(&mut channel, None, None).await;

        assert!(output.is_complete());
        assert_eq!(output.lines, vec!["a", "b", "c"]);
        assert!(output.warnings.is_empty());
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn test_prompt_without_secret_returns_nothing() {
        let mut channel = MockChannel::stdout(&["partial\n", "[sudo] password for admin: ", "secret data\n"]);
        let output = run(&mut channel, None, None).await;

        assert_eq!(output.outcome, ExchangeOutcome::ElevationUnavailable);
        assert!(output.lines.is_empty());
        assert!(channel.is_closed());
        // Closed before the remaining output was read
        assert_eq!(channel.remaining(), 1);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_with_secret_is_answered() {
        let secret = SecretString::from("hunter2");
        let mut channel = MockChannel::stdout(&["[sudo] password for admin: ", "\nSystem Manufacturer\n"]);
        let output = run(&mut channel, Some(&secret), None).await;

        assert!(output.is_complete());
        assert_eq!(channel.sent(), vec!["hunter2\n".to_string()]);
        assert_eq!(output.lines, vec!["", "System Manufacturer"]);
    }

    #[tokio::test]
    async fn test_rejection_discards_rows() {
        let secret = SecretString::from("wrong");
        let mut channel = MockChannel::stdout(&[
            "early row\n",
            "Password: ",
            "\nSorry, try again.\n",
            "Password: ",
        ]);
        let output = run(&mut channel, Some(&secret), None).await;

        assert_eq!(output.outcome, ExchangeOutcome::ElevationRejected);
        assert!(output.lines.is_empty());
        assert_eq!(channel.sent().len(), 1);
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn test_second_prompt_counts_as_rejection() {
        let secret = SecretString::from("wrong");
        let mut channel = MockChannel::stdout(&["Password: ", "\nPassword: "]);
        let output = run(&mut channel, Some(&secret), None).await;

        assert_eq!(output.outcome, ExchangeOutcome::ElevationRejected);
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_is_a_warning() {
        let mut channel = MockChannel::stdout(&[
            "/etc/passwd\n",
            "find: '/root': Permission denied\n",
            "/etc/group\n",
        ]);
        let output = run(&mut channel, None, None).await;

        assert!(output.is_complete());
        assert_eq!(output.lines, vec!["/etc/passwd", "/etc/group"]);
        assert_eq!(output.warnings, vec!["find: '/root': Permission denied"]);
    }

    #[tokio::test]
    async fn test_stderr_kept_out_of_rows() {
        let mut channel = MockChannel::new(vec![
            ChannelEvent::Stdout("row\n".into()),
            ChannelEvent::Stderr("warning: deprecated\n".into()),
            ChannelEvent::Stdout("row 2".into()),
        ]);
        let output = run(&mut channel, None, None).await;

        assert_eq!(output.lines, vec!["row", "row 2"]);
        assert_eq!(output.warnings, vec!["warning: deprecated"]);
    }

    #[tokio::test]
    async fn test_limit_truncates_after_close() {
        let mut channel = MockChannel::stdout(&["one\ntwo\nthree\n"]);
        let output = run(&mut channel, None, Some(1)).await;

        assert_eq!(output.lines, vec!["one"]);
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn test_lost_connection_is_an_error() {
        let mut channel = MockChannel::stdout(&["first row
", "second"]).drop_connection();
        let patterns = ElevationPatterns::default();

        let err = Exchange::new(&patterns, None)
            .run(&mut channel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
    }
}
