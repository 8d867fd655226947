//! External process execution
//!
//! Every tool invocation goes through [`ProcessRunner`], which logs the
//! command line and echoes the tool's output with registered secrets
//! replaced. Long-running tools are streamed line by line; short queries
//! (`simctl list`, `git branch`) are captured.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::redact::Redactor;

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `-name value` pair in xcodebuild style
    pub fn option(self, name: &str, value: impl Into<String>) -> Self {
        self.arg(format!("-{}", name)).arg(value)
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("\"{}\"", part)
                } else {
                    part.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Runs external tools with redacted output
#[derive(Clone, Default)]
pub struct ProcessRunner {
    redactor: Redactor,
}

impl ProcessRunner {
    pub fn new(redactor: Redactor) -> Self {
        Self { redactor }
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Run to completion, echoing stdout and stderr as they arrive
    pub async fn stream(&self, invocation: &Invocation) -> Result<(), ToolError> {
        let command_line = invocation.display();
        info!("$ {}", command_line);

        let mut child = invocation
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let echoed = tokio::try_join!(
            self.echo(stdout, Output::Stdout),
            self.echo(stderr, Output::Stderr)
        );

        // The child is reaped even when echoing failed
        let status = child.wait().await;
        echoed?;
        check_status(&command_line, status?)
    }

    /// Run `invocation` with its stdout piped through `filter`, like
    /// `set -o pipefail; a | b`. The exit status of `invocation` wins.
    pub async fn stream_through(
        &self,
        invocation: &Invocation,
        filter: &Invocation,
    ) -> Result<(), ToolError> {
        let command_line = format!("{} | {}", invocation.display(), filter.display());
        info!("$ {}", command_line);

        let mut producer = invocation
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                command: invocation.display(),
                source,
            })?;
        let mut consumer = match filter
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(consumer) => consumer,
            Err(source) => {
                if let Err(e) = producer.kill().await {
                    warn!(error = %e, "Failed to stop {}", invocation.program);
                }
                return Err(ToolError::Spawn {
                    command: filter.display(),
                    source,
                });
            }
        };

        let producer_out = producer.stdout.take();
        let producer_err = producer.stderr.take();
        let consumer_in = consumer.stdin.take();
        let consumer_out = consumer.stdout.take();
        let consumer_err = consumer.stderr.take();

        let pipe = async move {
            if let (Some(mut from), Some(mut to)) = (producer_out, consumer_in) {
                tokio::io::copy(&mut from, &mut to).await?;
            }
            // `to` is dropped here, closing the filter's stdin
            Ok::<(), std::io::Error>(())
        };

        let piped = tokio::try_join!(
            async { pipe.await.map_err(ToolError::Io) },
            self.echo(producer_err, Output::Stderr),
            self.echo(consumer_out, Output::Stdout),
            self.echo(consumer_err, Output::Stderr)
        );

        // Both children are reaped before any error is returned
        let producer_status = producer.wait().await;
        let consumer_status = consumer.wait().await;
        piped?;
        check_status(&invocation.display(), producer_status?)?;
        check_status(&filter.display(), consumer_status?)
    }

    /// Run to completion and return stdout. Stderr is logged at debug level.
    pub async fn capture(&self, invocation: &Invocation) -> Result<String, ToolError> {
        let command_line = invocation.display();
        debug!("$ {}", command_line);

        let output = invocation
            .command()
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        if !output.stderr.is_empty() {
            debug!(
                "{}",
                self.redactor.apply(&String::from_utf8_lossy(&output.stderr))
            );
        }
        check_status(&command_line, output.status)?;

        String::from_utf8(output.stdout).map_err(|_| ToolError::OutputNotUtf8 {
            command: command_line,
        })
    }

    async fn echo<R>(&self, reader: Option<R>, output: Output) -> Result<(), ToolError>
    where
        R: AsyncRead + Unpin,
    {
        let Some(reader) = reader else {
            return Ok(());
        };
        // Tools may print bytes that are not UTF-8; decode lossily per line
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let raw = String::from_utf8_lossy(&buf);
            let line = self
                .redactor
                .apply(raw.trim_end_matches(|c| c == '\n' || c == '\r'));
            match output {
                Output::Stdout => println!("{}", line),
                Output::Stderr => eprintln!("{}", line),
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Output {
    Stdout,
    Stderr,
}

fn check_status(command: &str, status: ExitStatus) -> Result<(), ToolError> {
    if status.success() {
        Ok(())
    } else {
        Err(ToolError::InvocationFailed {
            command: command.to_string(),
            exit_code: status.code(),
        })
    }
}
