//! Child process execution with output streaming, timeout and exit-code validation

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long output is still collected after the process exits while its pipes stay open.
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Which pipe a line of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Captured output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    fn push_line(&mut self, stream: OutputStream, line: &str) {
        let buffer = match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        };
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(line);
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed while waiting for `{command}`")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` did not finish within {:.1}s\n{}", .timeout.as_secs_f64(), .output.combined())]
    TimedOut {
        command: String,
        timeout: Duration,
        output: ProcessOutput,
    },

    #[error("`{command}` exited with {} (expected {expected})\n{}", describe_exit(.output.exit_code), .output.combined())]
    UnexpectedExitCode {
        command: String,
        expected: i32,
        output: ProcessOutput,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "no exit code".to_string(),
    }
}

/// A process to start: program, arguments, working directory and environment changes.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    env_remove: Vec<OsString>,
    timeout: Option<Duration>,
    expected_exit_code: Option<i32>,
}

impl CommandSpec {
    /// A command that must exit with code 0 and has no timeout.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            env_remove: Vec::new(),
            timeout: None,
            expected_exit_code: Some(0),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env.push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn env_remove(mut self, key: impl AsRef<OsStr>) -> Self {
        self.env_remove.push(key.as_ref().to_os_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn expect_exit_code(mut self, code: i32) -> Self {
        self.expected_exit_code = Some(code);
        self
    }

    /// Accept any exit code; the caller inspects [`ProcessOutput::exit_code`].
    pub fn allow_any_exit_code(mut self) -> Self {
        self.expected_exit_code = None;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// The value `key` is set to, if this command sets it.
    pub fn get_env(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.env
            .iter()
            .rev()
            .find(|(name, _)| name == key.as_ref())
            .map(|(_, value)| value.as_os_str())
    }

    /// Whether `key` is removed from the inherited environment.
    pub fn removes_env(&self, key: impl AsRef<OsStr>) -> bool {
        self.env_remove.iter().any(|name| name == key.as_ref())
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        for key in &self.env_remove {
            command.env_remove(key);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        command
    }
}

impl fmt::Display for CommandSpec {
    /// The command line as it would be typed, for logs and error messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

type LineCallback = Box<dyn Fn(OutputStream, &str) + Send + Sync>;

/// Starts [`CommandSpec`]s, streaming each output line to an optional callback while capturing it.
#[derive(Default)]
pub struct ProcessRunner {
    on_line: Option<LineCallback>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `callback` for every line of stdout and stderr as it is produced.
    pub fn with_line_callback(mut self, callback: impl Fn(OutputStream, &str) + Send + Sync + 'static) -> Self {
        self.on_line = Some(Box::new(callback));
        self
    }

    /// Run `spec` to completion.
    ///
    /// On timeout the process is killed and the output captured so far is returned in the error.
    #[tracing::instrument(skip_all, fields(command = %spec))]
    pub fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        let command_line = spec.to_string();
        let mut child = spec.to_command().spawn().map_err(|source| ProcessError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        let (sender, receiver) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputStream::Stdout, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputStream::Stderr, sender.clone());
        }
        drop(sender);

        let started = Instant::now();
        let deadline = spec.timeout.map(|timeout| started + timeout);
        let mut output = ProcessOutput::default();
        let mut status: Option<ExitStatus> = None;
        let mut drain_until: Option<Instant> = None;
        let wait_error = |source| ProcessError::Wait {
            command: command_line.clone(),
            source,
        };

        loop {
            let wait = match drain_until {
                Some(until) => until.saturating_duration_since(Instant::now()),
                None => POLL_INTERVAL,
            };
            match receiver.recv_timeout(wait) {
                Ok((stream, line)) => {
                    tracing::trace!(?stream, %line);
                    if let Some(callback) = &self.on_line {
                        callback(stream, &line);
                    }
                    output.push_line(stream, &line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Both pipes closed.
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(until) = drain_until {
                // Exited, but a descendant still holds the pipes open.
                if Instant::now() >= until {
                    tracing::debug!("output pipes still open after exit; not waiting for descendants");
                    break;
                }
                continue;
            }

            status = child.try_wait().map_err(wait_error)?;
            if status.is_some() {
                drain_until = Some(Instant::now() + EXIT_DRAIN_GRACE);
                continue;
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                output.exit_code = kill(&mut child);
                tracing::warn!(elapsed = ?started.elapsed(), "process timed out");
                return Err(ProcessError::TimedOut {
                    command: command_line,
                    timeout: spec.timeout.unwrap_or_default(),
                    output,
                });
            }
        }

        let status = match status {
            Some(status) => status,
            None => child.wait().map_err(wait_error)?,
        };
        output.exit_code = status.code();
        tracing::debug!(exit_code = ?output.exit_code, elapsed = ?started.elapsed(), "process finished");

        match spec.expected_exit_code {
            Some(expected) if output.exit_code != Some(expected) => Err(ProcessError::UnexpectedExitCode {
                command: command_line,
                expected,
                output,
            }),
            _ => Ok(output),
        }
    }
}

fn spawn_reader(pipe: impl Read + Send + 'static, stream: OutputStream, sender: Sender<(OutputStream, String)>) {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) | Err(_) => return,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buffer);
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if sender.send((stream, line)).is_err() {
                        return;
                    }
                }
            }
        }
    });
}

fn kill(child: &mut Child) -> Option<i32> {
    if let Err(e) = child.kill() {
        tracing::warn!(error = %e, "failed to kill timed out process");
    }
    child.wait().ok().and_then(|status| status.code())
}
