//! Invocation of the external `blhost` programmer.
//!
//! Every unit of work is one blhost process run to completion. The
//! [`CommandRunner`] trait is the only way the rest of the crate talks to the
//! device, so tests can swap the process for a scripted stub.

use crate::connection::ConnectionDescriptor;
use crate::{Error, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use strum::AsRefStr;

pub const DEFAULT_PROGRAMMER: &str = "blhost";
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Marker blhost puts on stderr when no bootloader answers.
pub const NO_DEVICE_MARKER: &str = "SpsdkNoDeviceFoundError";

/// blhost subcommands used by this crate.
#[derive(AsRefStr, Debug, Clone, PartialEq, Eq)]
#[strum(serialize_all = "kebab-case")]
pub enum BlhostCommand {
    GetProperty { tag: u32, memory_id: u32 },
    FillMemory { address: u32, count: u32, pattern: u32 },
    WriteMemory { address: u32, file: PathBuf },
    ConfigureMemory { memory_id: u32, address: u32 },
    FlashEraseRegion { address: u32, len: u32, memory_id: u32 },
    ReadMemory { address: u32, len: u32 },
}

impl BlhostCommand {
    pub fn name(&self) -> &str {
        self.as_ref()
    }

    /// Arguments following the subcommand name.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::GetProperty { tag, memory_id } => vec![tag.to_string(), memory_id.to_string()],
            Self::FillMemory {
                address,
                count,
                pattern,
            } => vec![
                format!("0x{address:08X}"),
                count.to_string(),
                format!("0x{pattern:08X}"),
                "word".to_string(),
            ],
            Self::WriteMemory { address, file } => vec![
                format!("0x{address:08X}"),
                file.to_string_lossy().into_owned(),
            ],
            Self::ConfigureMemory { memory_id, address } => {
                vec![memory_id.to_string(), format!("0x{address:08X}")]
            }
            Self::FlashEraseRegion {
                address,
                len,
                memory_id,
            } => vec![
                format!("0x{address:08X}"),
                format!("0x{len:X}"),
                memory_id.to_string(),
            ],
            Self::ReadMemory { address, len } => {
                vec![format!("0x{address:08X}"), format!("0x{len:X}")]
            }
        }
    }
}

impl std::fmt::Display for BlhostCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        for arg in self.args() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// One fully specified programmer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub connection: ConnectionDescriptor,
    pub command: BlhostCommand,
    /// Ask blhost for `-j` machine readable output.
    pub json: bool,
}

impl CommandRequest {
    /// `<connection-params> [-j] -- <subcommand> <args...>`
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.connection.args();
        if self.json {
            argv.push("-j".to_string());
        }
        argv.push("--".to_string());
        argv.push(self.command.name().to_string());
        argv.extend(self.command.args());
        argv
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusField {
    pub value: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// The subset of blhost's `-j` document this crate looks at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StructuredStatus {
    #[serde(default)]
    pub status: Option<StatusField>,
    #[serde(default)]
    pub response: Vec<u64>,
}

/// Outcome of one programmer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    /// Parsed `-j` output, when it was requested and could be decoded.
    pub structured: Option<StructuredStatus>,
}

impl CommandOutput {
    pub fn new(returncode: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            returncode,
            stdout: stdout.into(),
            stderr: stderr.into(),
            structured: None,
        }
    }

    /// Builds an output, decoding stdout as JSON when `json` was requested and
    /// the run succeeded. Undecodable JSON is kept as plain text.
    pub fn from_raw(
        returncode: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        json: bool,
    ) -> Self {
        let mut output = Self::new(returncode, stdout, stderr);
        if json && returncode == 0 && !output.stdout.trim().is_empty() {
            match serde_json::from_str::<StructuredStatus>(&output.stdout) {
                Ok(structured) => output.structured = Some(structured),
                Err(e) => tracing::warn!("JSON parsing failed: {}", e),
            }
        }
        output
    }

    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    /// Short reason for a failed run.
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("return code {}", self.returncode)
        } else {
            format!("return code {}: {}", self.returncode, stderr)
        }
    }
}

pub trait CommandRunner {
    fn run(&mut self, request: &CommandRequest) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(&mut self, request: &CommandRequest) -> Result<CommandOutput> {
        (**self).run(request)
    }
}

/// Runs blhost as a child process with a hard timeout.
#[derive(Debug, Clone)]
pub struct BlhostRunner {
    program: String,
    timeout: Duration,
    echo_output: bool,
}

impl Default for BlhostRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAMMER)
    }
}

impl BlhostRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: COMMAND_TIMEOUT,
            echo_output: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Log complete stdout/stderr bodies of every run.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo_output = echo;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl CommandRunner for BlhostRunner {
    fn run(&mut self, request: &CommandRequest) -> Result<CommandOutput> {
        let argv = request.argv();
        let command_line = format!("{} {}", self.program, argv.join(" "));
        tracing::debug!("Executing: {}", command_line);

        let mut child = Command::new(&self.program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if Instant::now() >= deadline {
                // Partial output is discarded.
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::CommandTimeout {
                    command: request.command.to_string(),
                    timeout: self.timeout,
                });
            }
            thread::sleep(Duration::from_millis(20));
        };

        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);
        let returncode = status.code().unwrap_or(-1);

        if self.echo_output {
            if !stdout.is_empty() {
                tracing::debug!("STDOUT: {}", stdout);
            }
            if !stderr.is_empty() {
                tracing::debug!("STDERR: {}", stderr);
            }
        }
        tracing::debug!("Return code: {}", returncode);

        Ok(CommandOutput::from_raw(
            returncode,
            stdout,
            stderr,
            request.json,
        ))
    }
}

fn spawn_reader<S: Read + Send + 'static>(mut stream: S) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = stream.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
