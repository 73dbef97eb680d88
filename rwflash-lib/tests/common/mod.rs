#![allow(dead_code)]

use rwflash_lib::init_flash::SCRATCH_ADDRESS;
use rwflash_lib::runner::COMMAND_TIMEOUT;
use rwflash_lib::{
    BlhostCommand, Choice, ChoiceProvider, CommandOutput, CommandRequest, CommandRunner,
    ConnectionRequest, DeviceRegistry, Error, FlashTool, Result, Session,
};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use tempfile::TempDir;

pub const DEVICE_DOC: &str = r#"{
    "devices": {
        "X": {
            "interfaces": ["usb"],
            "flash_configs": {"8M": {"fcb_file": "x_8m.bin"}}
        },
        "FAM": {
            "description": "two part family",
            "interfaces": ["usb", "uart"],
            "default_interface": "usb",
            "variants": {
                "FAMA": {"flash_configs": {"4M": {"fcb_file": "fam_4m.bin", "default": true}}},
                "FAMB": {"flash_configs": {
                    "4M": {"fcb_file": "fam_4m.bin"},
                    "16M": {"fcb_file": "fam_16m.bin", "default": true}
                }}
            }
        },
        "SOLO": {
            "interfaces": ["uart"],
            "variants": {"SOLOA": {"flash_configs": {"4M": {"fcb_file": "solo.bin"}}}}
        },
        "DUAL": {
            "interfaces": ["usb", "uart"],
            "flash_configs": {"4M": {"fcb_file": "dual.bin"}}
        },
        "SHARED": {
            "interfaces": ["usb"],
            "fcb_file": "shared.bin",
            "flash_configs": {"4M": {}, "8M": {"default": true}}
        },
        "BARE": {
            "interfaces": ["usb"]
        }
    }
}"#;

pub const BLOBS: &[&str] = &[
    "x_8m.bin",
    "fam_4m.bin",
    "fam_16m.bin",
    "solo.bin",
    "dual.bin",
    "shared.bin",
];

pub struct Fixture {
    pub dir: TempDir,
    pub registry: DeviceRegistry,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_blobs(BLOBS)
    }

    pub fn with_blobs(blobs: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("fcb")).unwrap();
        for blob in blobs {
            std::fs::write(dir.path().join("fcb").join(blob), [0x46, 0x43, 0x46, 0x42]).unwrap();
        }
        let registry = DeviceRegistry::from_json_str(DEVICE_DOC).unwrap();
        Self { dir, registry }
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.dir.path().join("fcb")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    pub fn session(&self, device: &str) -> Session {
        self.session_with(device, &ConnectionRequest::default())
    }

    pub fn session_with(&self, device: &str, request: &ConnectionRequest) -> Session {
        Session::resolve(&self.registry, device, request, None)
            .unwrap()
            .with_blob_dir(self.blob_dir())
            .with_output_dir(self.output_dir())
    }

    pub fn tool(&self, device: &str) -> FlashTool<StubRunner> {
        FlashTool::new(self.session(device), StubRunner::default())
    }

    pub fn tool_with(&self, device: &str, runner: StubRunner) -> FlashTool<StubRunner> {
        FlashTool::new(self.session(device), runner)
    }

    pub fn write_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }
}

/// Programmer double that records every request and emulates flash contents.
#[derive(Default)]
pub struct StubRunner {
    pub requests: Vec<CommandRequest>,
    /// Programmed bytes; anything absent reads back as 0xFF.
    pub memory: BTreeMap<u32, u8>,
    /// Subcommands that exit with code 1.
    pub fail_commands: Vec<&'static str>,
    /// Erase chunk start address that exits with code 1.
    pub fail_erase_at: Option<u32>,
    /// `write-memory` into flash exits with code 1.
    pub fail_program: bool,
    /// Subcommand that times out.
    pub timeout_on: Option<&'static str>,
    /// `(returncode, stdout, stderr)` for `get-property`.
    pub property_output: Option<(i32, String, String)>,
    /// Replaces the generated `read-memory` dump.
    pub read_output: Option<String>,
}

impl StubRunner {
    pub fn commands(&self) -> Vec<&BlhostCommand> {
        self.requests.iter().map(|r| &r.command).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.command.name()).collect()
    }

    pub fn erase_calls(&self) -> Vec<(u32, u32)> {
        self.requests
            .iter()
            .filter_map(|r| match r.command {
                BlhostCommand::FlashEraseRegion { address, len, .. } => Some((address, len)),
                _ => None,
            })
            .collect()
    }

    /// `write-memory` calls that target flash rather than the FCB scratch area.
    pub fn program_calls(&self) -> Vec<u32> {
        self.requests
            .iter()
            .filter_map(|r| match r.command {
                BlhostCommand::WriteMemory { address, .. } if address != SCRATCH_ADDRESS => {
                    Some(address)
                }
                _ => None,
            })
            .collect()
    }

    fn hex_dump(&self, address: u32, len: u32) -> String {
        let bytes: Vec<u8> = (0..len)
            .map(|offset| {
                *self
                    .memory
                    .get(&(address + offset))
                    .unwrap_or(&0xFF)
            })
            .collect();
        let mut out = String::from("Reading memory\n");
        for line in bytes.chunks(16) {
            let tokens: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
            out.push_str(&tokens.join(" "));
            out.push('\n');
        }
        out.push_str("Response status = 0 (0x0) Success.\n");
        out
    }
}

impl CommandRunner for StubRunner {
    fn run(&mut self, request: &CommandRequest) -> Result<CommandOutput> {
        self.requests.push(request.clone());
        let name = request.command.name();

        if self.timeout_on.is_some_and(|timeout| timeout == name) {
            return Err(Error::CommandTimeout {
                command: request.command.to_string(),
                timeout: COMMAND_TIMEOUT,
            });
        }
        if self.fail_commands.iter().any(|failing| *failing == name) {
            return Ok(CommandOutput::new(1, "", "stub failure"));
        }

        let output = match &request.command {
            BlhostCommand::GetProperty { .. } => {
                let (code, stdout, stderr) = self.property_output.clone().unwrap_or((
                    0,
                    r#"{"response": [1258487808], "status": {"description": "0 (0x0) Success.", "value": 0}}"#
                        .to_string(),
                    String::new(),
                ));
                CommandOutput::from_raw(code, stdout, stderr, request.json)
            }
            BlhostCommand::FlashEraseRegion { address, len, .. } => {
                if self.fail_erase_at == Some(*address) {
                    return Ok(CommandOutput::new(1, "", "erase error"));
                }
                let end = u64::from(*address) + u64::from(*len);
                self.memory
                    .retain(|key, _| u64::from(*key) < u64::from(*address) || u64::from(*key) >= end);
                CommandOutput::new(0, "", "")
            }
            BlhostCommand::WriteMemory { address, file } => {
                if *address != SCRATCH_ADDRESS {
                    if self.fail_program {
                        return Ok(CommandOutput::new(1, "", "program error"));
                    }
                    let data = std::fs::read(file)?;
                    for (offset, byte) in data.into_iter().enumerate() {
                        self.memory.insert(address + offset as u32, byte);
                    }
                }
                CommandOutput::new(0, "", "")
            }
            BlhostCommand::ReadMemory { address, len } => {
                let stdout = self
                    .read_output
                    .clone()
                    .unwrap_or_else(|| self.hex_dump(*address, *len));
                CommandOutput::new(0, stdout, "")
            }
            _ => CommandOutput::new(0, "", ""),
        };
        Ok(output)
    }
}

/// Answers prompts from a fixed script and remembers what was asked.
#[derive(Default)]
pub struct ScriptedChoices {
    pub answers: VecDeque<Result<usize>>,
    pub asked: Vec<Choice>,
}

impl ScriptedChoices {
    pub fn new(answers: Vec<Result<usize>>) -> Self {
        Self {
            answers: answers.into(),
            asked: Vec::new(),
        }
    }

    /// Takes the default of every prompt.
    pub fn defaults() -> Self {
        Self::default()
    }
}

impl ChoiceProvider for ScriptedChoices {
    fn choose(&mut self, choice: &Choice) -> Result<usize> {
        self.asked.push(choice.clone());
        match self.answers.pop_front() {
            Some(answer) => answer,
            None => choice
                .default
                .ok_or_else(|| Error::InvalidSelection("no scripted answer".into())),
        }
    }
}
