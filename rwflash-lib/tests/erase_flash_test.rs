mod common;

use common::{Fixture, ScriptedChoices, StubRunner};
use rwflash_lib::layout::MAX_ERASE_BLOCK;
use rwflash_lib::progress::{Phase, ProgressCallback, ProgressId, ProgressInfo, ProgressType};
use rwflash_lib::{BlhostCommand, EraseParams, Error};
use std::sync::{Arc, Mutex};

#[test]
fn full_erase_with_single_geometry_only_asks_for_region() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("X");
    let mut chooser = ScriptedChoices::defaults();

    let outcome = tool
        .erase_flash(&EraseParams::default(), &mut chooser)
        .unwrap();
    assert_eq!(outcome.address, 0x0800_0000);
    assert_eq!(outcome.size, 0x80_0000);
    assert_eq!(outcome.chunks, 8);
    assert_eq!(outcome.geometry, "8M");

    assert_eq!(chooser.asked.len(), 1);
    assert_eq!(chooser.asked[0].options.len(), 2);
    assert_eq!(chooser.asked[0].default, Some(0));

    let runner = tool.into_runner();
    assert_eq!(
        &runner.names()[..3],
        &["fill-memory", "write-memory", "configure-memory"]
    );
    let expected: Vec<(u32, u32)> = (0..8)
        .map(|i| (0x0800_0000 + i * MAX_ERASE_BLOCK, MAX_ERASE_BLOCK))
        .collect();
    assert_eq!(runner.erase_calls(), expected);
    assert_eq!(
        runner.requests.last().unwrap().argv(),
        vec!["-u", "0x1FC9,0x0020", "--", "flash-erase-region", "0x08700000", "0x100000", "0"]
    );
}

#[test]
fn secure_region_can_be_chosen() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("X");
    let mut chooser = ScriptedChoices::new(vec![Ok(1)]);

    let outcome = tool
        .erase_flash(&EraseParams::default(), &mut chooser)
        .unwrap();
    assert_eq!(outcome.address, 0x1800_0000);
    assert_eq!(tool.runner().erase_calls()[0].0, 0x1800_0000);
}

#[test]
fn explicit_window_is_split_into_blocks() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("X");
    let mut chooser = ScriptedChoices::defaults();

    let params = EraseParams {
        address: Some(0x1800_0000),
        size: Some(0x25_0000),
    };
    let outcome = tool.erase_flash(&params, &mut chooser).unwrap();
    assert_eq!(outcome.chunks, 3);
    assert!(chooser.asked.is_empty());
    assert_eq!(
        tool.runner().erase_calls(),
        vec![
            (0x1800_0000, 0x10_0000),
            (0x1810_0000, 0x10_0000),
            (0x1820_0000, 0x05_0000),
        ]
    );
}

#[test]
fn failed_block_aborts_the_erase() {
    let fixture = Fixture::new();
    let runner = StubRunner {
        fail_erase_at: Some(0x1820_0000),
        ..Default::default()
    };
    let mut tool = fixture.tool_with("X", runner);
    let params = EraseParams {
        address: Some(0x1800_0000),
        size: Some(0x40_0000),
    };

    match tool
        .erase_flash(&params, &mut ScriptedChoices::defaults())
        .unwrap_err()
    {
        Error::EraseChunk { address, detail } => {
            assert_eq!(address, 0x1820_0000);
            assert!(detail.contains("erase error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(tool.runner().erase_calls().len(), 3);
}

#[test]
fn zero_size_issues_nothing() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("X");
    let params = EraseParams {
        address: Some(0x0800_0000),
        size: Some(0),
    };
    assert!(matches!(
        tool.erase_flash(&params, &mut ScriptedChoices::defaults()),
        Err(Error::InvalidSize(_))
    ));
    assert!(tool.runner().requests.is_empty());
}

#[test]
fn full_erase_option_uses_default_geometry() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("FAMB");
    let mut chooser = ScriptedChoices::defaults();

    let outcome = tool
        .erase_flash(&EraseParams::default(), &mut chooser)
        .unwrap();
    assert_eq!(outcome.geometry, "16M");
    assert_eq!(outcome.size, 0x100_0000);
    assert_eq!(outcome.chunks, 16);

    let size_prompt = &chooser.asked[1];
    assert_eq!(size_prompt.options.len(), 3);
    assert_eq!(size_prompt.options[0], "4M (4,194,304 bytes, 0x400000)");
    assert_eq!(size_prompt.default, Some(2));
    assert!(matches!(
        tool.runner().commands()[1],
        BlhostCommand::WriteMemory { file, .. } if file.ends_with("fam_16m.bin")
    ));
}

#[test]
fn listed_size_uses_its_own_blob() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("FAMB");
    let mut chooser = ScriptedChoices::new(vec![Ok(0), Ok(0)]);

    let outcome = tool
        .erase_flash(&EraseParams::default(), &mut chooser)
        .unwrap();
    assert_eq!(outcome.geometry, "4M");
    assert_eq!(outcome.chunks, 4);
    assert!(matches!(
        tool.runner().commands()[1],
        BlhostCommand::WriteMemory { file, .. } if file.ends_with("fam_4m.bin")
    ));
}

#[test]
fn explicit_size_matching_a_geometry_picks_its_blob() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("FAMB");
    let params = EraseParams {
        address: Some(0x0800_0000),
        size: Some(0x40_0000),
    };

    let outcome = tool
        .erase_flash(&params, &mut ScriptedChoices::defaults())
        .unwrap();
    assert_eq!(outcome.geometry, "4M");
}

#[test]
fn cancelled_prompt_issues_nothing() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("X");
    let mut chooser = ScriptedChoices::new(vec![Err(Error::Cancelled)]);

    let err = tool
        .erase_flash(&EraseParams::default(), &mut chooser)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(tool.runner().requests.is_empty());
}

#[test]
fn timeout_during_erase_propagates() {
    let fixture = Fixture::new();
    let runner = StubRunner {
        timeout_on: Some("flash-erase-region"),
        ..Default::default()
    };
    let mut tool = fixture.tool_with("X", runner);
    let params = EraseParams {
        address: Some(0x0800_0000),
        size: Some(0x20_0000),
    };

    assert!(matches!(
        tool.erase_flash(&params, &mut ScriptedChoices::defaults()),
        Err(Error::CommandTimeout { .. })
    ));
    assert_eq!(tool.runner().erase_calls().len(), 1);
}

#[derive(Default)]
struct PhaseLog {
    events: Mutex<Vec<(Phase, ProgressType)>>,
    advanced: Mutex<u64>,
}

impl ProgressCallback for PhaseLog {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let mut events = self.events.lock().unwrap();
        events.push((info.phase, info.progress_type));
        ProgressId(events.len() as u64)
    }
    fn update_message(&self, _id: ProgressId, _message: String) {}
    fn increment(&self, _id: ProgressId, delta: u64) {
        *self.advanced.lock().unwrap() += delta;
    }
    fn finish(&self, _id: ProgressId, _final_message: String) {}
}

#[test]
fn erase_reports_init_then_a_byte_bar() {
    let fixture = Fixture::new();
    let log = Arc::new(PhaseLog::default());
    let mut tool = fixture.tool("X").with_progress(log.clone());

    tool.erase_flash(
        &EraseParams {
            address: Some(0x0800_0000),
            size: Some(0x25_0000),
        },
        &mut ScriptedChoices::defaults(),
    )
    .unwrap();

    assert_eq!(
        *log.events.lock().unwrap(),
        vec![
            (Phase::Init, ProgressType::Spinner),
            (Phase::Erase, ProgressType::Bar { total: 0x25_0000 }),
        ]
    );
    assert_eq!(*log.advanced.lock().unwrap(), 0x25_0000);
}
