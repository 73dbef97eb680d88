mod common;

use common::{Fixture, StubRunner};
use rwflash_lib::init_flash::{FCB_MARKER, FLEXSPI_NOR_MEMORY_ID, SCRATCH_ADDRESS};
use rwflash_lib::runner::COMMAND_TIMEOUT;
use rwflash_lib::{BlhostCommand, Error, FlashTool};

#[test]
fn issues_the_three_step_sequence() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("X");

    let geometry = tool.initialize_flash(None).unwrap();
    assert_eq!(geometry.name, "8M");

    let runner = tool.into_runner();
    assert_eq!(
        runner.commands(),
        vec![
            &BlhostCommand::FillMemory {
                address: SCRATCH_ADDRESS,
                count: 4,
                pattern: FCB_MARKER,
            },
            &BlhostCommand::WriteMemory {
                address: SCRATCH_ADDRESS,
                file: fixture.blob_dir().join("x_8m.bin"),
            },
            &BlhostCommand::ConfigureMemory {
                memory_id: FLEXSPI_NOR_MEMORY_ID,
                address: SCRATCH_ADDRESS,
            },
        ]
    );
    assert_eq!(
        runner.requests[0].argv(),
        vec!["-u", "0x1FC9,0x0020", "--", "fill-memory", "0x2000F000", "4", "0xC0100002", "word"]
    );
    assert_eq!(
        runner.requests[2].argv(),
        vec!["-u", "0x1FC9,0x0020", "--", "configure-memory", "9", "0x2000F000"]
    );
}

#[test]
fn named_geometry_selects_its_blob() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("FAMB");

    let geometry = tool.initialize_flash(Some("4m")).unwrap();
    assert_eq!(geometry.name, "4M");
    let runner = tool.into_runner();
    assert!(matches!(
        runner.commands()[1],
        BlhostCommand::WriteMemory { file, .. } if file.ends_with("fam_4m.bin")
    ));
}

#[test]
fn missing_blob_issues_no_commands() {
    let fixture = Fixture::with_blobs(&[]);
    let mut tool = fixture.tool("X");

    let err = tool.initialize_flash(None).unwrap_err();
    assert!(matches!(err, Error::MissingBlob(path) if path.ends_with("x_8m.bin")));
    assert!(tool.runner().requests.is_empty());
}

#[test]
fn failing_step_stops_the_sequence() {
    let fixture = Fixture::new();
    let runner = StubRunner {
        fail_commands: vec!["write-memory"],
        ..Default::default()
    };
    let mut tool = fixture.tool_with("X", runner);

    match tool.initialize_flash(None).unwrap_err() {
        Error::Initialization { step, detail } => {
            assert!(step.starts_with("write-memory 0x2000F000"));
            assert!(detail.contains("stub failure"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(tool.runner().names(), vec!["fill-memory", "write-memory"]);
}

#[test]
fn unknown_geometry_is_rejected() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("X");
    assert!(matches!(
        tool.initialize_flash(Some("32M")),
        Err(Error::UnknownGeometry { .. })
    ));
    assert!(tool.runner().requests.is_empty());
}

#[test]
fn device_level_blob_is_shared_by_geometries() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("SHARED");

    let geometry = tool.initialize_flash(Some("4M")).unwrap();
    assert_eq!(geometry.name, "4M");
    assert!(matches!(
        tool.runner().commands()[1],
        BlhostCommand::WriteMemory { file, .. } if file.ends_with("shared.bin")
    ));
}

#[test]
fn device_without_geometries_cannot_be_initialized() {
    let fixture = Fixture::new();
    let mut tool = fixture.tool("BARE");
    assert!(matches!(
        tool.initialize_flash(None),
        Err(Error::NoGeometry(id)) if id == "BARE"
    ));
}

#[test]
fn timeout_propagates() {
    let fixture = Fixture::new();
    let runner = StubRunner {
        timeout_on: Some("configure-memory"),
        ..Default::default()
    };
    let mut tool = fixture.tool_with("X", runner);
    assert!(matches!(
        tool.initialize_flash(None),
        Err(Error::CommandTimeout { timeout, .. }) if timeout == COMMAND_TIMEOUT
    ));
}

#[test]
fn session_starts_with_the_default_geometry() {
    let fixture = Fixture::new();
    let session = fixture.session("FAMB");
    assert_eq!(session.geometry.as_ref().map(|g| g.name.as_str()), Some("16M"));
    assert_eq!(fixture.session("BARE").geometry, None);
}

#[test]
fn pinned_geometry_drives_initialization() {
    let fixture = Fixture::new();
    let session = fixture.session("FAMB").with_geometry("4M").unwrap();
    let mut tool = FlashTool::new(session, StubRunner::default());

    let geometry = tool.initialize_flash(None).unwrap();
    assert_eq!(geometry.name, "4M");
    assert!(matches!(
        tool.runner().commands()[1],
        BlhostCommand::WriteMemory { file, .. } if file.ends_with("fam_4m.bin")
    ));

    // An explicit size still wins over the pinned one.
    let geometry = tool.initialize_flash(Some("16M")).unwrap();
    assert_eq!(geometry.name, "16M");
}

#[test]
fn pinning_an_unlisted_size_fails() {
    let fixture = Fixture::new();
    assert!(matches!(
        fixture.session("FAMA").with_geometry("16M"),
        Err(Error::UnknownGeometry { device, geometry }) if device == "FAMA" && geometry == "16M"
    ));
}
