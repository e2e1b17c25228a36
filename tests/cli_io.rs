use std::fs;
use std::path::PathBuf;
use std::process::Command;

use memory_sim::io::{self, IoError, ProcessPages};
use memory_sim::VirtualPageId;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("memsim-{}-{}", std::process::id(), name))
}

fn write_temp(name: &str, content: &str) -> PathBuf {
    let path = temp_path(name);
    fs::write(&path, content).unwrap();
    path
}

fn memory_sim() -> Command {
    Command::new(env!("CARGO_BIN_EXE_memory-sim"))
}

#[test]
fn read_files_from_disk() {
    let init = write_temp("read-init.txt", "# pid pages\n1 0 1\n2 0x3\n");
    assert_eq!(
        io::read_process_pages(&init).unwrap(),
        vec![
            ProcessPages { process: 1, pages: vec![0, 1] },
            ProcessPages { process: 2, pages: vec![3] },
        ]
    );

    let refs = write_temp("read-refs.txt", "7 0 1 2\n0, 3\n");
    assert_eq!(
        io::read_reference_string(&refs).unwrap(),
        [7, 0, 1, 2, 0, 3].into_iter().map(VirtualPageId).collect::<Vec<_>>()
    );

    let bad = write_temp("read-bad.txt", "1 0\n1 zero\n");
    match io::read_page_accesses(&bad) {
        Err(IoError::Parse { line, message }) => {
            assert_eq!(line, 2);
            assert!(message.contains("zero"));
        }
        other => panic!("expected a parse error, got {:?}", other),
    }

    for path in [init, refs, bad] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn paging_command_writes_physical_addresses() {
    let init = write_temp("paging-init.txt", "1 0 1\n2 0\n");
    let input = write_temp("paging-input.txt", "1 100 1 4196\n2 10 1 9000\n");
    let output = temp_path("paging-output.txt");

    let status = memory_sim().arg("paging").arg(&init).arg(&input).arg(&output).status().unwrap();
    assert!(status.success());
    assert_eq!(fs::read_to_string(&output).unwrap(), "100 4196 8202 -1");

    for path in [init, input, output] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn segment_command_reports_violations() {
    let init = write_temp("segment-init.txt", "1 0 CODE 0x1000\n1 1 DATA 0x1000\n");
    let input = write_temp("segment-input.txt", "1 0 16\n1 1 0x10\n1 1 0x1000\n2 0 0\n");
    let output = temp_path("segment-output.txt");

    let status = memory_sim().arg("segment").arg(&init).arg(&input).arg(&output).status().unwrap();
    assert!(status.success());
    assert_eq!(fs::read_to_string(&output).unwrap(), "4112 8464 -1 -1");

    for path in [init, input, output] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn vm_command_reports_swaps() {
    let init = write_temp("vm-init.txt", "1 0 1 2\n");
    let input = write_temp("vm-input.txt", "1 0\n1 1 w\n1 0\n1 2\n");

    let out = memory_sim().arg("vm").arg(&init).arg(&input).args(["--frames", "2"]).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "P1 page 0 FAULT -> frame 0");
    assert_eq!(lines[1], "P1 page 1 FAULT -> frame 1");
    assert!(lines[2].starts_with("P1 page 0 hit"));
    assert!(lines[2].ends_with("-> frame 0"));
    assert_eq!(lines[3], "P1 page 2 FAULT -> frame 0 (swapped out page 0)");
    assert!(stdout.contains("Swap ins:   3"));
    assert!(stdout.contains("Swap outs:  1"));

    let out = memory_sim().arg("vm").arg(&init).arg(&input).args(["--frames", "2", "--json"]).output().unwrap();
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["statistics"]["policy"], "FIFO");
    assert_eq!(report["statistics"]["swap_ins"], 3);
    assert_eq!(report["statistics"]["swap_outs"], 1);
    assert_eq!(report["statistics"]["page_hits"], 1);
    assert_eq!(report["accesses"].as_array().unwrap().len(), 4);
    assert_eq!(report["accesses"][1]["write"], true);

    for path in [init, input] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn vm_command_reads_config() {
    let init = write_temp("vmcfg-init.txt", "1 0 1 2\n");
    let input = write_temp("vmcfg-input.txt", "1 0\n1 1\n1 0\n1 2\n");
    let config = write_temp("vmcfg.toml", "[virtual_memory]\nnum_frames = 1\npolicy = \"lru\"\n");

    let out = memory_sim()
        .arg("--config")
        .arg(&config)
        .arg("vm")
        .arg(&init)
        .arg(&input)
        .arg("--json")
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["statistics"]["policy"], "LRU");
    assert_eq!(report["statistics"]["num_frames"], 1);
    assert_eq!(report["statistics"]["page_faults"], 4);
    assert_eq!(report["statistics"]["swap_ins"], 4);
    assert_eq!(report["statistics"]["swap_outs"], 3);

    let bad = write_temp("vmcfg-bad.toml", "[virtual_memory]\nnum_frames = 0\n");
    let out = memory_sim().arg("--config").arg(&bad).arg("vm").arg(&init).arg(&input).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("num_frames must be positive"));

    for path in [init, input, config, bad] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn vm_command_rejects_zero_frames() {
    let init = write_temp("vm0-init.txt", "1 0\n");
    let input = write_temp("vm0-input.txt", "1 0\n");

    let out = memory_sim().arg("vm").arg(&init).arg(&input).args(["--frames", "0"]).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("at least one frame is required"));

    for path in [init, input] {
        fs::remove_file(path).unwrap();
    }
}

#[test]
fn replace_command_prints_json() {
    let out = memory_sim()
        .args(["replace", "--refs", "1 2 3 1 2 4 5 1", "--policy", "fifo", "--frames", "3", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let report = &reports[0];
    assert_eq!(report["policy"], "FIFO");
    assert_eq!(report["stats"]["page_faults"], 6);
    assert_eq!(report["stats"]["page_hits"], 2);
    assert_eq!(report["steps"].as_array().unwrap().len(), 8);
}

#[test]
fn missing_input_fails() {
    let out = memory_sim()
        .args(["paging", "/nonexistent/init.txt", "/nonexistent/input.txt", "/nonexistent/out.txt"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to read"));
}
