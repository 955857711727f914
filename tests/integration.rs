use std::{env, fs, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_contagion"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    if !output.status.success() {
        let stdout_str = String::from_utf8_lossy(&output.stdout);
        let stderr_str = String::from_utf8_lossy(&output.stderr);
        eprintln!("binary failed with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n");
    }
    output.status.success()
}

fn setup(name: &str, config_contents: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    test_dir
}

#[test]
fn basic_workflow() {
    let config_contents = String::new()
        + "[model]\n"
        + "agents_number = 120\n"
        + "initial_infection_rate = 0.05\n"
        + "infection_radius = 5.0\n"
        + "infection_probability = 0.25\n"
        + "recovery_probability = 0.02\n"
        + "grid_size = 80.0\n"
        + "\n"
        + "[output]\n"
        + "ticks_per_file = 200\n"
        + "ticks_per_save = 20\n";
    let test_dir = setup("basic_workflow", &config_contents);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "create", "--seed", "42"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "create"]));

    assert!(run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "0"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "resume", "--run-idx", "1"]));

    let run_dir = test_dir.join("run-0000");
    assert!(run_dir.join("checkpoint.msgpack").is_file());
    assert!(run_dir.join("trajectory-0000.msgpack").is_file());
    assert!(test_dir.join("run-0001").is_dir());

    assert!(run_bin(&["--sim-dir", test_dir_str, "analyze"]));
    assert!(run_dir.join("results.msgpack").is_file());
    assert!(test_dir.join("report.msgpack").is_file());

    assert!(run_bin(&["--sim-dir", test_dir_str, "clean"]));
    assert!(!run_dir.exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn same_seed_same_checkpoint() {
    let config_contents = String::new()
        + "[model]\n"
        + "agents_number = 60\n"
        + "\n"
        + "[output]\n"
        + "ticks_per_file = 50\n"
        + "ticks_per_save = 10\n";
    let test_dir = setup("same_seed_same_checkpoint", &config_contents);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(run_bin(&["--sim-dir", test_dir_str, "create", "--seed", "7"]));
    assert!(run_bin(&["--sim-dir", test_dir_str, "create", "--seed", "7"]));

    let read = |run: &str, file: &str| {
        fs::read(test_dir.join(run).join(file)).expect("failed to read output file")
    };
    assert_eq!(
        read("run-0000", "checkpoint.msgpack"),
        read("run-0001", "checkpoint.msgpack")
    );
    assert_eq!(
        read("run-0000", "trajectory-0000.msgpack"),
        read("run-0001", "trajectory-0000.msgpack")
    );

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_config_is_rejected() {
    let config_contents = String::new()
        + "[model]\n"
        + "infection_probability = 1.5\n"
        + "\n"
        + "[output]\n"
        + "ticks_per_file = 10\n"
        + "ticks_per_save = 1\n";
    let test_dir = setup("invalid_config_is_rejected", &config_contents);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert!(!run_bin(&["--sim-dir", test_dir_str, "create"]));
    assert!(!test_dir.join("run-0000").exists());

    fs::remove_dir_all(&test_dir).ok();
}
