#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use artbisect_env::{EnvConfig, HostTestEnv, TestEnv};

fn config(timeout_secs: u64) -> EnvConfig {
    EnvConfig {
        classpath: "classes.dex".to_string(),
        x64: false,
        // Any directory works as a stand-in build tree for these tests.
        android_root: Some(std::env::temp_dir()),
        timeout: Duration::from_secs(timeout_secs),
    }
}

fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

fn scratch_dir(env: &HostTestEnv) -> std::path::PathBuf {
    env.logfile_path().parent().expect("log parent").to_path_buf()
}

#[test]
fn scratch_layout_has_arch_caches_and_log() {
    let env = HostTestEnv::new(&config(60)).expect("host env");
    let dir = scratch_dir(&env);
    assert!(env.logfile_path().is_file());
    for arch in ["arm", "arm64", "x86", "x86_64"] {
        assert!(dir.join("dalvik-cache").join(arch).is_dir(), "missing {arch}");
    }
}

#[test]
fn create_file_and_write_lines_round_trip() {
    let mut env = HostTestEnv::new(&config(60)).expect("host env");
    let path = env.create_file(Some("compiled_methods")).expect("create");
    env.write_lines(&path, &["a".to_string(), "b".to_string()])
        .expect("write");
    assert_eq!(fs::read_to_string(&path).expect("read"), "a\nb\n");

    let anon = env.create_file(None).expect("create anon");
    assert!(Path::new(&anon).is_file());
    assert_ne!(anon, path);
}

#[test]
fn run_command_captures_output_and_logs() {
    let mut env = HostTestEnv::new(&config(60)).expect("host env");
    let out = env
        .run_command(&sh("echo out; echo err 1>&2"))
        .expect("run");
    assert_eq!(out.exit_status, 0);
    assert_eq!(out.stdout, "out\n");
    assert_eq!(out.stderr, "err\n");

    let log = fs::read_to_string(env.logfile_path()).expect("read log");
    assert!(log.contains("Command:"));
    assert!(log.contains("echo out; echo err 1>&2"));
    assert!(log.contains("Return code: 0"));
    assert!(log.contains("out\n"));
}

#[test]
fn child_sees_the_override_environment() {
    let mut env = HostTestEnv::new(&config(60)).expect("host env");
    let dir = scratch_dir(&env);
    let out = env
        .run_command(&sh("printf %s \"$ANDROID_DATA:$LD_USE_LOAD_BIAS\""))
        .expect("run");
    assert_eq!(out.exit_status, 0);
    assert_eq!(out.stdout, format!("{}:1", dir.display()));
}

#[test]
fn dex_cache_is_scrubbed_before_every_run() {
    let mut env = HostTestEnv::new(&config(60)).expect("host env");
    let cache = scratch_dir(&env).join("dalvik-cache").join("x86");

    for _ in 0..2 {
        let stale = cache.join("stale.oat");
        fs::write(&stale, b"stale").expect("seed cache");
        env.run_command(&sh("true")).expect("run");
        assert!(!stale.exists(), "cache file survived a probe");
    }
}

#[test]
fn timeout_kills_the_child_and_reports_nonzero() {
    let mut env = HostTestEnv::new(&config(1)).expect("host env");
    let out = env.run_command(&sh("sleep 30; echo done")).expect("run");
    assert_eq!(out.exit_status, 1);
    assert!(out.stdout.is_empty());

    let log = fs::read_to_string(env.logfile_path()).expect("read log");
    assert!(log.contains("Return code: TIMEOUT"));
}

#[test]
fn nonzero_exit_is_data_not_an_error() {
    let mut env = HostTestEnv::new(&config(60)).expect("host env");
    let out = env.run_command(&sh("exit 7")).expect("run");
    assert_eq!(out.exit_status, 7);
}
