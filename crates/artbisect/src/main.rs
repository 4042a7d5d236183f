use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use artbisect_env::{DeviceTestEnv, EnvConfig, HostTestEnv, TestEnv};
use artbisect_search::search::{bug_search, Outcome};
use artbisect_search::testable::Dex2OatTestable;

mod report;

#[derive(Parser)]
#[command(name = "artbisect")]
#[command(
    about = "Bisect a failing run down to one compiled method and one optimization pass.",
    long_about = None
)]
struct Cli {
    /// Classpath with the test class.
    #[arg(long, alias = "cp", required = true)]
    classpath: String,

    /// Name of the class to run.
    classname: String,

    /// File containing the correct output to compare against.
    #[arg(long)]
    correct_output: Option<PathBuf>,

    /// Run on the host instead of a device.
    #[arg(long)]
    host: bool,

    /// 64-bit mode.
    #[arg(long = "64")]
    x64: bool,

    /// Use the debug runtime library (libartd.so).
    #[arg(short = 'd', long = "lib-debug")]
    lib_debug: bool,

    /// Additional dalvikvm argument, appended verbatim to the launch command.
    #[arg(long = "dalvikvm-option", value_name = "OPTION")]
    extra: Vec<String>,

    /// Narrate every probe on stderr.
    #[arg(long)]
    verbose: bool,

    /// Wall-clock timeout per probe, in seconds.
    #[arg(long, default_value_t = artbisect_env::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,
}

fn main() -> std::process::ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<std::process::ExitCode> {
    let cli = Cli::parse();

    let correct_output = match &cli.correct_output {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("read correct output: {}", path.display()))?,
        ),
        None => None,
    };

    let (base_cmd, env) = prepare_environment(&cli)?;
    let logfile = env.logfile_path().to_path_buf();
    let scratch_dir = logfile
        .parent()
        .context("session log has no parent directory")?
        .to_path_buf();

    let mut testable = match Dex2OatTestable::new(
        base_cmd,
        env,
        &cli.classname,
        correct_output,
        cli.verbose,
    ) {
        Ok(testable) => testable,
        Err(err) => {
            eprintln!("Error. Refer to logfile: {}", logfile.display());
            return Err(err);
        }
    };
    let outcome = match bug_search(&mut testable) {
        Ok(outcome) => outcome,
        Err(err) => {
            let _ = testable.log_note(&format!("Error: {err:#}\n"));
            eprintln!("Error. Refer to logfile: {}", logfile.display());
            return Err(err);
        }
    };

    match &outcome {
        Outcome::NoBug => println!("Couldn't find any bugs."),
        Outcome::MethodOnly(method) => {
            println!("Faulty method: {method}. Fails with just mandatory passes.")
        }
        Outcome::MethodAndPass(method, pass) => {
            println!("Faulty method and pass: {method}, {pass}.")
        }
    }
    println!("Logfile: {}", logfile.display());
    report::write_report(&scratch_dir, &outcome, &logfile)?;

    Ok(std::process::ExitCode::SUCCESS)
}

/// Builds the launch command and the execution environment for this session.
///
/// Environment variables are read once here and handed down as configuration;
/// a missing required variable aborts before any probing.
fn prepare_environment(cli: &Cli) -> Result<(Vec<String>, Box<dyn TestEnv>)> {
    let timeout = Duration::from_secs(cli.timeout);
    let vm = if cli.x64 { "dalvikvm" } else { "dalvikvm32" };
    let mut cmd = vec![vm.to_string()];

    if cli.host {
        let android_build_top = required_env("ANDROID_BUILD_TOP")?;
        let android_host_out = required_env("ANDROID_HOST_OUT")?;

        let lib = if cli.lib_debug { "libartd.so" } else { "libart.so" };
        cmd.push(format!("-XXlib:{lib}"));
        cmd.push("-Xnorelocate".to_string());
        cmd.push(format!(
            "-Ximage:{android_build_top}/out/host/linux-x86/framework/core-optimizing-pic.art"
        ));
        cmd.extend(cli.extra.iter().cloned());

        let config = EnvConfig {
            classpath: cli.classpath.clone(),
            x64: cli.x64,
            android_root: Some(PathBuf::from(android_host_out)),
            timeout,
        };
        let env: Box<dyn TestEnv> = Box::new(HostTestEnv::new(&config)?);
        Ok((cmd, env))
    } else {
        cmd.extend(cli.extra.iter().cloned());
        let config = EnvConfig {
            classpath: cli.classpath.clone(),
            x64: cli.x64,
            android_root: None,
            timeout,
        };
        let env: Box<dyn TestEnv> = Box::new(DeviceTestEnv::new(&config)?);
        Ok((cmd, env))
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} environment variable not set"))
}
