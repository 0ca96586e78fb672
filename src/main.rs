use anyhow::Result;
use class_dump::config::Config;
use class_dump::driver::Driver;
use class_dump::dump::Dumpers;
use class_dump::loader::FsReader;
use std::env;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();
    init_logging(&args)?;

    let dumpers = Dumpers::default();
    let driver = Driver::new(Config::from_env(), &FsReader, &dumpers);

    let stdout = io::stdout();
    let stderr = io::stderr();
    let status = driver.run(&args, &mut stdout.lock(), &mut stderr.lock());
    Ok(status.into())
}

/// Logs go to stderr. `--debug` among the leading options raises the
/// default level, `RUST_LOG` still applies on top.
fn init_logging(args: &[String]) -> Result<()> {
    let debug = args
        .iter()
        .take_while(|a| a.starts_with("--") && a.as_str() != "--")
        .any(|a| a == "--debug");
    let level = if debug { "class_dump=debug" } else { "class_dump=warn" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
    Ok(())
}
