use clap::Parser;
use color_eyre::eyre::Result;
use hostecho::probe::{ProbeArgs, ProbeConfig, ProbeRunner, SystemResolver, run_exit_code};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hostecho=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Bad environment values are a failed run, not a usage error
    let args = match ProbeArgs::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    let config: ProbeConfig = args.into();

    let runner = ProbeRunner::new(config, SystemResolver);
    let mut stdout = std::io::stdout().lock();
    let outcome = runner.run(&mut stdout).await;
    if let Err(e) = &outcome {
        eprintln!("Test suite error: {e}");
    }

    Ok(ExitCode::from(run_exit_code(&outcome)))
}
