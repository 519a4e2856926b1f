use anyhow::Context;
use std::path::Path;
use std::process::ExitCode;

/// Fixed relative path of the configuration document. Individual parameters
/// are overridden programmatically (see `vegsat::pipeline::run_with_area`),
/// not via flags.
const CONFIG_PATH: &str = "config/vegsat.toml";

fn main() -> ExitCode {
    match logic() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn logic() -> anyhow::Result<()> {
    let summary = vegsat::pipeline::run(Path::new(CONFIG_PATH))
        .context("acquisition pipeline failed")?;
    if !summary.is_success() {
        anyhow::bail!("every product failed during download or compositing");
    }
    Ok(())
}
