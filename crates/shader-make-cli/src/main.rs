//! `shader-make` command line entry point.

use std::process::ExitCode;

use clap::Parser as _;
use shader_make::{shader_make_core::run_state::RunState, Cli};

fn main() -> ExitCode {
    env_logger::builder().init();

    match run() {
        Ok(code) => code,
        Err(error) => {
            log::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let options = cli.resolve_options()?;

    let state = RunState::stdout(options.continue_on_error);
    let cancel = state.cancel_handle();
    ctrlc::set_handler(move || {
        cancel.cancel();
        cancel.print("Aborting...");
    })?;

    let outcome = cli.run(&options, &state)?;
    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
