//! Hostprep - Debian/Ubuntu Host Bootstrap
//!
//! Turns a fresh Debian or Ubuntu machine into a usable host in one run:
//! creates or reuses the admin account, applies updates, installs the
//! development tools and optionally Docker and zsh, then wires a login
//! greeting. Every run is appended to a log file.

mod logging;
mod resolve;
mod ui;

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use console::style;
use hostprep_provision::{NoPrompt, Prompt, Sequencer, SystemHost};
use tracing::{error, info};

use resolve::Resolution;
use ui::{CROSS, ConsoleProgress, DialoguerPrompt};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{CROSS}{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let env_var = |key: &str| env::var(key).ok();

    let defaults = || resolve::load_defaults(&resolve::defaults_path(env_var));
    let config = match resolve::resolve(defaults, env::args_os(), env_var) {
        Ok(Resolution::Help(usage)) => {
            print!("{usage}");
            return Ok(ExitCode::SUCCESS);
        }
        Ok(Resolution::Run(config)) => config,
        Err(e) => {
            eprintln!("{CROSS}{e}");
            eprintln!("Run {} for usage.", style("hostprep --help").cyan());
            return Ok(ExitCode::FAILURE);
        }
    };

    // A missing log file is not fatal; the privilege check reports the cause
    if let Some(path) = &config.log_file
        && let Err(e) = logging::init(path)
    {
        eprintln!(
            "{} {e:#}, continuing without a log file",
            style("!").yellow()
        );
    }

    ui::print_banner();

    let mut terminal = DialoguerPrompt;
    let mut unattended = NoPrompt;
    let prompt: &mut dyn Prompt = if config.interactive {
        &mut terminal
    } else {
        &mut unattended
    };

    let config = resolve::elicit(config, prompt).context("Failed to read answers")?;
    ui::print_config_table(&config);
    info!(config = ?config, "configuration resolved");

    let sequencer = Sequencer::standard();
    let mut progress = ConsoleProgress::new(config.interactive);
    let report = sequencer.run(&config, &SystemHost::new(), prompt, &mut progress);

    ui::print_summary(&report, &sequencer.names());
    if let Some(path) = &config.log_file {
        println!("{} Log: {}", style("i").cyan(), path.display());
    }

    info!(exit_code = report.exit_code(), "provisioning finished");
    Ok(ExitCode::from(report.exit_code()))
}
