//! Console output and terminal prompts

use std::io;
use std::time::Duration;

use comfy_table::{Cell, Color, Table, presets::UTF8_FULL_CONDENSED};
use console::{Emoji, style};
use dialoguer::{Confirm, Input, Password};
use hostprep_provision::prompt::read_until_blank;
use hostprep_provision::{
    Progress, Prompt, PromptError, ProvisioningConfig, ProvisioningReport, StepResult, StepStatus,
};
use indicatif::{ProgressBar, ProgressStyle};

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");

/// Terminal prompts backed by `dialoguer`
#[derive(Debug, Default)]
pub struct DialoguerPrompt;

fn prompt_error(e: dialoguer::Error) -> PromptError {
    PromptError::Io(io::Error::other(e))
}

impl Prompt for DialoguerPrompt {
    fn input(&mut self, message: &str, default: &str) -> Result<String, PromptError> {
        Input::<String>::new()
            .with_prompt(message)
            .default(default.to_string())
            .interact_text()
            .map_err(prompt_error)
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool, PromptError> {
        Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn password(&mut self, message: &str) -> Result<String, PromptError> {
        // Empty answers are rejected by the caller with a retry
        Password::new()
            .with_prompt(message)
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)
    }

    fn multiline(&mut self, message: &str) -> Result<String, PromptError> {
        println!("{KEY}{message}:");
        Ok(read_until_blank(io::stdin().lock())?)
    }
}

/// Step progress on the console
///
/// Non-interactive runs get a spinner per step. Interactive runs print a
/// plain start line instead, since a spinner would draw over prompts.
pub struct ConsoleProgress {
    spinner: bool,
    current: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new(interactive: bool) -> Self {
        Self {
            spinner: !interactive,
            current: None,
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn status_glyph(status: StepStatus) -> String {
    match status {
        StepStatus::Ok => CHECK.to_string(),
        StepStatus::Skipped => style(SKIP).dim().to_string(),
        StepStatus::FailedNonFatal => style(WARN).yellow().to_string(),
        StepStatus::FailedFatal => CROSS.to_string(),
    }
}

fn status_color(status: StepStatus) -> Color {
    match status {
        StepStatus::Ok => Color::Green,
        StepStatus::Skipped => Color::DarkGrey,
        StepStatus::FailedNonFatal => Color::Yellow,
        StepStatus::FailedFatal => Color::Red,
    }
}

impl Progress for ConsoleProgress {
    fn started(&mut self, index: usize, total: usize, name: &str) {
        let label = format!("[{index}/{total}] {name}");
        if self.spinner {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.set_message(label);
            bar.enable_steady_tick(Duration::from_millis(100));
            self.current = Some(bar);
        } else {
            println!("\n{} {}", style("▸").cyan(), style(label).bold());
        }
    }

    fn finished(&mut self, index: usize, total: usize, result: &StepResult) {
        if let Some(bar) = self.current.take() {
            bar.finish_and_clear();
        }

        let detail = result.error.as_deref().unwrap_or(&result.message);
        println!(
            "{}[{index}/{total}] {} {}",
            status_glyph(result.status),
            result.name,
            style(detail).dim()
        );
        for note in &result.notes {
            println!("    {} {}", style("!").yellow(), style(note).dim());
        }
    }
}

pub fn print_banner() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════╗")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("║          HOSTPREP  BOOTSTRAP          ║")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════╝")
            .cyan()
            .bold()
    );
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn print_config_table(config: &ProvisioningConfig) {
    println!("\n{} Configuration\n", style("▸").blue().bold());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Setting").fg(Color::Cyan),
        Cell::new("Value").fg(Color::Cyan),
    ]);

    table.add_row(vec!["User", &config.user]);
    table.add_row(vec![
        "Mode",
        if config.interactive {
            "interactive"
        } else {
            "non-interactive"
        },
    ]);
    table.add_row(vec!["Password", &config.password.to_string()]);
    table.add_row(vec!["Sudo", yes_no(config.grant_sudo)]);
    table.add_row(vec!["SSH key", yes_no(config.add_ssh_key)]);
    table.add_row(vec![
        "Dev packages",
        &if config.install_dev {
            config.dev_packages.join(" ")
        } else {
            "no".to_string()
        },
    ]);
    table.add_row(vec!["Docker", yes_no(config.install_docker)]);
    table.add_row(vec!["Zsh", yes_no(config.install_zsh)]);
    table.add_row(vec!["Greeting", &config.greeting]);
    table.add_row(vec![
        "Log file",
        &config
            .log_file
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |p| p.display().to_string()),
    ]);

    println!("{table}");
}

/// Print the per-step table and the final verdict
///
/// `planned` lists every step name so steps skipped by an abort still show.
pub fn print_summary(report: &ProvisioningReport, planned: &[&str]) {
    println!("\n{} Summary\n", style("▸").blue().bold());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("Step").fg(Color::Cyan),
        Cell::new("Status").fg(Color::Cyan),
        Cell::new("Details").fg(Color::Cyan),
    ]);

    for result in &report.results {
        let mut details = result
            .error
            .clone()
            .unwrap_or_else(|| result.message.clone());
        for note in &result.notes {
            details.push('\n');
            details.push_str(note);
        }
        table.add_row(vec![
            Cell::new(&result.name),
            Cell::new(result.status).fg(status_color(result.status)),
            Cell::new(details),
        ]);
    }
    for name in planned.iter().skip(report.results.len()) {
        table.add_row(vec![
            Cell::new(name),
            Cell::new("not run").fg(Color::DarkGrey),
            Cell::new(""),
        ]);
    }

    println!("{table}");
    println!();

    if let Some(fatal) = report.fatal() {
        eprintln!(
            "{CROSS}{} failed: {}",
            fatal.name,
            fatal.error.as_deref().unwrap_or(&fatal.message)
        );
        return;
    }

    let user = &report.config.user;
    let account = report
        .account
        .map_or_else(String::new, |a| format!(" (account {a})"));
    let warnings = report.failures().count();
    if warnings == 0 {
        println!("{SPARKLE} {user} is ready{account}");
    } else {
        println!(
            "{SPARKLE} {user} is ready{account}, {} with {warnings} warning(s)",
            style("finished").yellow()
        );
    }
}
