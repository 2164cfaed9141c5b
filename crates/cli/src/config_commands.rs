use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use chatdesk_config::{ChatdeskConfig, Severity, ValidationResult, validate_config};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

pub fn handle_config(
    action: ConfigAction,
    config: &ChatdeskConfig,
    explicit_path: Option<&Path>,
) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => {
            let mut result = validate_config(config);
            result.config_path = explicit_path
                .map(Path::to_path_buf)
                .or_else(chatdesk_config::find_config_file);
            let errors = report(&result, verbose);
            if errors > 0 {
                std::process::exit(1);
            }
            Ok(())
        },
    }
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print diagnostics to stderr and return the error count.
fn report(result: &ValidationResult, verbose: bool) -> usize {
    match result.config_path {
        Some(ref path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let mut shown = 0;
    for d in result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
    {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };
        eprintln!(
            "  {BOLD}{color}{}{RESET} [{}] {}: {}",
            d.severity, d.category, d.path, d.message
        );
        shown += 1;
    }
    if shown > 0 {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
    errors
}
