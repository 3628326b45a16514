//! QuoteFlow operator CLI.
//!
//! # Responsibility
//! - Run the store self-tests against a disposable or configured database.
//! - Check a quote request file against the form rules.
//! - Print the core version.

use clap::{Parser, Subcommand};
use log::error;
use quoteflow_core::{
    core_version, init_from_config, load_config, open_with_config, run_all, validate_form,
    verify_auth_role, AuthUser, Caller, CreateQuoteRequest, LogNotifier, Notifier, Session,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

/// QuoteFlow quoting back office tools.
#[derive(Parser, Debug)]
#[command(name = "quoteflow", version, about, long_about = None)]
struct Cli {
    /// SQLite database file. Defaults to a disposable in-memory store.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every store self-test and print one line per test.
    SelfTest {
        /// Role the operator session runs with.
        #[arg(long, default_value = "admin")]
        role: String,
    },
    /// Validate a quote request JSON file without touching the store.
    Check {
        /// Quote with optional nested `spaces[].items[]`.
        file: PathBuf,
    },
    /// Print the core version.
    Version,
}

/// Prints violations for the operator and records them in the log.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn show_error(&self, message: &str) {
        eprintln!("{message}");
        LogNotifier.show_error(message);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("quoteflow_core version={}", core_version());
            ExitCode::SUCCESS
        }
        Commands::SelfTest { ref role } => exit_code(self_test(&cli, role)),
        Commands::Check { ref file } => exit_code(check_quote_file(&cli, file, &StderrNotifier)),
    }
}

fn exit_code(outcome: Result<bool, String>) -> ExitCode {
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(message) => {
            eprintln!("quoteflow: {message}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the file holds a valid quote request.
fn check_quote_file(cli: &Cli, file: &Path, notifier: &impl Notifier) -> Result<bool, String> {
    let config = load_config(cli.config.as_deref()).map_err(|err| err.to_string())?;
    init_from_config(&config.logging)?;

    let text = std::fs::read_to_string(file)
        .map_err(|err| format!("failed to read `{}`: {err}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|err| format!("`{}` is not JSON: {err}", file.display()))?;

    match validate_form::<CreateQuoteRequest>(&value, notifier) {
        Some(request) => {
            let items: usize = request.spaces.iter().map(|space| space.items.len()).sum();
            println!(
                "ok    quote with {} space(s), {items} item(s)",
                request.spaces.len()
            );
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Returns whether every self-test passed.
fn self_test(cli: &Cli, role: &str) -> Result<bool, String> {
    let mut config = load_config(cli.config.as_deref()).map_err(|err| err.to_string())?;
    if let Some(db) = &cli.db {
        config.database.path = Some(db.display().to_string());
    }
    init_from_config(&config.logging)?;

    let session = Session::new(AuthUser::new(Uuid::new_v4()).with_role(role));
    let verification = verify_auth_role(&session);
    if let Some(message) = verification.error() {
        return Err(message.to_string());
    }

    let conn = open_with_config(&config.database).map_err(|err| {
        error!("event=cli_self_test module=cli status=error error={err}");
        err.to_string()
    })?;

    let reports = run_all(&conn, &Caller::from(&session));
    for named in &reports {
        match &named.report.error {
            None => println!("ok    {}", named.name),
            Some(message) => println!("FAIL  {}: {message}", named.name),
        }
    }
    Ok(reports.iter().all(|named| named.report.success))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn self_test_passes_on_in_memory_store() {
        let cli = Cli::parse_from(["quoteflow", "self-test"]);
        assert_eq!(self_test(&cli, "admin"), Ok(true));
    }

    #[derive(Default)]
    struct Collected(std::cell::RefCell<Vec<String>>);

    impl Notifier for Collected {
        fn show_error(&self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    fn write_request(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("quote.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn check_accepts_a_valid_quote_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(
            &dir,
            r#"{
                "client_name": "Acme",
                "email": "orders@acme.test",
                "phone": "555",
                "project_name": "Loft",
                "installation_address": "1 Main St",
                "total": 2500,
                "spaces": [{"name": "Kitchen", "items": [{
                    "product_id": "p-1", "material": "oak",
                    "width": 60, "height": 90, "depth": 40, "price": 300
                }]}]
            }"#,
        );
        let cli = Cli::parse_from(["quoteflow", "check", path.to_str().unwrap()]);
        let notifier = Collected::default();

        assert_eq!(check_quote_file(&cli, &path, &notifier), Ok(true));
        assert!(notifier.0.borrow().is_empty());
    }

    #[test]
    fn check_reports_violations_through_the_notifier() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(
            &dir,
            r#"{
                "client_name": "Acme",
                "email": "not-an-email",
                "phone": "555",
                "project_name": "Loft",
                "installation_address": "1 Main St",
                "total": 2500
            }"#,
        );
        let cli = Cli::parse_from(["quoteflow", "check", path.to_str().unwrap()]);
        let notifier = Collected::default();

        assert_eq!(check_quote_file(&cli, &path, &notifier), Ok(false));
        assert_eq!(*notifier.0.borrow(), vec!["email: Invalid email address".to_string()]);
    }

    #[test]
    fn check_rejects_files_that_are_not_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_request(&dir, "client_name = 'Acme'");
        let cli = Cli::parse_from(["quoteflow", "check", path.to_str().unwrap()]);

        let error = check_quote_file(&cli, &path, &Collected::default()).unwrap_err();
        assert!(error.contains("is not JSON"));
    }

    #[test]
    fn self_test_rejects_unknown_roles() {
        let cli = Cli::parse_from(["quoteflow", "self-test", "--role", "guest"]);
        assert_eq!(
            self_test(&cli, "guest"),
            Err("Invalid or missing role".to_string())
        );
    }
}
