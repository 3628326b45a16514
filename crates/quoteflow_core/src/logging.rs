//! Rolling file logs for the quoting core.
//!
//! Every line is a single `event=<name> module=<module> status=<status>`
//! record followed by ids, counts or error text. Events emitted by the crate:
//! `logging_init`, `db_open`, `db_migrate`, `auth_verify`, `quote_create`,
//! `order_create`, `receipt_create`, `receipt_update`, `self_test`,
//! `notify_error`, `cli_self_test`, `panic_captured`.
//!
//! Client names, emails, phone numbers and installation addresses never
//! appear in a log line. Panic payloads may quote them, so they are scrubbed
//! of email addresses and flattened before being written.
//!
//! # Invariants
//! - The logger starts at most once per process; later calls must ask for
//!   the same level and directory.
//! - Initialization never panics.

use crate::config::LoggingConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "quoteflow";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;
const EMAIL_PLACEHOLDER: &str = "<email>";

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();
static EMAIL_IN_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+")
        .expect("valid email scrub regex")
});

/// Level and directory a logger writes with.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogTarget {
    level: &'static str,
    dir: PathBuf,
}

impl LogTarget {
    fn parse(level: &str, dir: &str) -> Result<Self, String> {
        Ok(Self {
            level: normalize_level(level)?,
            dir: normalize_log_dir(dir)?,
        })
    }

    /// Describes why `self` cannot replace the already running `active` target.
    fn conflict_with(&self, active: &LogTarget) -> Option<String> {
        if self.dir != active.dir {
            Some(format!(
                "logging already initialized at `{}`; refusing to switch to `{}`",
                active.dir.display(),
                self.dir.display()
            ))
        } else if self.level != active.level {
            Some(format!(
                "logging already initialized with level `{}`; refusing to switch to `{}`",
                active.level, self.level
            ))
        } else {
            None
        }
    }
}

struct ActiveLogger {
    target: LogTarget,
    _handle: LoggerHandle,
}

/// Starts rolling file logs at `log_dir` with `level`.
///
/// Repeating the call with the same arguments is a no-op.
///
/// # Errors
/// - `level` is not one of `trace|debug|info|warn|error`.
/// - `log_dir` is empty, relative, or cannot be created.
/// - A logger is already running with a different level or directory.
/// - The logger backend fails to start.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let target = LogTarget::parse(level, log_dir)?;
    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(&target))?;
    match target.conflict_with(&active.target) {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}

/// Initializes logging from the `[logging]` config section.
///
/// Returns `Ok(false)` without touching the logger when no directory is
/// configured, `Ok(true)` once file logging is active.
pub fn init_from_config(config: &LoggingConfig) -> Result<bool, String> {
    match config.dir.as_deref() {
        Some(dir) => init_logging(&config.level, dir).map(|()| true),
        None => {
            normalize_level(&config.level)?;
            Ok(false)
        }
    }
}

/// Returns `(level, log_dir)` of the running logger, if any.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.target.level, active.target.dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(target: &LogTarget) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&target.dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            target.dir.display()
        )
    })?;

    let handle = Logger::try_with_str(target.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", target.level))?
        .log_to_file(
            FileSpec::default()
                .directory(target.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook_once();

    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} version={} build={}",
        target.level,
        target.dir.display(),
        env!("CARGO_PKG_VERSION"),
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );

    Ok(ActiveLogger {
        target: target.clone(),
        _handle: handle,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            scrub_payload(message, MAX_PANIC_PAYLOAD_CHARS)
        } else if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            scrub_payload(message, MAX_PANIC_PAYLOAD_CHARS)
        } else {
            "non-string panic payload".to_string()
        };
        error!("event=panic_captured module=logging status=error location={location} payload={payload}");
        previous_hook(panic_info);
    }));
}

/// Masks email addresses, flattens to one line and caps at `max_chars`.
fn scrub_payload(value: &str, max_chars: usize) -> String {
    let masked = EMAIL_IN_TEXT_RE.replace_all(value, EMAIL_PLACEHOLDER);
    let flattened = masked.replace(['\n', '\r'], " ");
    let mut scrubbed = flattened.chars().take(max_chars).collect::<String>();
    if flattened.chars().count() > max_chars {
        scrubbed.push_str("...");
    }
    scrubbed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_string(dir: &tempfile::TempDir) -> String {
        dir.path()
            .to_str()
            .expect("temp dir should be valid UTF-8")
            .to_string()
    }

    #[test]
    fn target_parsing_normalizes_level_and_requires_absolute_dir() {
        let root = std::env::temp_dir();
        let target = LogTarget::parse(" Warning ", root.to_str().unwrap()).unwrap();
        assert_eq!(target.level, "warn");
        assert_eq!(target.dir, root);

        let error = LogTarget::parse("info", "logs/dev").unwrap_err();
        assert!(error.contains("absolute"));
        assert!(LogTarget::parse("chatty", root.to_str().unwrap()).is_err());
    }

    #[test]
    fn conflicting_targets_name_what_changed() {
        let active = LogTarget {
            level: "info",
            dir: PathBuf::from("/var/log/quoteflow"),
        };
        assert_eq!(active.conflict_with(&active.clone()), None);

        let louder = LogTarget {
            level: "debug",
            ..active.clone()
        };
        assert!(louder
            .conflict_with(&active)
            .unwrap()
            .contains("with level `info`"));

        let moved = LogTarget {
            dir: PathBuf::from("/tmp/quoteflow"),
            ..active.clone()
        };
        assert!(moved
            .conflict_with(&active)
            .unwrap()
            .contains("at `/var/log/quoteflow`"));
    }

    #[test]
    fn panic_payloads_lose_emails_and_newlines() {
        let scrubbed = scrub_payload("bad quote for jane.doe@acme.test\nline two", 200);
        assert_eq!(scrubbed, "bad quote for <email> line two");

        let truncated = scrub_payload("client: Acme\r\naddress: 1 Main St", 8);
        assert_eq!(truncated, "client: ...");
    }

    #[test]
    fn config_without_dir_leaves_logger_untouched() {
        let config = LoggingConfig {
            level: "info".to_string(),
            dir: None,
        };
        assert_eq!(init_from_config(&config), Ok(false));

        let bad_level = LoggingConfig {
            level: "chatty".to_string(),
            dir: None,
        };
        assert!(init_from_config(&bad_level)
            .expect_err("unknown level should fail")
            .contains("unsupported log level"));
    }

    #[test]
    fn init_logging_is_idempotent_for_same_target_and_rejects_conflicts() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");
        let first_dir = dir_string(&first);
        let second_dir = dir_string(&second);

        init_logging("info", &first_dir).expect("first init should succeed");
        init_logging("info", &first_dir).expect("same target should be idempotent");

        let level_error =
            init_logging("debug", &first_dir).expect_err("level conflict should fail");
        assert!(level_error.contains("refusing to switch"));

        let dir_error =
            init_logging("info", &second_dir).expect_err("directory conflict should fail");
        assert!(dir_error.contains("refusing to switch"));

        let (active_level, active_dir) = logging_status().expect("logging should be active");
        assert_eq!(active_level, "info");
        assert_eq!(active_dir, first.path());
    }
}
