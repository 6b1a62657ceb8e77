//! Command-line options.
//!
//! Hand-rolled parser (no clap dependency) accepting both `--flag=value`
//! and `--flag value`. Invalid arguments print a diagnostic plus usage and
//! exit with code 10.

use std::fmt;
use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::repo::Limits;

/// Parsed daemon configuration.
#[derive(Clone, Debug)]
pub struct Options {
    pub num_threads: usize,
    pub limits: Limits,
    pub repo_ttl: Duration,
    pub lock_fd: Option<i32>,
    pub parent_pid: Option<i32>,
    pub log_level: LevelFilter,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get().max(1),
            limits: Limits::default(),
            repo_ttl: Duration::from_secs(3600),
            lock_fd: None,
            parent_pid: None,
            log_level: LevelFilter::INFO,
        }
    }
}

/// Argument rejection, reported before exiting with code 10.
#[derive(Debug)]
pub struct UsageError {
    pub message: String,
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UsageError {}

fn bad(message: impl Into<String>) -> UsageError {
    UsageError {
        message: message.into(),
    }
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, UsageError> {
    value
        .parse()
        .map_err(|_| bad(format!("invalid {flag} value: {value}")))
}

fn parse_level(value: &str) -> Result<LevelFilter, UsageError> {
    match value {
        "DEBUG" => Ok(LevelFilter::DEBUG),
        "INFO" => Ok(LevelFilter::INFO),
        "WARN" => Ok(LevelFilter::WARN),
        // There is no fatal level in the subscriber; both map to ERROR.
        "ERROR" | "FATAL" => Ok(LevelFilter::ERROR),
        _ => Err(bad(format!("invalid --log-level value: {value}"))),
    }
}

/// Parses arguments (exclusive of the program name).
pub fn parse_args<I>(args: I) -> Result<Options, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();

    fn next_value(
        args: &mut impl Iterator<Item = String>,
        flag: &str,
        inline: Option<String>,
    ) -> Result<String, UsageError> {
        match inline {
            Some(v) => Ok(v),
            None => args
                .next()
                .ok_or_else(|| bad(format!("{flag} requires a value"))),
        }
    }

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) => (f.to_owned(), Some(v.to_owned())),
            None => (arg, None),
        };
        match flag.as_str() {
            "--num-threads" => {
                let n: usize = parse_num(&flag, &next_value(&mut args, &flag, inline)?)?;
                if n == 0 {
                    return Err(bad("--num-threads must be positive"));
                }
                options.num_threads = n;
            }
            "--dirty-max-index-size" => {
                let v = next_value(&mut args, &flag, inline)?;
                options.limits.dirty_max_index_size = if v == "-1" {
                    u64::MAX
                } else {
                    parse_num(&flag, &v)?
                };
            }
            "--max-num-staged" => {
                options.limits.max_staged =
                    parse_num(&flag, &next_value(&mut args, &flag, inline)?)?;
            }
            "--max-num-unstaged" => {
                options.limits.max_unstaged =
                    parse_num(&flag, &next_value(&mut args, &flag, inline)?)?;
            }
            "--max-num-conflicted" => {
                options.limits.max_conflicted =
                    parse_num(&flag, &next_value(&mut args, &flag, inline)?)?;
            }
            "--max-num-untracked" => {
                options.limits.max_untracked =
                    parse_num(&flag, &next_value(&mut args, &flag, inline)?)?;
            }
            "--recurse-untracked-dirs" => options.limits.recurse_untracked_dirs = true,
            "--ignore-status-show-untracked-files" => {
                options.limits.respect_status_show_untracked = false;
            }
            "--ignore-bash-show-untracked-files" => {
                options.limits.respect_bash_show_untracked = false;
            }
            "--ignore-bash-show-dirty-state" => {
                options.limits.respect_bash_show_dirty = false;
            }
            "--repo-ttl-seconds" => {
                let secs: u64 = parse_num(&flag, &next_value(&mut args, &flag, inline)?)?;
                options.repo_ttl = Duration::from_secs(secs);
            }
            "--lock-fd" => {
                options.lock_fd = Some(parse_num(&flag, &next_value(&mut args, &flag, inline)?)?);
            }
            "--parent-pid" => {
                options.parent_pid =
                    Some(parse_num(&flag, &next_value(&mut args, &flag, inline)?)?);
            }
            "--log-level" => {
                options.log_level = parse_level(&next_value(&mut args, &flag, inline)?)?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(bad(format!("unknown flag: {other}"))),
        }
    }
    Ok(options)
}

/// Prints the usage summary to stderr.
pub fn print_usage() {
    eprintln!(
        "usage: treestatusd [OPTIONS]

Reads requests (id \\x1f absolute-dir [\\x1f 1] \\x1e) from stdin and writes
one status record per request to stdout.

OPTIONS:
    --num-threads=<N>                     Scan worker threads (default: CPU count)
    --dirty-max-index-size=<N>            Skip workdir scans above this index size (-1: unlimited)
    --max-num-staged=<N>                  Cap on reported staged changes (default: 1)
    --max-num-unstaged=<N>                Cap on reported unstaged changes (default: 1)
    --max-num-conflicted=<N>              Cap on reported conflicts (default: 1)
    --max-num-untracked=<N>               Cap on reported untracked files (default: 1)
    --recurse-untracked-dirs              Count files inside untracked directories
    --ignore-status-show-untracked-files  Ignore status.showUntrackedFiles from config
    --ignore-bash-show-untracked-files    Ignore bash.showUntrackedFiles from config
    --ignore-bash-show-dirty-state        Ignore bash.showDirtyState from config
    --repo-ttl-seconds=<N>                Evict idle repositories after N seconds (default: 3600)
    --lock-fd=<N>                         Exit when the exclusive lock on this fd is released
    --parent-pid=<N>                      Exit when this process disappears
    --log-level=<LEVEL>                   DEBUG, INFO, WARN, ERROR or FATAL (default: INFO)
    --help, -h                            Show this help"
    );
}
