//! Command-line front end: argument parsing and the merge run behind `vocabmerge`.

use std::path::{Path, PathBuf};

use crate::config::{self, Settings};
use crate::merge::{MergeSession, MergeStatus};
use crate::vocabulary::Vocabulary;

/// How chatty the tool is on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "debug",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CliOptions {
    pub sources: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub verbosity: Verbosity,
    pub no_log_file: bool,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub output: PathBuf,
    pub sources: usize,
    pub words: usize,
}

/// Parse arguments (without the program name). `Ok(None)` means help was shown.
pub fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "-o" | "--out" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--out requires a value".to_string())?;
                options.output = Some(PathBuf::from(value));
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            "-v" | "--verbose" => options.verbosity = Verbosity::Verbose,
            "-q" | "--quiet" => options.verbosity = Verbosity::Quiet,
            "--no-log-file" => options.no_log_file = true,
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            source => options.sources.push(PathBuf::from(source)),
        }
        idx += 1;
    }

    if options.sources.is_empty() {
        return Err(format!("At least one vocabulary file is required\n\n{}", help_text()));
    }
    Ok(Some(options))
}

pub fn help_text() -> &'static str {
    "Usage: vocabmerge [options] <vocabulary.json>...\n\n\
Merges vocabulary files, keeping each word once and up to 3 captions per word.\n\
Relative inputs missing from the current folder are looked up in the folder\n\
of the previous merge.\n\n\
Options:\n  \
-o, --out <file>     Destination file (default: <output_dir>/<default_name>.json)\n  \
--config <file>      Settings file to use instead of the app directory\n  \
-v, --verbose        Log debug details to stderr\n  \
-q, --quiet          Only log errors and skip progress lines\n  \
--no-log-file        Do not write a log file for this run\n  \
-h, --help           Show this help"
}

/// Merge the requested sources and save the result.
///
/// `on_update` sees the session after every worker message. On success the
/// folder of the first source is remembered in the settings file.
pub fn run(
    options: &CliOptions,
    cwd: &Path,
    on_update: impl FnMut(&MergeSession),
) -> Result<MergeSummary, String> {
    let mut settings = match &options.config_path {
        Some(path) => config::load_from(path),
        None => config::load_or_default(),
    }
    .map_err(|err| err.to_string())?;

    let sources: Vec<PathBuf> = options
        .sources
        .iter()
        .map(|source| settings.resolve_source(cwd, source))
        .collect();
    let output = match &options.output {
        Some(output) => cwd.join(output),
        None => settings.default_output(cwd),
    };
    tracing::debug!("Merging {} file(s) into {}", sources.len(), output.display());

    let mut session = MergeSession::new();
    session
        .start(sources.clone(), output)
        .map_err(|err| err.to_string())?;
    session.wait(on_update);
    if let MergeStatus::Failed(message) = session.status() {
        return Err(message.clone());
    }
    let words = session.merged().map(Vocabulary::len).unwrap_or_default();
    let saved = session.save_result().map_err(|err| err.to_string())?;

    settings.remember_sources(&sources);
    save_settings(&settings, options.config_path.as_deref());
    Ok(MergeSummary {
        output: saved,
        sources: sources.len(),
        words,
    })
}

fn save_settings(settings: &Settings, config_path: Option<&Path>) {
    let result = match config_path {
        Some(path) => config::save_to_path(settings, path),
        None => config::save(settings),
    };
    if let Err(err) = result {
        tracing::warn!("Failed to save settings: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_sources_and_output() {
        let options = parse_args(args(&["a.json", "--out", "m.json", "b.json"]))
            .unwrap()
            .unwrap();
        assert_eq!(options.sources, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(options.output, Some(PathBuf::from("m.json")));
        assert!(options.config_path.is_none());
        assert_eq!(options.verbosity, Verbosity::Normal);
        assert!(!options.no_log_file);
    }

    #[test]
    fn verbosity_flags_pick_the_filter() {
        let verbose = parse_args(args(&["-v", "a.json"])).unwrap().unwrap();
        assert_eq!(verbose.verbosity.default_filter(), "debug");
        let quiet = parse_args(args(&["a.json", "--quiet", "--no-log-file"]))
            .unwrap()
            .unwrap();
        assert_eq!(quiet.verbosity, Verbosity::Quiet);
        assert_eq!(quiet.verbosity.default_filter(), "error");
        assert!(quiet.no_log_file);
        assert_eq!(Verbosity::default().default_filter(), "warn");
    }

    #[test]
    fn help_returns_none() {
        assert!(parse_args(args(&["--help"])).unwrap().is_none());
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        assert!(parse_args(args(&["a.json", "--out"])).is_err());
        assert!(parse_args(args(&["a.json", "--config"])).is_err());
        assert!(parse_args(args(&["a.json", "--force"])).is_err());
        assert!(parse_args(args(&["--out", "m.json"])).is_err());
    }
}
