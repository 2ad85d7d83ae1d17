//! `vocabmerge`: merge vocabulary files into one.

use vocabmerge::cli::{self, CliOptions, Verbosity};
use vocabmerge::logging::{self, LogConfig};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = cli::parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    init_logging(&options);
    let cwd = std::env::current_dir()
        .map_err(|err| format!("Failed to resolve working directory: {err}"))?;

    let show_progress = options.verbosity != Verbosity::Quiet;
    let mut last_file = String::new();
    let summary = cli::run(&options, &cwd, |session| {
        let Some(file) = session.current_file() else {
            return;
        };
        if show_progress && file != last_file {
            println!("Reading {file} ({} words so far)", session.running_total());
            last_file = file.to_string();
        }
    })?;

    println!(
        "Merged {} file(s) into {} ({} words).",
        summary.sources,
        summary.output.display(),
        summary.words
    );
    Ok(())
}

fn init_logging(options: &CliOptions) {
    let mut config = LogConfig::new(options.verbosity.default_filter());
    if options.no_log_file {
        config = config.without_file();
    }
    if let Err(err) = logging::init(&config) {
        if !config.log_file {
            eprintln!("Logging disabled: {err}");
            return;
        }
        eprintln!("Log file disabled: {err}");
        if let Err(err) = logging::init(&config.without_file()) {
            eprintln!("Logging disabled: {err}");
        }
    }
}
