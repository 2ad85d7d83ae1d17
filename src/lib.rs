//! Vocabulary merging: deduplicate words across vocabulary files and carry
//! their subtitle captions along with provenance.
/// Application directory resolution.
pub mod app_dirs;
/// Argument parsing and the merge run behind the binary.
pub mod cli;
/// Crash-safe file writes.
mod atomic_file;
/// Persisted user settings.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// The vocabulary merger, its worker and session controller.
pub mod merge;
/// Vocabulary data model and file store.
pub mod vocabulary;
