pub mod vocab_env;
pub mod vocab_files;
