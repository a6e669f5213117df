pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, DocumentArgs, OutputFormatArg, ScanArgs, SourceArgs};
pub use output::{OutputFormat, OutputFormatter};
