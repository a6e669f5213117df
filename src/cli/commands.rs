use crate::document::DocumentId;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Reproducibility packages for R Markdown documents
#[derive(Parser, Debug)]
#[command(
    name = "repropack",
    about = "Reproducibility packages for R Markdown documents",
    version,
    author,
    long_about = "repropack flags reproducibility hazards in R Markdown documents, renders \
                  them locally and under a dependency tracer, and packages the resulting \
                  Dockerfile, Makefile and manifest for download."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Artifact storage root (overrides REPROPACK_STORAGE_DIR)"
    )]
    pub storage_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Scan a document for reproducibility hazards",
        long_about = "Statically checks the code in a document for unseeded randomness, \
                      timestamps, absolute paths, downloads, installs, setwd, interactive \
                      calls and embedded secrets. No tool is run.\n\n\
                      Examples:\n  \
                      repropack scan analysis.Rmd\n  \
                      repropack scan analysis.Rmd --format json"
    )]
    Scan(ScanArgs),

    #[command(
        about = "Render a document on the host",
        long_about = "Renders the document with R and stores the HTML and a copy of the source.\n\n\
                      Examples:\n  \
                      repropack render 42 analysis.Rmd"
    )]
    Render(SourceArgs),

    #[command(
        about = "Trace a rendered document and generate its package",
        long_about = "Re-renders the stored source under r4r and stores the Dockerfile, \
                      Makefile, manifest, access archive and container render.\n\n\
                      Examples:\n  \
                      repropack trace 42"
    )]
    Trace(DocumentArgs),

    #[command(
        about = "Compare the local and container renders",
        long_about = "Runs r-diff over both renders and stores the semantic diff.\n\n\
                      Examples:\n  \
                      repropack diff 42"
    )]
    Diff(DocumentArgs),

    #[command(
        about = "Render and trace, skipping unchanged content",
        long_about = "Runs render then trace unless the content matches the last complete build.\n\n\
                      Examples:\n  \
                      repropack build 42 analysis.Rmd\n  \
                      repropack build 42 analysis.Rmd --format yaml"
    )]
    Build(SourceArgs),

    #[command(about = "Rebuild the downloadable zip for a document")]
    Package(DocumentArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ScanArgs {
    #[arg(value_name = "FILE", help = "R Markdown document")]
    pub file: PathBuf,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct SourceArgs {
    #[arg(value_name = "ID", help = "Document identifier")]
    pub id: DocumentId,

    #[arg(value_name = "FILE", help = "R Markdown document")]
    pub file: PathBuf,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct DocumentArgs {
    #[arg(value_name = "ID", help = "Document identifier")]
    pub id: DocumentId,

    #[arg(short = 'f', long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
