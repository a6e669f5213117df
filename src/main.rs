use repropack::cli::commands::{CliArgs, Commands};
use repropack::cli::handlers::{
    handle_build, handle_diff, handle_package, handle_render, handle_scan, handle_trace,
};
use repropack::util::{init_logging, parse_level, LoggingConfig};
use repropack::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("repropack v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let storage_dir = args.storage_dir.as_deref();
    let exit_code = match &args.command {
        Commands::Scan(scan_args) => handle_scan(scan_args),
        Commands::Render(render_args) => handle_render(render_args, storage_dir).await,
        Commands::Trace(trace_args) => handle_trace(trace_args, storage_dir).await,
        Commands::Diff(diff_args) => handle_diff(diff_args, storage_dir).await,
        Commands::Build(build_args) => handle_build(build_args, storage_dir).await,
        Commands::Package(package_args) => handle_package(package_args, storage_dir).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        env::var("REPROPACK_LOG_LEVEL")
            .map(|s| parse_level(&s))
            .unwrap_or(Level::INFO)
    };

    let json = env::var("REPROPACK_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(if json {
        LoggingConfig::json(level)
    } else {
        LoggingConfig::with_level(level)
    });
}
