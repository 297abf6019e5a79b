//! devbundle - bundle CommonJS modules on request during development.

use clap::Parser;
use devbundle_cli::{cli, commands, error, logger, ui};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors(args.no_color);

    let result = match args.command {
        cli::Command::Serve(serve_args) => commands::serve_execute(serve_args).await,
        cli::Command::Bundle(bundle_args) => commands::bundle_execute(bundle_args).await,
    };

    result.map_err(error::cli_error_to_miette)
}
