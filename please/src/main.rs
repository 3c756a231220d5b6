#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod commands;
mod telemetry;

use args::{Args, CallArgs, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    telemetry::init();

    match args.command {
        Command::Index(index_args) => commands::index::run(index_args).await,
        Command::Search(search_args) => commands::search::run(search_args).await,
        Command::Call(call_args) => commands::call::run(call_args).await,
        Command::Serve(serve_args) => commands::serve::run(serve_args).await,
        Command::Mcp { command } => commands::mcp::run(command).await,
        Command::Install(install_args) => commands::install::run(&install_args),
        Command::Direct(rest) => {
            // `please <server__tool> --args ...` is shorthand for `call`
            let argv = std::iter::once("call".to_string()).chain(rest);
            let call_args = CallArgs::try_parse_from(argv)?;
            commands::call::run(call_args).await
        }
    }
}
