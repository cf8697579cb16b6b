//! `oauth2-loopback` binary.

// std
use std::process::ExitCode;
// crates.io
use clap::Parser;
// self
use oauth2_loopback::cli::{self, Cli};

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
	color_eyre::install()?;
	cli::load_env_file()?;
	cli::init_tracing();

	cli::run(Cli::parse()).await
}
