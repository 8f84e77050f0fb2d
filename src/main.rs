use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use filer::{Config, Mode};

/// command line arguments.
///
/// `--help` is only recognised as the first argument. anywhere else, and for
/// any other spelling such as `-h`, it is just a file name.
#[derive(Parser, Debug)]
#[command(name = "filer", disable_help_flag = true)]
#[command(about = "Converts between png images and files", long_about = None)]
struct Cli {
	/// the file to be encoded. if its name ends in .png, it is treated as an
	/// encoded image and decoded instead
	#[arg(allow_hyphen_values = true)]
	source: PathBuf,

	/// the file the result will be stored in
	#[arg(allow_hyphen_values = true)]
	result: PathBuf,

	/// ignored
	#[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
	rest: Vec<OsString>,
}

/// `None` means usage was asked for.
fn parse_args<I, T>(args: I) -> Result<Option<Cli>, clap::Error>
where
	I: IntoIterator<Item = T>,
	T: Into<OsString> + Clone,
{
	let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
	if args.get(1).is_some_and(|arg| arg == "--help") {
		return Ok(None);
	}
	Cli::try_parse_from(args).map(Some)
}

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

	let cli = match parse_args(std::env::args_os()) {
		Ok(Some(cli)) => cli,
		Ok(None) => {
			Cli::command().print_help()?;
			return Ok(());
		}
		Err(e) => e.exit(),
	};
	if !cli.rest.is_empty() {
		log::debug!("ignoring {} extra arguments", cli.rest.len());
	}
	let config = Config::new(cli.source, cli.result);
	let verb = match config.mode() {
		Mode::Encode => "encode",
		Mode::Decode => "decode",
	};
	filer::run(&config)
		.with_context(|| format!("failed to {verb} {}", config.source().display()))
}
