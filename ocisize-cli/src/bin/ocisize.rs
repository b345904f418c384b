use clap::Parser;
use ocisize::{config::Config, distribution::UreqTransport};
use ocisize_cli::cli::{self, Opt};
use std::{io, process::ExitCode};

fn main() -> ExitCode {
    let opt = Opt::parse();
    env_logger::Builder::new()
        .filter_level(if opt.quiet {
            log::LevelFilter::Off
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let config = Config::from_env();
    let transport = UreqTransport::new(&config);
    let code = cli::run(
        &opt,
        &transport,
        &config,
        &mut io::stdout(),
        &mut io::stderr(),
    );
    ExitCode::from(code)
}
