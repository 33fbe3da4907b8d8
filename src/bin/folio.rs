//! folio - browse a photo site and download folders as archives.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    folio_dl::cli::run(&args).await
}
