mod cli;
mod logging;
mod render;
mod tui;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    cli::run().await
}
