use api_starter::cli::parse_cli_commands;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    parse_cli_commands().await
}
