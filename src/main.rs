use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    catscrape::cli::run().await
}
