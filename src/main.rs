use vigia::cli;
use vigia::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cli::Cli::run().await
}
