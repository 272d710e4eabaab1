use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    slidesmith_cli::run_cli().await
}
