use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    codelore_cli::main_entry().await
}
