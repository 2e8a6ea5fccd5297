use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    chatrelay_server::run().await
}
