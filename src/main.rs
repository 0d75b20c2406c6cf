// Stock Watchlist API server

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stock_watchlist::run().await
}
