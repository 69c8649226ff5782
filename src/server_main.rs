use anyhow::Result;

use tubenotes::app::serve;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    serve().await
}
