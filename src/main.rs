use anyhow::Result;

use omnik_tcp::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    omnik_tcp::app(options).await
}
