use anyhow::Result;
use oracledb_agent::cli::{actions, start};

#[tokio::main]
async fn main() -> Result<()> {
    let action = start()?;

    actions::run::handle(action).await
}
