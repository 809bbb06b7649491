#![deny(warnings)]

use persistence::{default_sqlite_url, init_db, RoundStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    let pool = init_db(&url).await?;
    // Sanity: the table answers queries
    let store = SqliteStore::new(pool);
    let probe = store.pull_latest("default_room").await?;
    println!(
        "DB migrated at {} | default_room latest round: {}",
        url,
        probe.map(|d| d.round_id.to_string()).unwrap_or_else(|| "none".into())
    );
    Ok(())
}
