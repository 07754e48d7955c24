//! Puts more values than memory holds, then reads the evicted ones back from
//! disk.
//!
//! ```text
//! RUST_LOG=tiercache=debug cargo run --example basic_tiered
//! ```

use tiercache::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let root = std::env::temp_dir().join("tiercache-demo");
    let cache = CacheBuilder::new("DataCache")
        .root(&root)
        .memory_count_limit(3)
        .disk_count_limit(100)
        .build_data()?;

    for i in 0..6u8 {
        cache.save(vec![i; 4], format!("item-{i}"));
    }
    cache.tiered().flush().await?;

    println!(
        "memory holds {} entries; disk holds {:?}",
        cache.tiered().memory().len(),
        cache.tiered().disk().keys().await?
    );

    let restored = cache.get("item-0").await;
    println!("item-0 from disk: {restored:?}");

    cache.delete("item-1").await?;
    println!("item-1 after delete: {:?}", cache.get("item-1").await);

    println!("memory: {:?}", cache.tiered().memory().metrics());
    println!("disk:   {:?}", cache.tiered().disk().metrics());

    cache.delete_all().await?;
    cache.tiered().shutdown().await;
    Ok(())
}
