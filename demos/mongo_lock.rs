//! Example: Lease locks over MongoDB
//!
//! Run with: `cargo run --example mongo_lock`
//!
//! Reads `MONGODB_URI` (default `mongodb://localhost:27017`). Set
//! `RUST_LOG=lease_lock_core=debug` to watch the lock decisions.

use std::time::Duration;

use lease_lock::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let uri =
        std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

    let store = MongoLockStore::builder()
        .connection_string(&uri)
        .database_name("lease_lock_demo")
        .build()
        .await?;
    let manager = LockManager::builder(store)
        .default_lease_duration(Duration::from_secs(30))
        .build();

    let spec = LockSpec::builder()
        .token("master")
        .token("leader")
        .token("sync")
        .lease_duration(Duration::from_secs(10))
        .description("periodic leader sync")
        .build()?;

    // Two workers race; only one should run the job.
    let contender = manager.clone();
    let contender_spec = spec.clone();
    let (first, second) = tokio::join!(
        manager.run_guarded(&spec, || async {
            println!("worker A: syncing");
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, std::io::Error>(())
        }),
        contender.run_guarded(&contender_spec, || async {
            println!("worker B: syncing");
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, std::io::Error>(())
        }),
    );
    println!("worker A ran: {first:?}, worker B ran: {second:?}");

    // Manual acquire and release.
    match manager.try_acquire(&spec).await? {
        Some(lease) => {
            println!(
                "acquired {} (token {})",
                lease.resource_key,
                lease.concurrency_token.value()
            );
            if let Some(released) = manager.release(&lease).await {
                println!("released at {}", released.last_modified_at);
            }
        }
        None => println!("lock is held elsewhere"),
    }

    Ok(())
}
