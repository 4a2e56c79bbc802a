//! Example: Lease locks in a single process
//!
//! Run with: `cargo run --example memory_lock`
//!
//! Uses the in-memory store, so nothing external is required. Shows a lease
//! running out and being taken over without a release.

use std::time::Duration;

use lease_lock::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let manager = LockManager::new(MemoryLockStore::new());
    let spec = LockSpec::builder()
        .tokens(["tenant", "42", "invoices"])
        .lease_duration(Duration::from_millis(300))
        .build()?;

    let abandoned = manager
        .try_acquire(&spec)
        .await?
        .ok_or("fresh lock should be free")?;
    println!("acquired {} and never released it", abandoned.resource_key);

    println!("second attempt while held: {:?}", manager.acquire(&spec).await.is_some());

    tokio::time::sleep(Duration::from_millis(400)).await;
    let taken_over = manager
        .try_acquire(&spec)
        .await?
        .ok_or("expired lock should be acquirable")?;
    println!(
        "took over after expiry, token {} -> {}",
        abandoned.concurrency_token.value(),
        taken_over.concurrency_token.value()
    );

    // The first holder can no longer release it.
    println!(
        "stale release applied: {}",
        manager.release(&abandoned).await.is_some()
    );
    manager.release(&taken_over).await;

    let total = manager
        .get_guarded(&spec, || async { Ok::<_, std::io::Error>(21 * 2) })
        .await;
    println!("guarded result: {total:?}");

    Ok(())
}
