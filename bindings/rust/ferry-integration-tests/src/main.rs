//! Ferry Integration Tests
//!
//! Exercises a running Ferry server through the ferry-client library.
//!
//! Set `FERRY_SERVER_URL` to point at the server. Set `FERRY_EXPECT_TTL_SECS`
//! to the server's `FERRY_TTL_SECS` to also check expiry; keep it short.

use anyhow::Result;
use ferry_client::{FerryClient, FerryClientOptions};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry_integration_tests=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let options = FerryClientOptions::from_env();

    tracing::info!("🧪 Ferry Integration Tests");
    tracing::info!("   Server: {}", options.url);
    println!();

    test_basic_operations().await?;
    test_replacement().await?;
    test_empty_content_is_not_a_miss().await?;
    test_entries_outlive_connection().await?;
    test_parallel_store_fetch().await?;
    test_data_isolation().await?;
    test_expiration().await?;

    println!();
    tracing::info!("✅ All tests passed!");

    Ok(())
}

/// Create a client from environment configuration
async fn create_client() -> Result<FerryClient> {
    let client = FerryClient::with_options(FerryClientOptions::from_env()).await?;
    Ok(client)
}

/// Test the assigned identifier and basic STORE/FETCH
async fn test_basic_operations() -> Result<()> {
    tracing::info!("Test: Basic Operations");

    let producer = create_client().await?;
    let identifier = producer.identifier().to_string();
    assert_eq!(identifier.split('-').count(), 3, "identifier should look like adjective-noun-NN");
    tracing::info!("   ASSIGNED {}", identifier);

    // The assigned identifier may collide with a previous run, so use a unique one
    let key = format!("basic-test-{}", uuid::Uuid::new_v4());
    producer.store(&key, "hello world").await?;

    let consumer = create_client().await?;
    let result = consumer.fetch(&key).await?;
    assert_eq!(result.as_deref(), Some("hello world"), "Content should match");
    tracing::info!("   FETCH {} → {:?}", key, result);

    let missing = format!("never-stored-{}", uuid::Uuid::new_v4());
    assert!(consumer.fetch(&missing).await?.is_none(), "Unknown identifier should miss");
    tracing::info!("   FETCH {} → not found (as expected)", missing);

    tracing::info!("   ✓ Basic operations work correctly");
    Ok(())
}

/// Test that a second store replaces the first
async fn test_replacement() -> Result<()> {
    tracing::info!("Test: Replacement");

    let client = create_client().await?;
    let key = format!("replace-test-{}", uuid::Uuid::new_v4());

    client.store(&key, "a").await?;
    client.store(&key, "b").await?;

    let fetched = client
        .fetch_entry(&key)
        .await?
        .ok_or_else(|| anyhow::anyhow!("entry {} should exist", key))?;
    assert_eq!(fetched.content, "b", "Last write should win");
    tracing::info!("   FETCH {} → {:?} (expires in {:?})", key, fetched.content, fetched.expires_in);

    tracing::info!("   ✓ Replacement works correctly");
    Ok(())
}

/// Test that stored empty content is a hit, not a miss
async fn test_empty_content_is_not_a_miss() -> Result<()> {
    tracing::info!("Test: Empty Content");

    let client = create_client().await?;
    let key = format!("empty-test-{}", uuid::Uuid::new_v4());

    client.store(&key, "").await?;
    assert_eq!(client.fetch(&key).await?, Some(String::new()));

    tracing::info!("   ✓ Empty content is distinguishable from not found");
    Ok(())
}

/// Test that entries survive the producer disconnecting
async fn test_entries_outlive_connection() -> Result<()> {
    tracing::info!("Test: Entries Outlive Connection");

    let producer = create_client().await?;
    let key = format!("outlive-test-{}", uuid::Uuid::new_v4());
    producer.store(&key, "still here").await?;
    // Round trip so the store is applied before we disconnect
    producer.fetch(&key).await?;
    producer.close().await?;

    let consumer = create_client().await?;
    assert_eq!(consumer.fetch(&key).await?.as_deref(), Some("still here"));

    tracing::info!("   ✓ Entry survived producer disconnect");
    Ok(())
}

/// Test parallel STORE and FETCH operations - verify no data mixing
async fn test_parallel_store_fetch() -> Result<()> {
    tracing::info!("Test: Parallel STORE/FETCH (200 concurrent clients)");

    let num_operations = 200;
    let start = Instant::now();

    let test_data: Vec<(String, String)> = (0..num_operations)
        .map(|i| {
            let key = format!("parallel-test-{}-{}", i, uuid::Uuid::new_v4());
            let value = format!("value-{}-{}", i, uuid::Uuid::new_v4());
            (key, value)
        })
        .collect();

    let store_futures: Vec<_> = test_data
        .iter()
        .map(|(key, value)| {
            let key = key.clone();
            let value = value.clone();
            async move {
                let client = create_client().await?;
                client.store(&key, value).await?;
                // Wait for the server to have applied the store
                client.fetch(&key).await?;
                Ok::<_, anyhow::Error>(())
            }
        })
        .collect();

    join_all(store_futures)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let store_elapsed = start.elapsed();
    tracing::info!("   STORE {} entries in {:?}", num_operations, store_elapsed);

    let fetch_start = Instant::now();
    let errors = Arc::new(AtomicUsize::new(0));

    let fetch_futures: Vec<_> = test_data
        .iter()
        .map(|(key, expected_value)| {
            let key = key.clone();
            let expected_value = expected_value.clone();
            let errors = Arc::clone(&errors);
            async move {
                let client = create_client().await?;
                let result = client.fetch(&key).await?;

                if result.as_deref() != Some(expected_value.as_str()) {
                    tracing::error!(
                        "Content mismatch for {}: expected '{}', got '{:?}'",
                        key,
                        expected_value,
                        result
                    );
                    errors.fetch_add(1, Ordering::SeqCst);
                }

                Ok::<_, anyhow::Error>(())
            }
        })
        .collect();

    join_all(fetch_futures)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let fetch_elapsed = fetch_start.elapsed();
    let error_count = errors.load(Ordering::SeqCst);

    tracing::info!("   FETCH {} entries in {:?}", num_operations, fetch_elapsed);
    assert_eq!(error_count, 0, "No errors should occur");
    tracing::info!("   ✓ All {} entries verified correctly", num_operations);

    Ok(())
}

/// Test that concurrent clients storing to different identifiers don't interfere
async fn test_data_isolation() -> Result<()> {
    tracing::info!("Test: Data Isolation (concurrent writes to different identifiers)");

    let num_clients = 20;
    let ops_per_client = 20;
    let semaphore = Arc::new(Semaphore::new(10));

    let results = Arc::new(tokio::sync::Mutex::new(HashMap::new()));

    let client_futures: Vec<_> = (0..num_clients)
        .map(|client_id| {
            let results = Arc::clone(&results);
            let semaphore = Arc::clone(&semaphore);

            async move {
                let _permit = semaphore.acquire().await?;
                let client = create_client().await?;

                for op in 0..ops_per_client {
                    let key = format!("isolation-client{}-op{}-{}", client_id, op, uuid::Uuid::new_v4());
                    let value = format!("client{}-value{}", client_id, op);

                    {
                        let mut r = results.lock().await;
                        r.insert(key.clone(), value.clone());
                    }

                    client.store(&key, value).await?;
                }
                // Flush: the reply comes after every earlier store on this socket
                client.fetch(client.identifier()).await?;

                Ok::<_, anyhow::Error>(())
            }
        })
        .collect();

    join_all(client_futures)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let expected = results.lock().await;
    let client = create_client().await?;
    let mut errors = 0;

    for (key, expected_value) in expected.iter() {
        let result = client.fetch(key).await?;
        if result.as_deref() != Some(expected_value.as_str()) {
            tracing::error!(
                "Isolation failure: identifier={}, expected={}, got={:?}",
                key,
                expected_value,
                result
            );
            errors += 1;
        }
    }

    assert_eq!(errors, 0, "No isolation failures should occur");
    tracing::info!("   ✓ {} entries verified, no cross-contamination", expected.len());

    Ok(())
}

/// Test TTL expiration (only when the server runs with a short TTL)
async fn test_expiration() -> Result<()> {
    tracing::info!("Test: TTL Expiration");

    let Some(ttl_secs) = std::env::var("FERRY_EXPECT_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
    else {
        tracing::info!("   Skipped (set FERRY_EXPECT_TTL_SECS to the server's TTL to run it)");
        return Ok(());
    };

    let client = create_client().await?;
    let key = format!("expire-test-{}", uuid::Uuid::new_v4());

    client.store(&key, "temporary").await?;
    assert!(client.fetch(&key).await?.is_some(), "Entry should exist immediately");
    tracing::info!("   STORE {} with server TTL={}s", key, ttl_secs);

    tracing::info!("   Waiting {}s for expiration...", ttl_secs + 1);
    tokio::time::sleep(Duration::from_secs(ttl_secs + 1)).await;

    assert!(client.fetch(&key).await?.is_none(), "Entry should be expired after TTL");
    // A miss stays a miss
    assert!(client.fetch(&key).await?.is_none());

    tracing::info!("   ✓ TTL expiration works correctly");
    Ok(())
}
