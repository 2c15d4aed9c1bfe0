mod common;

use authjs_cosmosdb::CosmosAdapterOptions;
use authjs_test_utils::run_basic_tests;

use common::{memory_adapter, memory_adapter_with, RawDatabase};

#[tokio::test]
async fn test_basic_suite() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let stats = run_basic_tests(&adapter, &RawDatabase::new(&store)).await?;
    assert_eq!(stats.test_count(), 13);
    Ok(())
}

#[tokio::test]
async fn test_basic_suite_without_etag_checks() -> anyhow::Result<()> {
    let (store, adapter) =
        memory_adapter_with(CosmosAdapterOptions::new().optimistic_concurrency(false));
    run_basic_tests(&adapter, &RawDatabase::new(&store)).await?;
    Ok(())
}

#[tokio::test]
async fn test_basic_suite_in_custom_database() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter_with(CosmosAdapterOptions::new().database_id("authTest"));
    run_basic_tests(&adapter, &RawDatabase::with_database(&store, "authTest")).await?;
    assert!(!store.container_exists("auth", "users").await);
    Ok(())
}

#[tokio::test]
async fn test_basic_suite_after_warm_up() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    adapter.warm_up().await?;
    let provisioned = store.provisioning_calls().await;

    run_basic_tests(&adapter, &RawDatabase::new(&store)).await?;
    assert_eq!(store.provisioning_calls().await, provisioned);
    Ok(())
}

#[tokio::test]
async fn test_basic_suite_twice_on_one_store() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let db = RawDatabase::new(&store);
    run_basic_tests(&adapter, &db).await?;
    run_basic_tests(&adapter, &db).await?;
    Ok(())
}
