//! redb provider tests
//!
//! Document tables, record CRUD, merging updates and persistence across reopen

use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

use confgate_provider_redb::ProviderRedb;
use confgate_types::provider::Provider;
use confgate_types::types::Record;

async fn create_test_provider() -> (ProviderRedb, TempDir) {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	let provider = ProviderRedb::new(temp_dir.path()).await.expect("Failed to create provider");
	(provider, temp_dir)
}

fn record(value: Value) -> Record {
	match value {
		Value::Object(map) => map,
		_ => panic!("record must be an object"),
	}
}

#[tokio::test]
async fn test_table_lifecycle() {
	let (provider, _temp) = create_test_provider().await;

	assert!(!provider.has_table("guilds").await.expect("has_table"));
	assert!(provider.get_all("guilds").await.expect("get_all").is_empty());
	assert!(provider.get("guilds", "g1").await.expect("get").is_none());

	provider.create_table("guilds", None).await.expect("create_table");
	assert!(provider.has_table("guilds").await.expect("has_table"));
	assert!(!provider.has_table("users").await.expect("has_table"));
	assert!(!provider.caps().sql);
}

#[tokio::test]
async fn test_create_and_get() {
	let (provider, _temp) = create_test_provider().await;
	provider.create_table("guilds", None).await.expect("create_table");

	let defaults = record(json!({ "prefix": "!", "modRole": null, "disabledCommands": [] }));
	provider.create("guilds", "g1", &defaults).await.expect("create");

	let stored = provider.get("guilds", "g1").await.expect("get").expect("record");
	assert_eq!(
		Value::Object(stored),
		json!({ "id": "g1", "prefix": "!", "modRole": null, "disabledCommands": [] })
	);
}

#[tokio::test]
async fn test_update_merges_patch() {
	let (provider, _temp) = create_test_provider().await;
	provider.create_table("guilds", None).await.expect("create_table");
	provider
		.create("guilds", "g1", &record(json!({ "prefix": "!", "disabledCommands": [] })))
		.await
		.expect("create");

	provider
		.update("guilds", "g1", &record(json!({ "disabledCommands": ["ping", "help"] })))
		.await
		.expect("update");

	let stored = provider.get("guilds", "g1").await.expect("get").expect("record");
	assert_eq!(stored.get("prefix"), Some(&json!("!")));
	assert_eq!(stored.get("disabledCommands"), Some(&json!(["ping", "help"])));

	provider.update("guilds", "g2", &record(json!({ "prefix": "?" }))).await.expect("upsert");
	assert_eq!(provider.get_all("guilds").await.expect("get_all").len(), 2);
}

#[tokio::test]
async fn test_delete() {
	let (provider, _temp) = create_test_provider().await;
	provider.create_table("guilds", None).await.expect("create_table");
	provider.create("guilds", "g1", &Record::new()).await.expect("create");

	provider.delete("guilds", "g1").await.expect("delete");
	assert!(provider.get("guilds", "g1").await.expect("get").is_none());
	provider.delete("guilds", "g1").await.expect("delete again");
}

#[tokio::test]
async fn test_data_survives_reopen() {
	let temp_dir = TempDir::new().expect("Failed to create temp directory");
	{
		let provider = ProviderRedb::new(temp_dir.path()).await.expect("open");
		provider.create_table("guilds", None).await.expect("create_table");
		provider.create("guilds", "g1", &record(json!({ "prefix": "$" }))).await.expect("create");
	}

	let provider = ProviderRedb::new(temp_dir.path()).await.expect("reopen");
	let stored = provider.get("guilds", "g1").await.expect("get").expect("record");
	assert_eq!(stored.get("prefix"), Some(&json!("$")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_from_tasks() {
	let (provider, _temp) = create_test_provider().await;
	let provider = Arc::new(provider);
	provider.create_table("guilds", None).await.expect("create_table");

	let mut handles = Vec::new();
	for i in 0..8 {
		let provider = Arc::clone(&provider);
		handles.push(tokio::spawn(async move {
			let mut patch = Record::new();
			patch.insert(format!("field{}", i), json!(i));
			provider.update("guilds", "g1", &patch).await
		}));
	}
	for handle in handles {
		handle.await.expect("join").expect("update");
	}

	let stored = provider.get("guilds", "g1").await.expect("get").expect("record");
	for i in 0..8 {
		assert_eq!(stored.get(&format!("field{}", i)), Some(&json!(i)));
	}
}

#[tokio::test]
async fn test_column_migration_unsupported() {
	let (provider, _temp) = create_test_provider().await;

	let res = provider.update_columns("guilds", &[], &[]).await;
	assert!(matches!(res, Err(confgate_types::error::Error::MigrationUnsupported(_))));
	assert!(provider.constants().is_none());
}

// vim: ts=4
