//! Integration tests for the memoizing content type manager

use async_trait::async_trait;
use reinhardt_contenttypes::{
	CONTENT_TYPE_REGISTRY, ContentType, ContentTypeManager, ContentTypeStore,
	InMemoryContentTypeStore, PersistenceError,
};
use rstest::*;
use serial_test::serial;
use std::sync::Arc;

/// Store whose every call fails
struct UnavailableStore;

#[async_trait]
impl ContentTypeStore for UnavailableStore {
	async fn get_or_create(
		&self,
		_app_label: &str,
		_model: &str,
	) -> Result<ContentType, PersistenceError> {
		Err(PersistenceError::Connection("store unavailable".to_string()))
	}

	async fn get_or_create_many(
		&self,
		_keys: &[(String, String)],
	) -> Result<Vec<ContentType>, PersistenceError> {
		Err(PersistenceError::Connection("store unavailable".to_string()))
	}

	async fn get_by_id(&self, _id: i64) -> Result<Option<ContentType>, PersistenceError> {
		Err(PersistenceError::Connection("store unavailable".to_string()))
	}
}

/// Store that answers bulk requests with one content type too few
struct TruncatingStore(InMemoryContentTypeStore);

#[async_trait]
impl ContentTypeStore for TruncatingStore {
	async fn get_or_create(
		&self,
		app_label: &str,
		model: &str,
	) -> Result<ContentType, PersistenceError> {
		self.0.get_or_create(app_label, model).await
	}

	async fn get_or_create_many(
		&self,
		keys: &[(String, String)],
	) -> Result<Vec<ContentType>, PersistenceError> {
		let mut all = self.0.get_or_create_many(keys).await?;
		all.pop();
		Ok(all)
	}

	async fn get_by_id(&self, id: i64) -> Result<Option<ContentType>, PersistenceError> {
		self.0.get_by_id(id).await
	}
}

/// Store that answers without assigning ids
struct UnsavedStore;

#[async_trait]
impl ContentTypeStore for UnsavedStore {
	async fn get_or_create(
		&self,
		app_label: &str,
		model: &str,
	) -> Result<ContentType, PersistenceError> {
		Ok(ContentType::new(app_label, model))
	}

	async fn get_or_create_many(
		&self,
		keys: &[(String, String)],
	) -> Result<Vec<ContentType>, PersistenceError> {
		Ok(keys
			.iter()
			.map(|(app_label, model)| ContentType::new(app_label.as_str(), model.as_str()))
			.collect())
	}

	async fn get_by_id(&self, _id: i64) -> Result<Option<ContentType>, PersistenceError> {
		Ok(Some(ContentType::new("zoo", "animal")))
	}
}

fn keys(models: &[&str]) -> Vec<(String, String)> {
	models
		.iter()
		.map(|model| ("zoo".to_string(), model.to_string()))
		.collect()
}

#[rstest]
#[tokio::test]
async fn test_seeded_ids_are_preserved() {
	let store = Arc::new(InMemoryContentTypeStore::new());
	store.insert(ContentType::new("zoo", "animal").with_id(10));
	let manager = ContentTypeManager::new(store.clone());

	let animal = manager.get_for_model("zoo", "animal").await.unwrap();
	let snake = manager.get_for_model("zoo", "snake").await.unwrap();

	assert_eq!(animal.id, Some(10));
	assert_eq!(snake.id, Some(11));
	assert_eq!(
		manager.get_for_id(10).await.unwrap().map(|ct| ct.model),
		Some("animal".to_string())
	);
	assert_eq!(store.round_trips(), 2);
}

#[rstest]
#[tokio::test]
async fn test_bulk_lookup_mixes_cache_and_store() {
	let store = Arc::new(InMemoryContentTypeStore::new());
	let manager = ContentTypeManager::new(store.clone());
	let mammal = manager.get_for_model("zoo", "mammal").await.unwrap();
	store.reset_round_trips();

	let resolved = manager
		.get_for_models(&keys(&["animal", "mammal", "monkey"]))
		.await
		.unwrap();

	let models: Vec<&str> = resolved.iter().map(|ct| ct.model.as_str()).collect();
	assert_eq!(models, ["animal", "mammal", "monkey"]);
	assert_eq!(resolved[1], mammal);
	assert_eq!(store.round_trips(), 1);
	assert_eq!(manager.cached().len(), 3);
}

#[rstest]
#[tokio::test]
async fn test_concurrent_lookups_agree() {
	let store = Arc::new(InMemoryContentTypeStore::new());
	let manager = Arc::new(ContentTypeManager::new(store));

	let handles: Vec<_> = (0..8)
		.map(|_| {
			let manager = manager.clone();
			tokio::spawn(async move { manager.get_for_model("zoo", "monkey").await })
		})
		.collect();

	let mut ids = Vec::new();
	for handle in handles {
		ids.push(handle.await.unwrap().unwrap().id);
	}
	ids.dedup();
	assert_eq!(ids.len(), 1);
	assert!(ids[0].is_some());
}

#[rstest]
#[tokio::test]
async fn test_store_errors_propagate() {
	let manager = ContentTypeManager::new(Arc::new(UnavailableStore));

	assert!(matches!(
		manager.get_for_model("zoo", "animal").await,
		Err(PersistenceError::Connection(_))
	));
	assert!(matches!(
		manager.get_for_models(&keys(&["animal"])).await,
		Err(PersistenceError::Connection(_))
	));
	assert!(matches!(
		manager.get_for_id(1).await,
		Err(PersistenceError::Connection(_))
	));
	assert!(manager.cached().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_short_bulk_answer_is_an_error() {
	let manager = ContentTypeManager::new(Arc::new(TruncatingStore(InMemoryContentTypeStore::new())));

	let result = manager.get_for_models(&keys(&["animal", "snake"])).await;

	assert!(matches!(result, Err(PersistenceError::Database(_))));
}

#[rstest]
#[serial(content_type_registry)]
fn test_global_registry() {
	CONTENT_TYPE_REGISTRY.clear();

	let ct = CONTENT_TYPE_REGISTRY.get_or_create("zoo", "animal");

	assert_eq!(ct.id, Some(1));
	assert_eq!(CONTENT_TYPE_REGISTRY.get_by_id(1), Some(ct));
	CONTENT_TYPE_REGISTRY.clear();
}

#[rstest]
#[tokio::test]
async fn test_unsaved_store_answers_are_rejected() {
	let manager = ContentTypeManager::new(Arc::new(UnsavedStore));

	assert!(matches!(
		manager.get_for_model("zoo", "animal").await,
		Err(PersistenceError::NotFound(_))
	));
	assert!(matches!(
		manager.get_for_models(&keys(&["animal", "snake"])).await,
		Err(PersistenceError::NotFound(_))
	));
	assert!(matches!(
		manager.get_for_id(1).await,
		Err(PersistenceError::NotFound(_))
	));
	assert!(manager.cached().is_empty());
}

#[rstest]
#[tokio::test]
#[serial(content_type_registry)]
async fn test_global_managers_share_the_process_registry() {
	CONTENT_TYPE_REGISTRY.clear();
	let first_store = Arc::new(InMemoryContentTypeStore::new());
	let second_store = Arc::new(InMemoryContentTypeStore::new());
	let first = ContentTypeManager::global(first_store.clone());
	let second = ContentTypeManager::global(second_store.clone());

	let snake = first.get_for_model("zoo", "snake").await.unwrap();
	let again = second.get_for_model("zoo", "snake").await.unwrap();

	assert_eq!(snake, again);
	assert_eq!(first_store.round_trips(), 1);
	assert_eq!(second_store.round_trips(), 0);
	assert_eq!(CONTENT_TYPE_REGISTRY.get("zoo", "snake"), Some(snake));
	CONTENT_TYPE_REGISTRY.clear();
}
