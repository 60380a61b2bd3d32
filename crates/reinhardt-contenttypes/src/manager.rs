//! Memoizing content type manager
//!
//! Mirrors Django's `ContentType.objects`: `get_for_model`, `get_for_models` and
//! `get_for_id` consult a local cache first and only reach the store on a miss.

use crate::contenttypes::{CONTENT_TYPE_REGISTRY, ContentType, ContentTypeRegistry};
use crate::persistence::{ContentTypeStore, PersistenceError};
use std::sync::Arc;

pub struct ContentTypeManager {
	cache: Arc<ContentTypeRegistry>,
	store: Arc<dyn ContentTypeStore>,
}

impl ContentTypeManager {
	/// Create a manager in front of `store`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_contenttypes::{ContentTypeManager, InMemoryContentTypeStore};
	/// use std::sync::Arc;
	///
	/// # tokio_test::block_on(async {
	/// let store = Arc::new(InMemoryContentTypeStore::new());
	/// let manager = ContentTypeManager::new(store.clone());
	///
	/// let first = manager.get_for_model("zoo", "animal").await.unwrap();
	/// let again = manager.get_for_model("zoo", "animal").await.unwrap();
	///
	/// assert_eq!(first, again);
	/// assert_eq!(store.round_trips(), 1);
	/// # });
	/// ```
	pub fn new(store: Arc<dyn ContentTypeStore>) -> Self {
		Self::with_cache(store, Arc::new(ContentTypeRegistry::new()))
	}

	/// Create a manager memoizing into an existing registry
	pub fn with_cache(store: Arc<dyn ContentTypeStore>, cache: Arc<ContentTypeRegistry>) -> Self {
		Self { cache, store }
	}

	/// Create a manager memoizing into [`CONTENT_TYPE_REGISTRY`]
	///
	/// Every global manager shares one cache, so a content type fetched
	/// through one of them is served locally by all the others.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_contenttypes::{
	///     CONTENT_TYPE_REGISTRY, ContentTypeManager, InMemoryContentTypeStore,
	/// };
	/// use std::sync::Arc;
	///
	/// # tokio_test::block_on(async {
	/// let store = Arc::new(InMemoryContentTypeStore::new());
	/// let manager = ContentTypeManager::global(store);
	///
	/// let ct = manager.get_for_model("docs", "global_manager").await.unwrap();
	/// assert_eq!(CONTENT_TYPE_REGISTRY.get("docs", "global_manager"), Some(ct));
	/// # });
	/// ```
	pub fn global(store: Arc<dyn ContentTypeStore>) -> Self {
		Self::with_cache(store, Arc::clone(&CONTENT_TYPE_REGISTRY))
	}

	/// Memoize a content type answered by the store
	///
	/// Content types without a store-assigned id are rejected.
	fn remember(&self, ct: ContentType) -> Result<ContentType, PersistenceError> {
		if ct.id.is_none() {
			return Err(PersistenceError::NotFound(format!(
				"store returned unsaved content type {}",
				ct.qualified_name()
			)));
		}
		tracing::debug!(
			content_type = %ct.qualified_name(),
			id = ?ct.id,
			"cached content type"
		);
		Ok(self.cache.register(ct))
	}

	pub async fn get_for_model(
		&self,
		app_label: &str,
		model: &str,
	) -> Result<ContentType, PersistenceError> {
		if let Some(ct) = self.cache.get(app_label, model) {
			return Ok(ct);
		}
		let ct = self.store.get_or_create(app_label, model).await?;
		self.remember(ct)
	}

	/// Resolve many models, fetching every cache miss in a single store call
	///
	/// The result is in the same order as `keys`.
	pub async fn get_for_models(
		&self,
		keys: &[(String, String)],
	) -> Result<Vec<ContentType>, PersistenceError> {
		let mut resolved: Vec<Option<ContentType>> = keys
			.iter()
			.map(|(app_label, model)| self.cache.get(app_label, model))
			.collect();

		let missing: Vec<(String, String)> = keys
			.iter()
			.zip(&resolved)
			.filter(|(_, hit)| hit.is_none())
			.map(|(key, _)| key.clone())
			.collect();

		if !missing.is_empty() {
			let fetched = self.store.get_or_create_many(&missing).await?;
			if fetched.len() != missing.len() {
				return Err(PersistenceError::Database(format!(
					"expected {} content types from store, got {}",
					missing.len(),
					fetched.len()
				)));
			}
			let mut fetched = fetched.into_iter();
			for slot in resolved.iter_mut().filter(|slot| slot.is_none()) {
				if let Some(ct) = fetched.next() {
					*slot = Some(self.remember(ct)?);
				}
			}
		}

		resolved
			.into_iter()
			.zip(keys)
			.map(|(ct, (app_label, model))| {
				ct.ok_or_else(|| PersistenceError::NotFound(format!("{}.{}", app_label, model)))
			})
			.collect()
	}

	pub async fn get_for_id(&self, id: i64) -> Result<Option<ContentType>, PersistenceError> {
		if let Some(ct) = self.cache.get_by_id(id) {
			return Ok(Some(ct));
		}
		match self.store.get_by_id(id).await? {
			Some(ct) => self.remember(ct).map(Some),
			None => Ok(None),
		}
	}

	/// Drop every memoized content type
	pub fn clear_cache(&self) {
		self.cache.clear();
	}

	pub fn cached(&self) -> Vec<ContentType> {
		self.cache.all()
	}
}
