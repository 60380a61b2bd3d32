//! Content type values and the in-memory registry

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The persistable identity of a model
///
/// `id` is `None` until the content type has been registered or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentType {
	pub id: Option<i64>,
	pub app_label: String,
	pub model: String,
}

impl ContentType {
	/// Create an unsaved content type
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_contenttypes::ContentType;
	///
	/// let ct = ContentType::new("zoo", "snake");
	/// assert_eq!(ct.id, None);
	/// assert_eq!(ct.qualified_name(), "zoo.snake");
	/// ```
	pub fn new(app_label: impl Into<String>, model: impl Into<String>) -> Self {
		Self {
			id: None,
			app_label: app_label.into(),
			model: model.into(),
		}
	}

	/// Set an explicit id
	pub fn with_id(mut self, id: i64) -> Self {
		self.id = Some(id);
		self
	}

	/// `app_label.model`
	pub fn qualified_name(&self) -> String {
		format!("{}.{}", self.app_label, self.model)
	}

	/// Natural key used for lookups
	pub fn natural_key(&self) -> (String, String) {
		(self.app_label.clone(), self.model.clone())
	}
}

#[derive(Debug, Default)]
struct RegistryInner {
	by_key: HashMap<(String, String), ContentType>,
	by_id: HashMap<i64, (String, String)>,
	next_id: i64,
}

impl RegistryInner {
	fn allocate_id(&mut self) -> i64 {
		self.next_id += 1;
		while self.by_id.contains_key(&self.next_id) {
			self.next_id += 1;
		}
		self.next_id
	}

	fn insert(&mut self, mut ct: ContentType) -> ContentType {
		let id = match ct.id {
			Some(id) => {
				self.next_id = self.next_id.max(id);
				id
			}
			None => self.allocate_id(),
		};
		ct.id = Some(id);
		let key = ct.natural_key();
		// A re-registration under a new id must not leave the old id resolvable
		if let Some(previous) = self.by_key.get(&key)
			&& let Some(previous_id) = previous.id
			&& previous_id != id
		{
			self.by_id.remove(&previous_id);
		}
		self.by_id.insert(id, key.clone());
		self.by_key.insert(key, ct.clone());
		ct
	}
}

/// Thread-safe in-memory content type registry
///
/// Serves as the memo table in front of a [`ContentTypeStore`](crate::ContentTypeStore)
/// and as a standalone registry for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct ContentTypeRegistry {
	inner: RwLock<RegistryInner>,
}

impl ContentTypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a content type, assigning an id when it has none
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_contenttypes::{ContentType, ContentTypeRegistry};
	///
	/// let registry = ContentTypeRegistry::new();
	/// let explicit = registry.register(ContentType::new("zoo", "mammal").with_id(40));
	/// let assigned = registry.register(ContentType::new("zoo", "monkey"));
	///
	/// assert_eq!(explicit.id, Some(40));
	/// assert_eq!(assigned.id, Some(41));
	/// ```
	pub fn register(&self, ct: ContentType) -> ContentType {
		self.inner.write().insert(ct)
	}

	pub fn get(&self, app_label: &str, model: &str) -> Option<ContentType> {
		self.inner
			.read()
			.by_key
			.get(&(app_label.to_string(), model.to_string()))
			.cloned()
	}

	pub fn get_by_id(&self, id: i64) -> Option<ContentType> {
		let inner = self.inner.read();
		inner
			.by_id
			.get(&id)
			.and_then(|key| inner.by_key.get(key))
			.cloned()
	}

	/// Return the registered content type or register a new one
	pub fn get_or_create(&self, app_label: &str, model: &str) -> ContentType {
		if let Some(ct) = self.get(app_label, model) {
			return ct;
		}
		let mut inner = self.inner.write();
		// Another writer may have won the race between the read and write locks
		if let Some(ct) = inner
			.by_key
			.get(&(app_label.to_string(), model.to_string()))
		{
			return ct.clone();
		}
		inner.insert(ContentType::new(app_label, model))
	}

	/// All registered content types, ordered by id
	pub fn all(&self) -> Vec<ContentType> {
		let mut all: Vec<_> = self.inner.read().by_key.values().cloned().collect();
		all.sort_by_key(|ct| ct.id);
		all
	}

	pub fn len(&self) -> usize {
		self.inner.read().by_key.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		*self.inner.write() = RegistryInner::default();
	}
}

/// Process-wide content type registry
///
/// Shared as the cache of every manager built with
/// [`ContentTypeManager::global`](crate::ContentTypeManager::global).
pub static CONTENT_TYPE_REGISTRY: Lazy<Arc<ContentTypeRegistry>> =
	Lazy::new(|| Arc::new(ContentTypeRegistry::new()));

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serial_test::serial;

	#[rstest]
	fn test_register_assigns_sequential_ids() {
		let registry = ContentTypeRegistry::new();
		let animal = registry.register(ContentType::new("zoo", "animal"));
		let mammal = registry.register(ContentType::new("zoo", "mammal"));

		assert_eq!(animal.id, Some(1));
		assert_eq!(mammal.id, Some(2));
		assert_eq!(registry.len(), 2);
	}

	#[rstest]
	fn test_explicit_id_skips_allocated_range() {
		let registry = ContentTypeRegistry::new();
		registry.register(ContentType::new("zoo", "animal").with_id(2));
		let next = registry.register(ContentType::new("zoo", "snake"));

		assert_eq!(next.id, Some(3));
	}

	#[rstest]
	fn test_reregistering_under_new_id_drops_old_id() {
		let registry = ContentTypeRegistry::new();
		registry.register(ContentType::new("zoo", "animal").with_id(5));
		registry.register(ContentType::new("zoo", "animal").with_id(9));

		assert!(registry.get_by_id(5).is_none());
		assert_eq!(registry.get_by_id(9).unwrap().model, "animal");
		assert_eq!(registry.len(), 1);
	}

	#[rstest]
	fn test_get_or_create_is_idempotent() {
		let registry = ContentTypeRegistry::new();
		let first = registry.get_or_create("zoo", "monkey");
		let second = registry.get_or_create("zoo", "monkey");

		assert_eq!(first, second);
		assert_eq!(registry.len(), 1);
	}

	#[rstest]
	fn test_all_is_ordered_by_id() {
		let registry = ContentTypeRegistry::new();
		registry.register(ContentType::new("zoo", "snake").with_id(7));
		registry.register(ContentType::new("zoo", "animal").with_id(3));

		let models: Vec<_> = registry.all().into_iter().map(|ct| ct.model).collect();
		assert_eq!(models, vec!["animal", "snake"]);
	}

	#[rstest]
	fn test_content_type_serialization() {
		let ct = ContentType::new("zoo", "bigsnake").with_id(12);
		let json = serde_json::to_string(&ct).unwrap();
		let back: ContentType = serde_json::from_str(&json).unwrap();
		assert_eq!(ct, back);
	}

	#[rstest]
	#[serial(content_type_registry)]
	fn test_global_registry_access() {
		let before = CONTENT_TYPE_REGISTRY.len();
		CONTENT_TYPE_REGISTRY.get_or_create("global_test", "model");
		assert_eq!(CONTENT_TYPE_REGISTRY.len(), before + 1);
		CONTENT_TYPE_REGISTRY.clear();
		assert!(CONTENT_TYPE_REGISTRY.is_empty());
	}
}
