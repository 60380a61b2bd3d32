//! Content type persistence
//!
//! [`ContentTypeStore`] is the seam between the memoizing
//! [`ContentTypeManager`](crate::ContentTypeManager) and wherever content types
//! are durably kept (usually the `django_content_type`-style table).

use crate::contenttypes::{ContentType, ContentTypeRegistry};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Errors raised by a content type store
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
	#[error("Database error: {0}")]
	Database(String),

	#[error("Content type not found: {0}")]
	NotFound(String),

	#[error("Connection error: {0}")]
	Connection(String),

	#[error("Operation cancelled")]
	Cancelled,
}

/// Durable storage for content types
#[async_trait]
pub trait ContentTypeStore: Send + Sync {
	/// Fetch the content type for `(app_label, model)`, creating it if missing
	async fn get_or_create(
		&self,
		app_label: &str,
		model: &str,
	) -> Result<ContentType, PersistenceError>;

	/// Bulk form of [`get_or_create`](Self::get_or_create); one round trip
	///
	/// The result is in the same order as `keys`.
	async fn get_or_create_many(
		&self,
		keys: &[(String, String)],
	) -> Result<Vec<ContentType>, PersistenceError>;

	async fn get_by_id(&self, id: i64) -> Result<Option<ContentType>, PersistenceError>;
}

/// Store backed by a private [`ContentTypeRegistry`]
///
/// Every trait call counts as one round trip, which lets tests assert how often
/// the manager reaches past its cache.
#[derive(Debug, Default)]
pub struct InMemoryContentTypeStore {
	registry: ContentTypeRegistry,
	round_trips: AtomicUsize,
}

impl InMemoryContentTypeStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seed the store with an existing content type
	pub fn insert(&self, ct: ContentType) -> ContentType {
		self.registry.register(ct)
	}

	pub fn round_trips(&self) -> usize {
		self.round_trips.load(Ordering::SeqCst)
	}

	pub fn reset_round_trips(&self) {
		self.round_trips.store(0, Ordering::SeqCst);
	}

	fn record_round_trip(&self) {
		self.round_trips.fetch_add(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl ContentTypeStore for InMemoryContentTypeStore {
	async fn get_or_create(
		&self,
		app_label: &str,
		model: &str,
	) -> Result<ContentType, PersistenceError> {
		self.record_round_trip();
		Ok(self.registry.get_or_create(app_label, model))
	}

	async fn get_or_create_many(
		&self,
		keys: &[(String, String)],
	) -> Result<Vec<ContentType>, PersistenceError> {
		self.record_round_trip();
		Ok(keys
			.iter()
			.map(|(app_label, model)| self.registry.get_or_create(app_label, model))
			.collect())
	}

	async fn get_by_id(&self, id: i64) -> Result<Option<ContentType>, PersistenceError> {
		self.record_round_trip();
		Ok(self.registry.get_by_id(id))
	}
}
