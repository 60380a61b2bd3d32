//! Dynamically typed model instances

use crate::model::TypeKey;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Column values of a single table row
pub type Row = IndexMap<String, Value>;

/// A row materialized as an instance of a registered type
///
/// Besides its own column values an instance carries two caches filled by the
/// query engine: `related` holds joined parent-link rows keyed by join
/// attribute (`None` records a row known to be missing), `prefetched` holds
/// the results of secondary prefetch passes keyed by lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
	model: TypeKey,
	fields: Row,
	related: HashMap<String, Option<Box<ModelInstance>>>,
	prefetched: HashMap<String, Vec<ModelInstance>>,
}

impl ModelInstance {
	pub fn new(model: TypeKey) -> Self {
		Self::from_row(model, Row::new())
	}

	pub fn from_row(model: TypeKey, fields: Row) -> Self {
		Self {
			model,
			fields,
			related: HashMap::new(),
			prefetched: HashMap::new(),
		}
	}

	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::{ModelInstance, TypeKey};
	///
	/// let monkey = ModelInstance::new(TypeKey::new("zoo", "Monkey"))
	///     .with_field("id", 1)
	///     .with_field("name", "Bobo");
	/// assert_eq!(monkey.get_i64("id"), Some(1));
	/// assert_eq!(monkey.get_str("name"), Some("Bobo"));
	/// ```
	pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.set(name, value);
		self
	}

	pub fn model(&self) -> &TypeKey {
		&self.model
	}

	pub fn fields(&self) -> &Row {
		&self.fields
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.fields.get(name)
	}

	pub fn get_i64(&self, name: &str) -> Option<i64> {
		self.get(name).and_then(Value::as_i64)
	}

	pub fn get_str(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(Value::as_str)
	}

	pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
		self.fields.insert(name.into(), value.into());
	}

	/// `true` when `name` is absent or null
	pub fn is_unset(&self, name: &str) -> bool {
		self.get(name).is_none_or(Value::is_null)
	}

	/// Cached joined row: `None` when never loaded, `Some(None)` when known missing
	pub fn related(&self, attribute: &str) -> Option<Option<&ModelInstance>> {
		self.related.get(attribute).map(|child| child.as_deref())
	}

	pub fn set_related(&mut self, attribute: impl Into<String>, child: Option<ModelInstance>) {
		self.related.insert(attribute.into(), child.map(Box::new));
	}

	pub fn take_related(&mut self, attribute: &str) -> Option<Option<ModelInstance>> {
		self.related
			.remove(attribute)
			.map(|child| child.map(|child| *child))
	}

	pub fn related_mut(&mut self, attribute: &str) -> Option<&mut ModelInstance> {
		self.related
			.get_mut(attribute)
			.and_then(|child| child.as_deref_mut())
	}

	pub fn prefetched(&self, lookup: &str) -> Option<&[ModelInstance]> {
		self.prefetched.get(lookup).map(Vec::as_slice)
	}

	pub fn set_prefetched(&mut self, lookup: impl Into<String>, objects: Vec<ModelInstance>) {
		self.prefetched.insert(lookup.into(), objects);
	}

	pub fn prefetched_lookups(&self) -> impl Iterator<Item = &str> {
		self.prefetched.keys().map(String::as_str)
	}

	/// Narrow to a child type by overlaying its own row
	///
	/// The child's related cache replaces ours; prefetched objects are kept.
	pub(crate) fn descend(self, child: ModelInstance) -> Self {
		let mut fields = self.fields;
		fields.extend(child.fields);
		Self {
			model: child.model,
			fields,
			related: child.related,
			prefetched: self.prefetched,
		}
	}

	/// Reinterpret the same row as `model`
	pub(crate) fn project(mut self, model: TypeKey) -> Self {
		self.model = model;
		self
	}

	pub(crate) fn take_prefetched(&mut self) -> HashMap<String, Vec<ModelInstance>> {
		std::mem::take(&mut self.prefetched)
	}

	/// Add prefetched objects for lookups not already present
	pub(crate) fn merge_prefetched(&mut self, prefetched: HashMap<String, Vec<ModelInstance>>) {
		for (lookup, objects) in prefetched {
			self.prefetched.entry(lookup).or_insert(objects);
		}
	}

	/// Deserialize the field values into `T`
	pub fn into_model<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
		serde_json::from_value(Value::Object(self.fields.into_iter().collect()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde::Deserialize;

	#[derive(Debug, Deserialize, PartialEq)]
	struct Snake {
		id: i64,
		name: String,
		length: i64,
	}

	#[rstest]
	fn test_descend_overlays_child_row() {
		let mut animal = ModelInstance::new(TypeKey::new("zoo", "Animal"))
			.with_field("id", 4)
			.with_field("name", "Kaa");
		animal.set_prefetched("keepers", Vec::new());
		let snake = ModelInstance::new(TypeKey::new("zoo", "Snake"))
			.with_field("animal_ptr_id", 4)
			.with_field("length", 9);

		let narrowed = animal.descend(snake);

		assert_eq!(narrowed.model(), &TypeKey::new("zoo", "Snake"));
		assert_eq!(narrowed.get_i64("length"), Some(9));
		assert_eq!(narrowed.get_str("name"), Some("Kaa"));
		assert!(narrowed.prefetched("keepers").is_some());
	}

	#[rstest]
	fn test_related_cache_states() {
		let mut animal = ModelInstance::new(TypeKey::new("zoo", "Animal"));
		assert_eq!(animal.related("mammal"), None);

		animal.set_related("mammal", None);
		assert_eq!(animal.related("mammal"), Some(None));
		assert_eq!(animal.take_related("mammal"), Some(None));
		assert_eq!(animal.related("mammal"), None);
	}

	#[rstest]
	fn test_into_model() {
		let snake = ModelInstance::new(TypeKey::new("zoo", "Snake"))
			.with_field("id", 2)
			.with_field("name", "Nagini")
			.with_field("length", 12);

		let typed: Snake = snake.into_model().unwrap();
		assert_eq!(
			typed,
			Snake {
				id: 2,
				name: "Nagini".to_string(),
				length: 12
			}
		);
	}

	#[rstest]
	fn test_merge_prefetched_keeps_existing() {
		let mut snake = ModelInstance::new(TypeKey::new("zoo", "Snake"));
		snake.set_prefetched("keepers", vec![ModelInstance::new(TypeKey::new("zoo", "Keeper"))]);

		let mut incoming = HashMap::new();
		incoming.insert("keepers".to_string(), Vec::new());
		incoming.insert("meals".to_string(), Vec::new());
		snake.merge_prefetched(incoming);

		assert_eq!(snake.prefetched("keepers").map(<[_]>::len), Some(1));
		assert_eq!(snake.prefetched("meals").map(<[_]>::len), Some(0));
	}
}
