//! rstest fixtures wiring the zoo to in-memory collaborators

use crate::engine::{MemoryEngine, Relation};
use crate::zoo;
use reinhardt_contenttypes::{ContentTypeManager, InMemoryContentTypeStore};
use reinhardt_polymorphic::{
	ModelInstance, PolymorphicManager, PolymorphicRegistry, PolymorphicResult, Row, TypeKey,
};
use rstest::fixture;
use serde_json::Value;
use std::sync::Arc;

/// Registry, content types, engine and manager of one isolated zoo
pub struct Zoo {
	pub registry: Arc<PolymorphicRegistry>,
	pub store: Arc<InMemoryContentTypeStore>,
	pub contenttypes: Arc<ContentTypeManager>,
	pub engine: Arc<MemoryEngine>,
	pub manager: PolymorphicManager,
}

/// Primary keys of the rows created by [`Zoo::populate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZooRows {
	pub animal: i64,
	pub mammal: i64,
	pub monkey: i64,
	pub snake: i64,
	pub big_snake: i64,
	pub huge_snake: i64,
}

impl Zoo {
	pub fn new() -> Self {
		Self::with_registry(Arc::new(PolymorphicRegistry::new()))
	}

	/// Register the zoo types into `registry` and wire the collaborators around it
	pub fn with_registry(registry: Arc<PolymorphicRegistry>) -> Self {
		if let Err(err) = registry.register_all(zoo::zoo_types()) {
			tracing::warn!(error = %err, "zoo types already registered");
		}
		let store = Arc::new(InMemoryContentTypeStore::new());
		let contenttypes = Arc::new(ContentTypeManager::new(store.clone()));
		let engine = Arc::new(MemoryEngine::new(registry.clone()));
		engine.register_relation(
			zoo::KEEPERS_LOOKUP,
			Relation {
				owner: zoo::animal(),
				table: zoo::KEEPER_TABLE.to_string(),
				model: zoo::keeper(),
				column: "animal_id".to_string(),
			},
		);
		let manager = PolymorphicManager::new(registry.clone(), contenttypes.clone(), engine.clone());
		Self {
			registry,
			store,
			contenttypes,
			engine,
			manager,
		}
	}

	/// Run the pre-insert hook and store `instance`
	pub async fn create(&self, mut instance: ModelInstance) -> PolymorphicResult<i64> {
		self.manager.prepare_insert(&mut instance).await?;
		self.engine.insert(&instance)
	}

	pub async fn create_named(&self, model: TypeKey, name: &str) -> PolymorphicResult<i64> {
		self.create(ModelInstance::new(model).with_field("name", name))
			.await
	}

	pub async fn create_snake(
		&self,
		model: TypeKey,
		name: &str,
		length: i64,
		color: &str,
	) -> PolymorphicResult<i64> {
		self.create(
			ModelInstance::new(model)
				.with_field("name", name)
				.with_field("length", length)
				.with_field("color", color),
		)
		.await
	}

	pub fn add_keeper(&self, animal_id: i64, name: &str) -> i64 {
		let id = self.engine.next_id();
		let mut row = Row::new();
		row.insert("id".to_string(), Value::from(id));
		row.insert("name".to_string(), Value::from(name));
		row.insert("animal_id".to_string(), Value::from(animal_id));
		self.engine.insert_row(zoo::KEEPER_TABLE, id, row);
		id
	}

	/// One row of every concrete or projected zoo type, in hierarchy order
	///
	/// The monkey and the snake get a keeper each. Engine counters are reset
	/// afterwards.
	pub async fn populate(&self) -> PolymorphicResult<ZooRows> {
		let rows = ZooRows {
			animal: self.create_named(zoo::animal(), "animal").await?,
			mammal: self.create_named(zoo::mammal(), "mammal").await?,
			monkey: self.create_named(zoo::monkey(), "monkey").await?,
			snake: self.create_snake(zoo::snake(), "snake", 1, "green").await?,
			big_snake: self.create_snake(zoo::big_snake(), "big snake", 10, "red").await?,
			huge_snake: self
				.create_snake(zoo::huge_snake(), "huge snake", 100, "black")
				.await?,
		};
		self.add_keeper(rows.monkey, "Alice");
		self.add_keeper(rows.snake, "Bob");
		self.engine.reset_counters();
		Ok(rows)
	}
}

impl Default for Zoo {
	fn default() -> Self {
		Self::new()
	}
}

/// An empty zoo with its own registry
#[fixture]
pub fn zoo_env() -> Zoo {
	crate::logging::init_test_logging();
	Zoo::new()
}
