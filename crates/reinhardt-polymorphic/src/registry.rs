//! Type registration and the shared accessor cache
//!
//! The type graph and the accessor maps computed from it live behind a single
//! lock: a registration and the invalidation it triggers are observed together,
//! so a reader never sees a map that is missing a registered descendant.

use crate::accessor::{AccessorMap, resolve_accessors};
use crate::error::PolymorphicResult;
use crate::graph::TypeGraph;
use crate::model::{EntityType, FieldKind, TypeKey};
use crate::settings::PolymodelsSettings;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Accessor maps keyed by root type
#[derive(Debug, Default)]
pub struct AccessorCache {
	maps: HashMap<TypeKey, Arc<AccessorMap>>,
}

impl AccessorCache {
	/// Cached map of `root`, if one has been computed
	pub fn get(&self, root: &TypeKey) -> Option<Arc<AccessorMap>> {
		self.maps.get(root).cloned()
	}

	/// Store `map` under its own root, replacing any previous map
	pub fn insert(&mut self, map: Arc<AccessorMap>) {
		self.maps.insert(map.root().clone(), map);
	}

	/// Drop the map of `root`; returns whether one was cached
	pub fn invalidate(&mut self, root: &TypeKey) -> bool {
		self.maps.remove(root).is_some()
	}

	/// Number of cached roots
	pub fn len(&self) -> usize {
		self.maps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.maps.is_empty()
	}
}

#[derive(Debug, Default)]
struct RegistryState {
	graph: Arc<TypeGraph>,
	cache: AccessorCache,
}

/// Registry of polymorphic entity types
///
/// # Examples
///
/// ```
/// use reinhardt_polymorphic::{EntityType, FieldDef, PolymorphicRegistry, TypeKey};
///
/// let registry = PolymorphicRegistry::new();
/// registry
///     .register(
///         EntityType::concrete("zoo", "Animal")
///             .with_field(FieldDef::content_type("content_type"))
///             .with_discriminator("content_type"),
///     )
///     .unwrap();
/// let animal = TypeKey::new("zoo", "Animal");
/// assert_eq!(registry.accessors(&animal).unwrap().len(), 1);
///
/// registry
///     .register(EntityType::concrete("zoo", "Mammal").with_parent(animal.clone()))
///     .unwrap();
/// let map = registry.accessors(&animal).unwrap();
/// assert_eq!(map.get(&TypeKey::new("zoo", "Mammal")).unwrap().lookup(), "mammal");
/// ```
#[derive(Debug, Default)]
pub struct PolymorphicRegistry {
	settings: PolymodelsSettings,
	state: Mutex<RegistryState>,
}

impl PolymorphicRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_settings(settings: PolymodelsSettings) -> Self {
		Self {
			settings,
			state: Mutex::new(RegistryState::default()),
		}
	}

	pub fn settings(&self) -> &PolymodelsSettings {
		&self.settings
	}

	/// Add `entity` and drop the accessor maps of all its ancestors
	///
	/// A root type that declares no discriminator but has a content type field
	/// named after the configured discriminator field uses that field.
	pub fn register(&self, entity: EntityType) -> PolymorphicResult<()> {
		let key = entity.key().clone();
		let default_field = &self.settings.discriminator_field;
		let inherits_default = entity.parents().is_empty()
			&& entity.declared_discriminator().is_none()
			&& entity
				.field(default_field)
				.is_some_and(|field| field.kind == FieldKind::ContentType);
		let entity = if inherits_default {
			entity.with_discriminator(default_field.clone())
		} else {
			entity
		};
		let mut state = self.state.lock();
		if let Err(err) = Arc::make_mut(&mut state.graph).insert(entity) {
			tracing::warn!(model = %key, error = %err, "rejected polymorphic type registration");
			return Err(err);
		}
		for ancestor in state.graph.ancestors(&key)? {
			if state.cache.invalidate(&ancestor) {
				tracing::debug!(root = %ancestor, registered = %key, "invalidated subclass accessors");
			}
		}
		Ok(())
	}

	/// Register several types in order, stopping at the first failure
	pub fn register_all(&self, entities: impl IntoIterator<Item = EntityType>) -> PolymorphicResult<()> {
		entities.into_iter().try_for_each(|entity| self.register(entity))
	}

	/// Accessor map of `root`, computed on first use
	pub fn accessors(&self, root: &TypeKey) -> PolymorphicResult<Arc<AccessorMap>> {
		let mut state = self.state.lock();
		if let Some(map) = state.cache.get(root) {
			return Ok(map);
		}
		let map = Arc::new(resolve_accessors(&state.graph, root, &self.settings)?);
		state.cache.insert(map.clone());
		Ok(map)
	}

	/// Drop the cached map of `root` only
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::{EntityType, PolymorphicRegistry, TypeKey};
	///
	/// let registry = PolymorphicRegistry::new();
	/// let animal = TypeKey::new("zoo", "Animal");
	/// registry.register(EntityType::concrete("zoo", "Animal")).unwrap();
	///
	/// registry.accessors(&animal).unwrap();
	/// assert!(registry.is_cached(&animal));
	/// registry.invalidate(&animal);
	/// assert!(!registry.is_cached(&animal));
	/// ```
	pub fn invalidate(&self, root: &TypeKey) {
		if self.state.lock().cache.invalidate(root) {
			tracing::debug!(root = %root, "invalidated subclass accessors");
		}
	}

	pub fn is_cached(&self, root: &TypeKey) -> bool {
		self.state.lock().cache.get(root).is_some()
	}

	pub fn contains(&self, key: &TypeKey) -> bool {
		self.state.lock().graph.contains(key)
	}

	/// Registered declaration of `key`
	pub fn entity(&self, key: &TypeKey) -> PolymorphicResult<EntityType> {
		self.state.lock().graph.entity(key).cloned()
	}

	/// Run `f` against a snapshot of the type graph
	///
	/// The lock is released before `f` runs, so `f` may call back into the
	/// registry. Registrations made meanwhile are not visible to `f`.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::{EntityType, PolymorphicRegistry, TypeKey};
	///
	/// let registry = PolymorphicRegistry::new();
	/// registry.register(EntityType::concrete("zoo", "Animal")).unwrap();
	///
	/// let count = registry.with_graph(|graph| graph.all_types().count());
	/// assert_eq!(count, 1);
	/// ```
	pub fn with_graph<R>(&self, f: impl FnOnce(&TypeGraph) -> R) -> R {
		let graph = Arc::clone(&self.state.lock().graph);
		f(&graph)
	}
}

static POLYMORPHIC_REGISTRY: Lazy<Arc<PolymorphicRegistry>> =
	Lazy::new(|| Arc::new(PolymorphicRegistry::new()));

/// Process-wide registry
pub fn polymorphic_registry() -> Arc<PolymorphicRegistry> {
	POLYMORPHIC_REGISTRY.clone()
}
