//! # Reinhardt Polymorphic
//!
//! Polymorphic multi-table inheritance.
//!
//! A family of entity types shares a common base row. Every row stores a
//! discriminator naming its exact type; narrower types either add their own
//! table joined one-to-one to their parent's row, or are projections that
//! reinterpret an existing row without a table of their own.
//!
//! ## Components
//!
//! - [`TypeGraph`]: registered [`EntityType`]s and their inheritance edges
//! - [`resolve_accessors`]: computes, per root type, how to reach every
//!   descendant ([`SubclassAccessor`]: join path, projection and eager-load lookup)
//! - [`PolymorphicRegistry`]: registration plus the [`AccessorCache`], kept
//!   consistent under one lock
//! - [`TypeCaster`]: narrows an instance to a descendant type
//! - [`PolymorphicQuerySet`]: `select_subclasses` / `exclude_subclasses` and
//!   lazily cast results
//! - [`checks`]: `polymodels.E00x` declaration checks
//!
//! ## Example
//!
//! ```rust
//! use reinhardt_polymorphic::{EntityType, FieldDef, PolymorphicRegistry, TypeKey};
//!
//! let registry = PolymorphicRegistry::new();
//! let animal = TypeKey::new("zoo", "Animal");
//! registry
//!     .register_all([
//!         EntityType::concrete("zoo", "Animal")
//!             .with_field(FieldDef::content_type("content_type"))
//!             .with_discriminator("content_type"),
//!         EntityType::concrete("zoo", "Mammal").with_parent(animal.clone()),
//!         EntityType::concrete("zoo", "Monkey").with_parent(TypeKey::new("zoo", "Mammal")),
//!     ])
//!     .unwrap();
//!
//! let accessors = registry.accessors(&animal).unwrap();
//! let monkey = accessors.get(&TypeKey::new("zoo", "Monkey")).unwrap();
//! assert_eq!(monkey.path(), ["mammal", "monkey"]);
//! assert_eq!(monkey.lookup(), "mammal.monkey");
//! ```

pub mod accessor;
pub mod cast;
pub mod checks;
pub mod discriminator;
pub mod engine;
pub mod error;
pub mod graph;
pub mod instance;
pub mod model;
pub mod query;
pub mod registry;
pub mod settings;
mod sql;

pub use accessor::{AccessorMap, SubclassAccessor, resolve_accessors};
pub use cast::TypeCaster;
pub use checks::{CheckLevel, CheckMessage, check_all, check_model};
pub use discriminator::DiscriminatorRegistry;
pub use engine::{QueryEngine, RowRequest};
pub use error::{PolymorphicError, PolymorphicResult, StorageError};
pub use graph::TypeGraph;
pub use instance::{ModelInstance, Row};
pub use model::{EntityKind, EntityType, FieldDef, FieldKind, PolymorphicModel, TypeKey};
pub use query::{
	Filter, FilterOperator, FilterValue, JoinSpec, PolymorphicManager, PolymorphicQuerySet,
	QueryPlan, TableRef,
};
pub use registry::{AccessorCache, PolymorphicRegistry, polymorphic_registry};
pub use settings::{PolymodelsSettings, SettingsError};
