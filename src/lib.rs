//! # Reinhardt Polymodels
//!
//! Polymorphic multi-table inheritance for Reinhardt models, inspired by
//! django-polymodels.
//!
//! Every row of a polymorphic family stores a discriminator (a content type
//! id) naming its exact type. Querying the root type returns rows that can be
//! cast down to that exact type, either lazily one joined row at a time or
//! eagerly through `select_subclasses`, which joins every parent link in the
//! same query.
//!
//! ## Crates
//!
//! - [`contenttypes`] - content types, the discriminator values
//! - [`polymorphic`] - type graph, accessors, casting and querysets
//! - `test` (feature `test-utils`) - in-memory query engine and fixtures
//!
//! ## Quick Example
//!
//! ```rust
//! use polymodels::prelude::*;
//!
//! let registry = PolymorphicRegistry::new();
//! registry
//!     .register_all([
//!         EntityType::concrete("zoo", "Animal")
//!             .with_field(FieldDef::scalar("name"))
//!             .with_field(FieldDef::content_type("content_type"))
//!             .with_discriminator("content_type"),
//!         EntityType::concrete("zoo", "Mammal").with_parent(TypeKey::new("zoo", "Animal")),
//!         EntityType::concrete("zoo", "Monkey").with_parent(TypeKey::new("zoo", "Mammal")),
//!     ])
//!     .unwrap();
//!
//! assert!(check_all(&registry).unwrap().is_empty());
//!
//! let accessors = registry.accessors(&TypeKey::new("zoo", "Animal")).unwrap();
//! assert_eq!(accessors.related_lookups(), ["mammal", "mammal.monkey"]);
//! ```
//!
//! With a [`QueryEngine`](polymorphic::QueryEngine) and a
//! [`ContentTypeManager`](contenttypes::ContentTypeManager) in hand:
//!
//! ```rust,ignore
//! let manager = PolymorphicManager::new(registry, content_types, engine);
//! let animals = manager
//!     .queryset(&TypeKey::new("zoo", "Animal"))?
//!     .select_subclasses(&[])?
//!     .all()
//!     .await?;
//! ```

#[cfg(feature = "contenttypes")]
pub mod contenttypes;
pub mod polymorphic;

pub use reinhardt_polymorphic::{
	EntityType, FieldDef, ModelInstance, PolymodelsSettings, PolymorphicError, PolymorphicManager,
	PolymorphicModel, PolymorphicQuerySet, PolymorphicRegistry, PolymorphicResult, TypeCaster,
	TypeKey, polymorphic_registry,
};

/// Commonly used types
pub mod prelude {
	pub use serde::{Deserialize, Serialize};

	pub use crate::{
		EntityType, FieldDef, ModelInstance, PolymodelsSettings, PolymorphicError,
		PolymorphicManager, PolymorphicModel, PolymorphicQuerySet, PolymorphicRegistry,
		PolymorphicResult, TypeCaster, TypeKey, polymorphic_registry,
	};
	pub use reinhardt_polymorphic::{
		Filter, FilterOperator, FilterValue, QueryEngine, check_all, check_model,
	};

	#[cfg(feature = "contenttypes")]
	pub use reinhardt_contenttypes::{ContentType, ContentTypeManager};
}
