//! # Reinhardt ContentTypes
//!
//! Django-style content types framework for polymorphic models.
//!
//! A content type is the persistable identity of a model: a stable row id keyed
//! by `(app_label, model)`. Polymorphic models store that id in their
//! discriminator column so the exact runtime type of a row is data rather than
//! a compile-time fact.
//!
//! ## Features
//!
//! - **In-memory registry**: thread-safe id assignment and lookup
//! - **Persistence seam**: [`ContentTypeStore`] for database-backed content types
//! - **Memoized manager**: [`ContentTypeManager`] serves repeated lookups without
//!   touching the store, and resolves many models in a single round trip
//!
//! ## Example
//!
//! ```rust
//! use reinhardt_contenttypes::{ContentType, ContentTypeRegistry};
//!
//! let registry = ContentTypeRegistry::new();
//! let ct = registry.register(ContentType::new("zoo", "animal"));
//!
//! assert!(ct.id.is_some());
//! assert_eq!(registry.get_by_id(ct.id.unwrap()), Some(ct));
//! ```

// Allow module_inception: `contenttypes::contenttypes` mirrors the Django module path
#[allow(clippy::module_inception)]
pub mod contenttypes;
pub mod manager;
pub mod persistence;

pub use contenttypes::{CONTENT_TYPE_REGISTRY, ContentType, ContentTypeRegistry};
pub use manager::ContentTypeManager;
pub use persistence::{ContentTypeStore, InMemoryContentTypeStore, PersistenceError};
