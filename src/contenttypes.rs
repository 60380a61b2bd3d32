//! Content types module.
//!
//! Persistable identities of models, used as discriminator values.
//!
//! # Examples
//!
//! ```rust
//! use polymodels::contenttypes::{ContentType, ContentTypeRegistry};
//!
//! let registry = ContentTypeRegistry::new();
//! let ct = registry.get_or_create("zoo", "animal");
//! assert_eq!(registry.get_by_id(ct.id.unwrap()), Some(ct));
//! ```

pub use reinhardt_contenttypes::*;
