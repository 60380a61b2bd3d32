//! Polymorphic models module.
//!
//! Type graph, subclass accessors, casting and polymorphic querysets.
//!
//! # Examples
//!
//! ```rust,no_run
//! use polymodels::polymorphic::{PolymorphicManager, PolymorphicQuerySet, TypeCaster};
//! ```

pub use reinhardt_polymorphic::*;
