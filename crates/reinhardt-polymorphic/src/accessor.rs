//! Subclass accessor resolution
//!
//! For a root type `R` the resolver computes, for every type in `R`'s subtree,
//! the chain of one-to-one join attributes leading from an `R` row to that
//! type's row, the projection applied on top of it, and the eager-load lookup
//! string naming the same joins.
//!
//! ```text
//! Animal ──mammal──▶ Mammal ──monkey──▶ Monkey
//!    └─────snake───▶ Snake ┄┄▶ BigSnake ┄┄▶ HugeSnake   (┄┄ projection)
//! ```

use crate::error::{PolymorphicError, PolymorphicResult};
use crate::graph::TypeGraph;
use crate::model::TypeKey;
use crate::settings::PolymodelsSettings;
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// How to reach a descendant from an instance of a root type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubclassAccessor {
	path: Vec<String>,
	path_types: Vec<TypeKey>,
	projection: Option<TypeKey>,
	lookup: String,
}

impl SubclassAccessor {
	/// The accessor of a root to itself
	pub fn identity() -> Self {
		Self {
			path: Vec::new(),
			path_types: Vec::new(),
			projection: None,
			lookup: String::new(),
		}
	}

	/// Join attribute names, outermost first
	pub fn path(&self) -> &[String] {
		&self.path
	}

	/// Concrete type reached by each join of [`path`](Self::path)
	pub fn path_types(&self) -> &[TypeKey] {
		&self.path_types
	}

	/// Projection relabeling the reached row, if the target is a projection
	pub fn projection(&self) -> Option<&TypeKey> {
		self.projection.as_ref()
	}

	/// Eager-load hint; empty when no join is needed
	pub fn lookup(&self) -> &str {
		&self.lookup
	}

	/// Whether a cast through this accessor leaves the instance unchanged
	pub fn is_identity(&self) -> bool {
		self.path.is_empty() && self.projection.is_none()
	}

	/// Number of joined rows dereferenced by a cast
	pub fn hops(&self) -> usize {
		self.path.len()
	}

	fn project(&self, target: TypeKey) -> Self {
		Self {
			projection: Some(target),
			..self.clone()
		}
	}

	fn join(&self, part: &str, reached: TypeKey, settings: &PolymodelsSettings) -> Self {
		let mut path = self.path.clone();
		path.push(part.to_string());
		let mut path_types = self.path_types.clone();
		path_types.push(reached);
		Self {
			lookup: settings.join_lookup(&path),
			path,
			path_types,
			projection: None,
		}
	}
}

/// Every type in a root's subtree mapped to its accessor, in discovery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessorMap {
	root: TypeKey,
	entries: IndexMap<TypeKey, SubclassAccessor>,
}

impl AccessorMap {
	/// Type the map was resolved for
	pub fn root(&self) -> &TypeKey {
		&self.root
	}

	/// Accessor for `target`; never falls back to the identity accessor
	///
	/// # Errors
	///
	/// Returns [`PolymorphicError::UnrelatedType`] when `target` is not in the
	/// root's subtree.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::{EntityType, PolymorphicError, PolymorphicRegistry, TypeKey};
	///
	/// let registry = PolymorphicRegistry::new();
	/// registry
	///     .register_all([
	///         EntityType::concrete("zoo", "Animal"),
	///         EntityType::concrete("zoo", "Snake").with_parent(TypeKey::new("zoo", "Animal")),
	///         EntityType::projection("zoo", "BigSnake").with_parent(TypeKey::new("zoo", "Snake")),
	///     ])
	///     .unwrap();
	///
	/// let snakes = registry.accessors(&TypeKey::new("zoo", "Snake")).unwrap();
	/// let big = snakes.get(&TypeKey::new("zoo", "BigSnake")).unwrap();
	/// assert_eq!(big.hops(), 0);
	/// assert_eq!(big.projection(), Some(&TypeKey::new("zoo", "bigsnake")));
	///
	/// assert!(matches!(
	///     snakes.get(&TypeKey::new("zoo", "Animal")),
	///     Err(PolymorphicError::UnrelatedType { .. })
	/// ));
	/// ```
	pub fn get(&self, target: &TypeKey) -> PolymorphicResult<&SubclassAccessor> {
		self.entries
			.get(target)
			.ok_or_else(|| PolymorphicError::UnrelatedType {
				root: self.root.clone(),
				target: target.clone(),
			})
	}

	pub fn contains(&self, target: &TypeKey) -> bool {
		self.entries.contains_key(target)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &SubclassAccessor)> {
		self.entries.iter()
	}

	/// Subtree of the root in discovery order, the root first
	pub fn types(&self) -> impl Iterator<Item = &TypeKey> {
		self.entries.keys()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Distinct non-empty lookups of the whole map
	pub fn related_lookups(&self) -> Vec<String> {
		self.related_lookups_for(self.entries.keys())
	}

	/// Distinct non-empty lookups of `types`; types outside the map are skipped
	pub fn related_lookups_for<'a>(&self, types: impl IntoIterator<Item = &'a TypeKey>) -> Vec<String> {
		let mut lookups = IndexSet::new();
		for ty in types {
			if let Some(accessor) = self.entries.get(ty)
				&& !accessor.lookup.is_empty()
			{
				lookups.insert(accessor.lookup.clone());
			}
		}
		lookups.into_iter().collect()
	}
}

/// Compute the accessor map of `root`
///
/// Walks the subtree breadth first with an explicit queue. A projection child
/// keeps its parent's path and records itself as the projection target; a
/// concrete child extends the path with its link name.
pub fn resolve_accessors(
	graph: &TypeGraph,
	root: &TypeKey,
	settings: &PolymodelsSettings,
) -> PolymorphicResult<AccessorMap> {
	let entity = graph.entity(root)?;
	if entity.is_abstract() {
		return Err(PolymorphicError::InvalidArgument(format!(
			"abstract type {} has no subclass accessors",
			root
		)));
	}

	let mut entries = IndexMap::new();
	entries.insert(root.clone(), SubclassAccessor::identity());

	let mut queue = VecDeque::from([root.clone()]);
	while let Some(current) = queue.pop_front() {
		let base = entries
			.get(&current)
			.cloned()
			.ok_or_else(|| PolymorphicError::UnknownType(current.clone()))?;
		for child in graph.row_children(&current)? {
			if entries.contains_key(&child) {
				continue;
			}
			let child_type = graph.entity(&child)?;
			let accessor = if child_type.is_projection() {
				base.project(child.clone())
			} else {
				base.join(child_type.link_name(), child.clone(), settings)
			};
			entries.insert(child.clone(), accessor);
			queue.push_back(child);
		}
	}

	tracing::debug!(root = %root, entries = entries.len(), "resolved subclass accessors");
	Ok(AccessorMap {
		root: root.clone(),
		entries,
	})
}
