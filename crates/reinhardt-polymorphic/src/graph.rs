//! The type graph: registered entity types and their inheritance edges

use crate::error::{PolymorphicError, PolymorphicResult};
use crate::model::{EntityKind, EntityType, FieldDef, FieldKind, TypeKey};
use crate::settings::PolymodelsSettings;
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, VecDeque};

/// Storage for entity types, indexed by identity and by declared parent
///
/// The graph only grows: types are never removed.
#[derive(Debug, Clone, Default)]
pub struct TypeGraph {
	types: IndexMap<TypeKey, EntityType>,
	children: HashMap<TypeKey, Vec<TypeKey>>,
}

impl TypeGraph {
	pub fn new() -> Self {
		Self::default()
	}

	/// Validate and add `entity`
	pub fn insert(&mut self, entity: EntityType) -> PolymorphicResult<()> {
		self.validate(&entity)?;
		let key = entity.key().clone();
		for parent in entity.parents() {
			let siblings = self.children.entry(parent.clone()).or_default();
			if !siblings.contains(&key) {
				siblings.push(key.clone());
			}
		}
		self.types.insert(key, entity);
		Ok(())
	}

	fn validate(&self, entity: &EntityType) -> PolymorphicResult<()> {
		if self.types.contains_key(entity.key()) {
			return Err(PolymorphicError::AlreadyRegistered(entity.key().clone()));
		}
		for parent in entity.parents() {
			if !self.types.contains_key(parent) {
				return Err(PolymorphicError::UnknownType(parent.clone()));
			}
		}

		let mut row_parents = IndexSet::new();
		for parent in entity.parents() {
			let parent_type = self.entity(parent)?;
			if !parent_type.is_abstract() {
				row_parents.insert(parent.clone());
			} else if let Some(row) = self.row_parent(parent)? {
				row_parents.insert(row.key().clone());
			}
		}
		if row_parents.len() > 1 {
			return Err(PolymorphicError::InvalidArgument(format!(
				"{} inherits rows from more than one parent",
				entity.key()
			)));
		}

		if entity.is_projection() {
			if row_parents.is_empty() {
				return Err(PolymorphicError::InvalidArgument(format!(
					"projection {} has no row-bearing parent",
					entity.key()
				)));
			}
			if !entity.fields().is_empty() {
				return Err(PolymorphicError::InvalidArgument(format!(
					"projection {} cannot declare fields",
					entity.key()
				)));
			}
		}
		Ok(())
	}

	pub fn contains(&self, key: &TypeKey) -> bool {
		self.types.contains_key(key)
	}

	pub fn get(&self, key: &TypeKey) -> Option<&EntityType> {
		self.types.get(key)
	}

	pub fn entity(&self, key: &TypeKey) -> PolymorphicResult<&EntityType> {
		self.types
			.get(key)
			.ok_or_else(|| PolymorphicError::UnknownType(key.clone()))
	}

	/// Registered types in registration order
	pub fn all_types(&self) -> impl Iterator<Item = &EntityType> {
		self.types.values()
	}

	pub fn len(&self) -> usize {
		self.types.len()
	}

	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}

	pub fn parents(&self, key: &TypeKey) -> PolymorphicResult<&[TypeKey]> {
		Ok(self.entity(key)?.parents())
	}

	/// Types declaring `key` as a direct parent
	pub fn children(&self, key: &TypeKey) -> &[TypeKey] {
		self.children.get(key).map(Vec::as_slice).unwrap_or_default()
	}

	/// Nearest non-abstract parent, looking through abstract ancestors
	pub fn row_parent(&self, key: &TypeKey) -> PolymorphicResult<Option<&EntityType>> {
		let mut queue: VecDeque<&TypeKey> = self.entity(key)?.parents().iter().collect();
		while let Some(parent) = queue.pop_front() {
			let parent = self.entity(parent)?;
			if !parent.is_abstract() {
				return Ok(Some(parent));
			}
			queue.extend(parent.parents());
		}
		Ok(None)
	}

	/// Types whose row parent is `key`, in registration order
	pub fn row_children(&self, key: &TypeKey) -> PolymorphicResult<Vec<TypeKey>> {
		let mut found = IndexSet::new();
		let mut queue: VecDeque<&TypeKey> = self.children(key).iter().collect();
		while let Some(child) = queue.pop_front() {
			let entity = self.entity(child)?;
			if entity.is_abstract() {
				queue.extend(self.children(child));
				continue;
			}
			if self.row_parent(child)?.map(EntityType::key) == Some(key) {
				found.insert(child.clone());
			}
		}
		Ok(found.into_iter().collect())
	}

	/// The concrete type whose table stores rows of `key`
	pub fn concrete_model(&self, key: &TypeKey) -> PolymorphicResult<&EntityType> {
		let mut current = self.entity(key)?;
		loop {
			match current.kind() {
				EntityKind::Concrete => return Ok(current),
				EntityKind::Abstract => {
					return Err(PolymorphicError::InvalidArgument(format!(
						"abstract type {} has no rows",
						current.key()
					)));
				}
				EntityKind::Projection => {
					current = self.row_parent(current.key())?.ok_or_else(|| {
						PolymorphicError::InvalidArgument(format!(
							"projection {} has no row-bearing parent",
							current.key()
						))
					})?;
				}
			}
		}
	}

	/// Every type reachable through parent edges, nearest first
	pub fn ancestors(&self, key: &TypeKey) -> PolymorphicResult<Vec<TypeKey>> {
		let mut seen = IndexSet::new();
		let mut queue: VecDeque<&TypeKey> = self.entity(key)?.parents().iter().collect();
		while let Some(parent) = queue.pop_front() {
			if seen.insert(parent.clone()) {
				queue.extend(self.entity(parent)?.parents());
			}
		}
		Ok(seen.into_iter().collect())
	}

	pub fn is_subtype(&self, sub: &TypeKey, sup: &TypeKey) -> bool {
		sub == sup
			|| self
				.ancestors(sub)
				.map(|ancestors| ancestors.contains(sup))
				.unwrap_or(false)
	}

	/// `key` followed by every type below it through row edges, breadth first
	pub fn subtree(&self, key: &TypeKey) -> PolymorphicResult<Vec<TypeKey>> {
		self.entity(key)?;
		let mut seen = IndexSet::new();
		let mut queue = VecDeque::from([key.clone()]);
		while let Some(current) = queue.pop_front() {
			if seen.insert(current.clone()) {
				queue.extend(self.row_children(&current)?);
			}
		}
		Ok(seen.into_iter().collect())
	}

	/// Name of the discriminator field, declared on `key` or inherited
	pub fn discriminator_field(&self, key: &TypeKey) -> PolymorphicResult<Option<String>> {
		let entity = self.entity(key)?;
		if let Some(field) = entity.declared_discriminator() {
			return Ok(Some(field.to_string()));
		}
		for ancestor in self.ancestors(key)? {
			if let Some(field) = self.entity(&ancestor)?.declared_discriminator() {
				return Ok(Some(field.to_string()));
			}
		}
		Ok(None)
	}

	/// Storage column of the discriminator field
	pub fn discriminator_column(&self, key: &TypeKey) -> PolymorphicResult<String> {
		let name = self.discriminator_field(key)?.ok_or_else(|| {
			PolymorphicError::ImproperlyConfigured(format!("{} declares no discriminator field", key))
		})?;
		let field = self
			.all_fields(key)?
			.into_iter()
			.find(|field| field.name == name)
			.ok_or_else(|| {
				PolymorphicError::ImproperlyConfigured(format!(
					"discriminator of {} points to an inexistent field '{}'",
					key, name
				))
			})?;
		if field.kind != FieldKind::ContentType {
			return Err(PolymorphicError::ImproperlyConfigured(format!(
				"discriminator '{}' of {} is not a content type reference",
				name, key
			)));
		}
		Ok(field.column())
	}

	/// Declared fields of `key` and its ancestors, ancestors first
	pub fn all_fields(&self, key: &TypeKey) -> PolymorphicResult<Vec<FieldDef>> {
		let mut chain = self.ancestors(key)?;
		chain.reverse();
		chain.push(key.clone());

		let mut fields: IndexMap<String, FieldDef> = IndexMap::new();
		for ty in &chain {
			for field in self.entity(ty)?.fields() {
				fields.entry(field.name.clone()).or_insert_with(|| field.clone());
			}
		}
		Ok(fields.into_values().collect())
	}

	/// Fields stored in the table of `key` itself
	///
	/// Abstract ancestors contribute their fields to the first concrete table
	/// below them. Projections store nothing.
	pub fn table_fields(&self, key: &TypeKey) -> PolymorphicResult<Vec<FieldDef>> {
		let entity = self.entity(key)?;
		match entity.kind() {
			EntityKind::Projection => return Ok(Vec::new()),
			EntityKind::Abstract => {
				return Err(PolymorphicError::InvalidArgument(format!(
					"abstract type {} has no table",
					key
				)));
			}
			EntityKind::Concrete => {}
		}

		let mut abstract_chain = Vec::new();
		let mut queue: VecDeque<&TypeKey> = entity.parents().iter().collect();
		while let Some(parent) = queue.pop_front() {
			let parent = self.entity(parent)?;
			if parent.is_abstract() {
				abstract_chain.push(parent);
				queue.extend(parent.parents());
			}
		}

		let mut fields: IndexMap<String, FieldDef> = IndexMap::new();
		for ty in abstract_chain.iter().rev().copied().chain(std::iter::once(entity)) {
			for field in ty.fields() {
				fields.entry(field.name.clone()).or_insert_with(|| field.clone());
			}
		}
		Ok(fields.into_values().collect())
	}

	/// Primary key column of the table storing `key`
	///
	/// Roots use the configured pk field; children are keyed by their parent
	/// link (`animal_ptr_id`).
	pub fn pk_column(&self, key: &TypeKey, settings: &PolymodelsSettings) -> PolymorphicResult<String> {
		let concrete = self.concrete_model(key)?;
		match self.row_parent(concrete.key())? {
			None => Ok(settings.pk_field.clone()),
			Some(parent) => {
				let parent = self.concrete_model(parent.key())?;
				Ok(format!("{}_id", settings.ptr_field(parent.link_name())))
			}
		}
	}

	pub fn table_name(&self, key: &TypeKey) -> PolymorphicResult<String> {
		Ok(self.concrete_model(key)?.table_name())
	}
}
