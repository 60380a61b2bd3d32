//! Entity type declarations
//!
//! An [`EntityType`] is a node of the type graph. It is declared once with its
//! parents, own fields and (on roots) the discriminator field, then handed to
//! [`PolymorphicRegistry::register`](crate::PolymorphicRegistry::register).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of an entity type
///
/// `model_name` is always lower-cased, matching the join attribute a parent
/// uses to reach a child's row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
	app_label: String,
	model_name: String,
}

impl TypeKey {
	/// Create a key; the model name is lower-cased
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::TypeKey;
	///
	/// let key = TypeKey::new("zoo", "BigSnake");
	/// assert_eq!(key.model_name(), "bigsnake");
	/// assert_eq!(key.to_string(), "zoo.bigsnake");
	/// ```
	pub fn new(app_label: impl Into<String>, model_name: impl AsRef<str>) -> Self {
		Self {
			app_label: app_label.into(),
			model_name: model_name.as_ref().to_lowercase(),
		}
	}

	/// Application the type belongs to
	pub fn app_label(&self) -> &str {
		&self.app_label
	}

	/// Lower-cased model name, also the join attribute from the parent
	pub fn model_name(&self) -> &str {
		&self.model_name
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.app_label, self.model_name)
	}
}

/// How a type relates to the rows of its parents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
	/// Owns a table; joined to its concrete parent one-to-one
	Concrete,
	/// Declares fields for its children but has no rows of its own
	Abstract,
	/// Reinterprets the row of its parent without a table or a join
	Projection,
}

/// Storage kind of a declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
	/// Plain column stored under the field name
	Scalar,
	/// Reference to a row of another entity type
	ForeignKey(TypeKey),
	/// Reference to a content type row; the only valid discriminator kind
	ContentType,
}

/// A field declared on an entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
	pub name: String,
	pub kind: FieldKind,
}

impl FieldDef {
	/// Declare a plain column
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::FieldDef;
	///
	/// let length = FieldDef::scalar("length");
	/// assert_eq!(length.column(), "length");
	/// assert!(!length.is_relation());
	/// ```
	pub fn scalar(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: FieldKind::Scalar,
		}
	}

	/// Declare a reference to `to`, stored as `<name>_id`
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::{FieldDef, FieldKind, TypeKey};
	///
	/// let keeper = FieldDef::foreign_key("keeper", TypeKey::new("zoo", "Keeper"));
	/// assert_eq!(keeper.column(), "keeper_id");
	/// assert_eq!(keeper.kind, FieldKind::ForeignKey(TypeKey::new("zoo", "keeper")));
	/// ```
	pub fn foreign_key(name: impl Into<String>, to: TypeKey) -> Self {
		Self {
			name: name.into(),
			kind: FieldKind::ForeignKey(to),
		}
	}

	/// Declare a content type reference, usable as a discriminator
	pub fn content_type(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind: FieldKind::ContentType,
		}
	}

	/// Storage column; relations are stored as `<name>_id`
	pub fn column(&self) -> String {
		match self.kind {
			FieldKind::Scalar => self.name.clone(),
			FieldKind::ForeignKey(_) | FieldKind::ContentType => format!("{}_id", self.name),
		}
	}

	/// Whether the field references another row
	pub fn is_relation(&self) -> bool {
		!matches!(self.kind, FieldKind::Scalar)
	}
}

/// Declaration of an entity type
///
/// # Examples
///
/// ```
/// use reinhardt_polymorphic::{EntityKind, EntityType, FieldDef};
///
/// let animal = EntityType::concrete("zoo", "Animal")
///     .with_field(FieldDef::scalar("name"))
///     .with_field(FieldDef::content_type("content_type"))
///     .with_discriminator("content_type");
/// let mammal = EntityType::concrete("zoo", "Mammal").with_parent(animal.key().clone());
///
/// assert_eq!(mammal.kind(), EntityKind::Concrete);
/// assert_eq!(animal.table_name(), "zoo_animal");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
	key: TypeKey,
	object_name: String,
	kind: EntityKind,
	parents: Vec<TypeKey>,
	fields: Vec<FieldDef>,
	discriminator_field: Option<String>,
	db_table: Option<String>,
}

impl EntityType {
	/// Declare a type of the given kind with no parents or fields
	pub fn new(app_label: impl Into<String>, object_name: impl Into<String>, kind: EntityKind) -> Self {
		let object_name = object_name.into();
		Self {
			key: TypeKey::new(app_label, &object_name),
			object_name,
			kind,
			parents: Vec::new(),
			fields: Vec::new(),
			discriminator_field: None,
			db_table: None,
		}
	}

	/// Declare a type owning a table
	pub fn concrete(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
		Self::new(app_label, object_name, EntityKind::Concrete)
	}

	/// Declare a type contributing fields only
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::{EntityType, FieldDef};
	///
	/// let reptile = EntityType::abstract_type("zoo", "Reptile").with_field(FieldDef::scalar("length"));
	/// assert!(reptile.is_abstract());
	/// assert_eq!(reptile.field("length"), Some(&FieldDef::scalar("length")));
	/// ```
	pub fn abstract_type(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
		Self::new(app_label, object_name, EntityKind::Abstract)
	}

	/// Declare a type reusing its parent's row
	pub fn projection(app_label: impl Into<String>, object_name: impl Into<String>) -> Self {
		Self::new(app_label, object_name, EntityKind::Projection)
	}

	/// Add a parent; abstract parents are expected before the row-bearing one
	pub fn with_parent(mut self, parent: TypeKey) -> Self {
		self.parents.push(parent);
		self
	}

	pub fn with_field(mut self, field: FieldDef) -> Self {
		self.fields.push(field);
		self
	}

	/// Name the field holding the discriminator; declared on roots only
	pub fn with_discriminator(mut self, field: impl Into<String>) -> Self {
		self.discriminator_field = Some(field.into());
		self
	}

	/// Override the default `<app_label>_<model_name>` table
	pub fn with_table(mut self, table: impl Into<String>) -> Self {
		self.db_table = Some(table.into());
		self
	}

	pub fn key(&self) -> &TypeKey {
		&self.key
	}

	pub fn object_name(&self) -> &str {
		&self.object_name
	}

	pub fn kind(&self) -> EntityKind {
		self.kind
	}

	pub fn is_abstract(&self) -> bool {
		self.kind == EntityKind::Abstract
	}

	pub fn is_projection(&self) -> bool {
		self.kind == EntityKind::Projection
	}

	pub fn parents(&self) -> &[TypeKey] {
		&self.parents
	}

	pub fn fields(&self) -> &[FieldDef] {
		&self.fields
	}

	pub fn field(&self, name: &str) -> Option<&FieldDef> {
		self.fields.iter().find(|f| f.name == name)
	}

	/// Discriminator named by this declaration, not inherited
	pub fn declared_discriminator(&self) -> Option<&str> {
		self.discriminator_field.as_deref()
	}

	/// Join attribute a parent uses to reach this type's row
	pub fn link_name(&self) -> &str {
		self.key.model_name()
	}

	/// Own table name; projections share their concrete model's table
	pub fn table_name(&self) -> String {
		self.db_table
			.clone()
			.unwrap_or_else(|| format!("{}_{}", self.key.app_label(), self.key.model_name()))
	}
}

/// Binds a Rust struct to a registered entity type
///
/// Implemented by the structs instances are deserialized into by
/// [`TypeCaster::cast_as`](crate::TypeCaster::cast_as).
pub trait PolymorphicModel {
	fn type_key() -> TypeKey;
}
