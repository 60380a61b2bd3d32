//! The zoo model family
//!
//! ```text
//! Animal
//! ├── Mammal
//! │   └── Monkey
//! └── (Reptile, abstract)
//!     └── Snake
//!         └── BigSnake (projection)
//!             └── HugeSnake (projection)
//! ```
//!
//! Keepers are plain rows of `zoo_keeper` pointing at an animal through
//! `animal_id`; they are reachable from any animal with the `keepers`
//! prefetch lookup.

use reinhardt_polymorphic::{EntityType, FieldDef, PolymorphicModel, TypeKey};
use serde::{Deserialize, Serialize};

pub const APP_LABEL: &str = "zoo";
pub const KEEPER_TABLE: &str = "zoo_keeper";
pub const KEEPERS_LOOKUP: &str = "keepers";

pub fn animal() -> TypeKey {
	TypeKey::new(APP_LABEL, "Animal")
}

pub fn mammal() -> TypeKey {
	TypeKey::new(APP_LABEL, "Mammal")
}

pub fn monkey() -> TypeKey {
	TypeKey::new(APP_LABEL, "Monkey")
}

pub fn reptile() -> TypeKey {
	TypeKey::new(APP_LABEL, "Reptile")
}

pub fn snake() -> TypeKey {
	TypeKey::new(APP_LABEL, "Snake")
}

pub fn big_snake() -> TypeKey {
	TypeKey::new(APP_LABEL, "BigSnake")
}

pub fn huge_snake() -> TypeKey {
	TypeKey::new(APP_LABEL, "HugeSnake")
}

pub fn keeper() -> TypeKey {
	TypeKey::new(APP_LABEL, "Keeper")
}

/// Entity types of the zoo, parents before children
pub fn zoo_types() -> Vec<EntityType> {
	vec![
		EntityType::concrete(APP_LABEL, "Animal")
			.with_field(FieldDef::scalar("name"))
			.with_field(FieldDef::content_type("content_type"))
			.with_discriminator("content_type"),
		EntityType::concrete(APP_LABEL, "Mammal").with_parent(animal()),
		EntityType::concrete(APP_LABEL, "Monkey").with_parent(mammal()),
		EntityType::abstract_type(APP_LABEL, "Reptile")
			.with_parent(animal())
			.with_field(FieldDef::scalar("length")),
		EntityType::concrete(APP_LABEL, "Snake")
			.with_parent(reptile())
			.with_field(FieldDef::scalar("color")),
		EntityType::projection(APP_LABEL, "BigSnake").with_parent(snake()),
		EntityType::projection(APP_LABEL, "HugeSnake").with_parent(big_snake()),
	]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
	pub id: i64,
	pub name: String,
	pub content_type_id: i64,
}

impl PolymorphicModel for Animal {
	fn type_key() -> TypeKey {
		animal()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mammal {
	pub id: i64,
	pub name: String,
	pub animal_ptr_id: i64,
}

impl PolymorphicModel for Mammal {
	fn type_key() -> TypeKey {
		mammal()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monkey {
	pub id: i64,
	pub name: String,
	pub mammal_ptr_id: i64,
}

impl PolymorphicModel for Monkey {
	fn type_key() -> TypeKey {
		monkey()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snake {
	pub id: i64,
	pub name: String,
	pub length: i64,
	pub color: String,
}

impl PolymorphicModel for Snake {
	fn type_key() -> TypeKey {
		snake()
	}
}

/// Same row as [`Snake`], read through the `BigSnake` projection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BigSnake {
	pub id: i64,
	pub name: String,
	pub length: i64,
}

impl PolymorphicModel for BigSnake {
	fn type_key() -> TypeKey {
		big_snake()
	}
}
