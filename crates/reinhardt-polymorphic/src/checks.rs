//! System checks for polymorphic model declarations

use crate::error::PolymorphicResult;
use crate::graph::TypeGraph;
use crate::model::{FieldKind, TypeKey};
use crate::registry::PolymorphicRegistry;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckLevel {
	Debug,
	Info,
	Warning,
	Error,
	Critical,
}

/// A problem found by a system check, identified by a stable id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckMessage {
	pub level: CheckLevel,
	pub id: String,
	pub message: String,
	pub hint: Option<String>,
	pub obj: Option<String>,
}

impl CheckMessage {
	pub fn new(level: CheckLevel, id: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			level,
			id: id.into(),
			message: message.into(),
			hint: None,
			obj: None,
		}
	}

	pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
		Self::new(CheckLevel::Error, id, message)
	}

	pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
		self.hint = Some(hint.into());
		self
	}

	pub fn with_obj(mut self, obj: impl Into<String>) -> Self {
		self.obj = Some(obj.into());
		self
	}

	pub fn is_serious(&self) -> bool {
		self.level >= CheckLevel::Error
	}
}

impl fmt::Display for CheckMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(obj) = &self.obj {
			write!(f, "{}: ", obj)?;
		}
		write!(f, "({}) {}", self.id, self.message)?;
		if let Some(hint) = &self.hint {
			write!(f, "\n\tHINT: {}", hint)?;
		}
		Ok(())
	}
}

/// Check the discriminator declaration of a single type
///
/// - `polymodels.E001`: no discriminator field is declared on the type or its ancestors
/// - `polymodels.E002`: the discriminator names a field that does not exist
/// - `polymodels.E003`: the discriminator field is not a content type reference
pub fn check_type(graph: &TypeGraph, key: &TypeKey) -> PolymorphicResult<Vec<CheckMessage>> {
	let mut errors = Vec::new();
	let Some(name) = graph.discriminator_field(key)? else {
		errors.push(
			CheckMessage::error(
				"polymodels.E001",
				"Polymorphic types must declare a discriminator field.",
			)
			.with_obj(key.to_string()),
		);
		return Ok(errors);
	};

	match graph.all_fields(key)?.into_iter().find(|f| f.name == name) {
		None => errors.push(
			CheckMessage::error(
				"polymodels.E002",
				format!("The discriminator points to an inexistent field '{}'.", name),
			)
			.with_obj(key.to_string()),
		),
		Some(field) if field.kind != FieldKind::ContentType => errors.push(
			CheckMessage::error(
				"polymodels.E003",
				format!("`{}` must be a reference to a content type.", name),
			)
			.with_obj(format!("{}.{}", key, name)),
		),
		Some(_) => {}
	}
	Ok(errors)
}

/// Run [`check_type`] against a registered type
pub fn check_model(registry: &PolymorphicRegistry, key: &TypeKey) -> PolymorphicResult<Vec<CheckMessage>> {
	registry.with_graph(|graph| check_type(graph, key))
}

/// Check every non-abstract registered type
pub fn check_all(registry: &PolymorphicRegistry) -> PolymorphicResult<Vec<CheckMessage>> {
	registry.with_graph(|graph| -> PolymorphicResult<Vec<CheckMessage>> {
		let mut messages = Vec::new();
		for entity in graph.all_types().filter(|e| !e.is_abstract()) {
			messages.extend(check_type(graph, entity.key())?);
		}
		Ok(messages)
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{EntityType, FieldDef};
	use rstest::rstest;

	fn register(entity: EntityType) -> (PolymorphicRegistry, TypeKey) {
		let registry = PolymorphicRegistry::new();
		let key = entity.key().clone();
		registry.register(entity).unwrap();
		(registry, key)
	}

	#[rstest]
	fn test_missing_discriminator() {
		let (registry, key) = register(EntityType::concrete("checks", "NoField"));
		let messages = check_model(&registry, &key).unwrap();
		assert_eq!(messages.len(), 1);
		assert_eq!(messages[0].id, "polymodels.E001");
	}

	#[rstest]
	fn test_inexistent_discriminator_field() {
		let (registry, key) =
			register(EntityType::concrete("checks", "Inexistent").with_discriminator("missing"));
		let messages = check_model(&registry, &key).unwrap();
		assert_eq!(messages[0].id, "polymodels.E002");
		assert!(messages[0].message.contains("'missing'"));
	}

	#[rstest]
	#[case(FieldDef::scalar("kind"))]
	#[case(FieldDef::foreign_key("kind", TypeKey::new("checks", "Other")))]
	fn test_discriminator_must_reference_content_type(#[case] field: FieldDef) {
		let (registry, key) = register(
			EntityType::concrete("checks", "Invalid")
				.with_field(field)
				.with_discriminator("kind"),
		);
		let messages = check_model(&registry, &key).unwrap();
		assert_eq!(messages[0].id, "polymodels.E003");
		assert_eq!(messages[0].obj.as_deref(), Some("checks.invalid.kind"));
	}

	#[rstest]
	fn test_valid_declaration_is_silent() {
		let (registry, key) = register(
			EntityType::concrete("checks", "Valid")
				.with_field(FieldDef::content_type("content_type"))
				.with_discriminator("content_type"),
		);
		assert!(check_all(&registry).unwrap().is_empty());
		assert!(check_model(&registry, &key).unwrap().is_empty());
	}

	#[rstest]
	fn test_display_includes_id_and_hint() {
		let message = CheckMessage::error("polymodels.E001", "missing")
			.with_obj("zoo.animal")
			.with_hint("declare one");
		assert_eq!(
			message.to_string(),
			"zoo.animal: (polymodels.E001) missing\n\tHINT: declare one"
		);
	}
}
