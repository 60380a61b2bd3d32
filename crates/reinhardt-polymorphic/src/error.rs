//! Error types for polymorphic resolution, casting and querying

use crate::model::TypeKey;
use reinhardt_contenttypes::PersistenceError;

/// Failures raised by the query engine backing a polymorphic queryset
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
	#[error("Query error: {0}")]
	Query(String),

	#[error("Connection error: {0}")]
	Connection(String),

	#[error("Operation cancelled")]
	Cancelled,

	#[error(transparent)]
	Persistence(#[from] PersistenceError),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PolymorphicError {
	#[error("Unknown type: {0}")]
	UnknownType(TypeKey),

	#[error("Type already registered: {0}")]
	AlreadyRegistered(TypeKey),

	/// An accessor was requested for a type outside the root's subtree
	#[error("{target} is not a subclass of {root}")]
	UnrelatedType { root: TypeKey, target: TypeKey },

	/// A joined row required to cast an instance is missing
	#[error("{target} matching query does not exist ({detail})")]
	DoesNotExist { target: TypeKey, detail: String },

	#[error("get() returned more than one {model} -- it returned {count}")]
	MultipleObjectsReturned { model: TypeKey, count: usize },

	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	#[error("Improperly configured: {0}")]
	ImproperlyConfigured(String),

	#[error("Instance of {0} has no discriminator value")]
	MissingDiscriminator(TypeKey),

	#[error("No registered type for discriminator {0}")]
	UnknownDiscriminator(i64),

	#[error("Deserialization error: {0}")]
	Deserialization(#[from] serde_json::Error),

	#[error(transparent)]
	Storage(#[from] StorageError),
}

impl From<PersistenceError> for PolymorphicError {
	fn from(err: PersistenceError) -> Self {
		Self::Storage(StorageError::Persistence(err))
	}
}

pub type PolymorphicResult<T> = Result<T, PolymorphicError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_persistence_error_surfaces_as_storage() {
		let err: PolymorphicError = PersistenceError::Cancelled.into();
		assert!(matches!(
			err,
			PolymorphicError::Storage(StorageError::Persistence(PersistenceError::Cancelled))
		));
	}

	#[rstest]
	fn test_does_not_exist_names_target() {
		let err = PolymorphicError::DoesNotExist {
			target: TypeKey::new("zoo", "Monkey"),
			detail: "no zoo.monkey row for pk 3".to_string(),
		};
		assert!(err.to_string().starts_with("zoo.monkey matching query does not exist"));
	}
}
