//! Discriminator values
//!
//! A discriminator is the persistable identity of a type, stored on every row
//! of a polymorphic family. [`ContentTypeManager`] provides them as content
//! type ids.

use crate::error::{PolymorphicError, PolymorphicResult};
use crate::model::TypeKey;
use async_trait::async_trait;
use indexmap::IndexMap;
use reinhardt_contenttypes::{ContentType, ContentTypeManager, PersistenceError};

#[async_trait]
pub trait DiscriminatorRegistry: Send + Sync {
	async fn discriminator_of(&self, ty: &TypeKey) -> PolymorphicResult<i64>;

	/// Bulk form of [`discriminator_of`](Self::discriminator_of), in the order of `types`
	async fn discriminators_of(&self, types: &[TypeKey]) -> PolymorphicResult<IndexMap<TypeKey, i64>>;

	async fn type_of_discriminator(&self, value: i64) -> PolymorphicResult<Option<TypeKey>>;
}

fn content_type_id(ct: &ContentType) -> PolymorphicResult<i64> {
	ct.id
		.ok_or_else(|| PersistenceError::NotFound(format!("unsaved content type {}", ct.qualified_name())).into())
}

#[async_trait]
impl DiscriminatorRegistry for ContentTypeManager {
	async fn discriminator_of(&self, ty: &TypeKey) -> PolymorphicResult<i64> {
		let ct = self.get_for_model(ty.app_label(), ty.model_name()).await?;
		content_type_id(&ct)
	}

	async fn discriminators_of(&self, types: &[TypeKey]) -> PolymorphicResult<IndexMap<TypeKey, i64>> {
		let keys: Vec<(String, String)> = types
			.iter()
			.map(|ty| (ty.app_label().to_string(), ty.model_name().to_string()))
			.collect();
		let cts = self.get_for_models(&keys).await?;
		types
			.iter()
			.zip(&cts)
			.map(|(ty, ct)| Ok((ty.clone(), content_type_id(ct)?)))
			.collect()
	}

	async fn type_of_discriminator(&self, value: i64) -> PolymorphicResult<Option<TypeKey>> {
		Ok(self
			.get_for_id(value)
			.await?
			.map(|ct| TypeKey::new(ct.app_label, ct.model)))
	}
}

/// Resolve the discriminator values of `types`, failing on an unknown value
pub(crate) async fn discriminator_values(
	discriminators: &dyn DiscriminatorRegistry,
	types: &[TypeKey],
) -> PolymorphicResult<Vec<i64>> {
	let values = discriminators.discriminators_of(types).await?;
	types
		.iter()
		.map(|ty| {
			values
				.get(ty)
				.copied()
				.ok_or_else(|| PolymorphicError::UnknownType(ty.clone()))
		})
		.collect()
}
