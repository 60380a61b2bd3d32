//! Type casting
//!
//! Casting narrows an instance of a broad type to one of its descendants by
//! following the descendant's accessor: every join attribute of the path is
//! dereferenced (from the related cache when the row was eager-loaded,
//! otherwise through a single-row load) and a projection, if any, is applied as
//! a plain relabelling of the same fields.

use crate::discriminator::DiscriminatorRegistry;
use crate::engine::{QueryEngine, RowRequest};
use crate::error::{PolymorphicError, PolymorphicResult};
use crate::instance::ModelInstance;
use crate::model::{PolymorphicModel, TypeKey};
use crate::registry::PolymorphicRegistry;
use serde::de::DeserializeOwned;
use std::sync::Arc;

struct Hop {
	attribute: String,
	model: TypeKey,
	table: String,
	pk_column: String,
}

/// Casts instances using the registry's accessors
#[derive(Clone)]
pub struct TypeCaster {
	registry: Arc<PolymorphicRegistry>,
	discriminators: Arc<dyn DiscriminatorRegistry>,
	engine: Arc<dyn QueryEngine>,
}

impl TypeCaster {
	pub fn new(
		registry: Arc<PolymorphicRegistry>,
		discriminators: Arc<dyn DiscriminatorRegistry>,
		engine: Arc<dyn QueryEngine>,
	) -> Self {
		Self {
			registry,
			discriminators,
			engine,
		}
	}

	pub fn registry(&self) -> &Arc<PolymorphicRegistry> {
		&self.registry
	}

	pub fn discriminators(&self) -> &Arc<dyn DiscriminatorRegistry> {
		&self.discriminators
	}

	pub fn engine(&self) -> &Arc<dyn QueryEngine> {
		&self.engine
	}

	/// Type named by the instance's own discriminator
	pub async fn discriminator_target(&self, instance: &ModelInstance) -> PolymorphicResult<TypeKey> {
		let column = self
			.registry
			.with_graph(|graph| graph.discriminator_column(instance.model()))?;
		let value = instance
			.get_i64(&column)
			.ok_or_else(|| PolymorphicError::MissingDiscriminator(instance.model().clone()))?;
		self.discriminators
			.type_of_discriminator(value)
			.await?
			.ok_or(PolymorphicError::UnknownDiscriminator(value))
	}

	/// Cast `instance` to `target`, or to its discriminator's type when `None`
	///
	/// Prefetched objects of `instance` are carried over when `with_prefetched`
	/// is set and dropped otherwise. Casting to the instance's own type
	/// returns it unchanged.
	pub async fn cast(
		&self,
		mut instance: ModelInstance,
		target: Option<&TypeKey>,
		with_prefetched: bool,
	) -> PolymorphicResult<ModelInstance> {
		let target = match target {
			Some(target) => target.clone(),
			None => self.discriminator_target(&instance).await?,
		};
		if &target == instance.model() {
			return Ok(instance);
		}

		let accessors = self.registry.accessors(instance.model())?;
		let accessor = accessors.get(&target)?;
		let settings = self.registry.settings();
		let hops = self.registry.with_graph(|graph| {
			accessor
				.path()
				.iter()
				.zip(accessor.path_types())
				.map(|(attribute, model)| {
					Ok(Hop {
						attribute: attribute.clone(),
						model: model.clone(),
						table: graph.table_name(model)?,
						pk_column: graph.pk_column(model, settings)?,
					})
				})
				.collect::<PolymorphicResult<Vec<_>>>()
		})?;

		let prefetched = instance.take_prefetched();
		let mut current = instance;
		for hop in hops {
			let child = match current.take_related(&hop.attribute) {
				Some(Some(child)) => child,
				Some(None) => return Err(does_not_exist(&target, &hop, &current)),
				None => {
					let pk = current
						.get(&settings.pk_field)
						.cloned()
						.ok_or_else(|| does_not_exist(&target, &hop, &current))?;
					let request = RowRequest {
						model: hop.model.clone(),
						table: hop.table.clone(),
						pk_column: hop.pk_column.clone(),
						pk,
					};
					tracing::trace!(model = %hop.model, table = %hop.table, "loading joined row for cast");
					match self.engine.load_row(&request).await? {
						Some(row) => ModelInstance::from_row(hop.model.clone(), row),
						None => return Err(does_not_exist(&target, &hop, &current)),
					}
				}
			};
			tracing::trace!(from = %current.model(), to = %child.model(), "cast hop");
			current = current.descend(child);
		}

		if let Some(projection) = accessor.projection() {
			current = current.project(projection.clone());
		}
		if with_prefetched {
			current.merge_prefetched(prefetched);
		}
		Ok(current)
	}

	/// Cast to `T`'s type and deserialize
	pub async fn cast_as<T>(&self, instance: ModelInstance) -> PolymorphicResult<T>
	where
		T: PolymorphicModel + DeserializeOwned,
	{
		let cast = self.cast(instance, Some(&T::type_key()), false).await?;
		Ok(cast.into_model()?)
	}
}

fn does_not_exist(target: &TypeKey, hop: &Hop, parent: &ModelInstance) -> PolymorphicError {
	PolymorphicError::DoesNotExist {
		target: target.clone(),
		detail: format!(
			"{} has no {} row ({})",
			parent.model(),
			hop.attribute,
			hop.model
		),
	}
}
