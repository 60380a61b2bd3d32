//! Polymorphic querysets
//!
//! A [`PolymorphicQuerySet`] is a lazy description of a query over a root type.
//! [`select_subclasses`](PolymorphicQuerySet::select_subclasses) restricts the
//! rows to a set of descendant types through the discriminator column, asks the
//! engine to eager-load the parent links leading to them and makes every
//! fetched row come back cast to its own type.

use crate::cast::TypeCaster;
use crate::discriminator::{DiscriminatorRegistry, discriminator_values};
use crate::engine::QueryEngine;
use crate::error::{PolymorphicError, PolymorphicResult};
use crate::instance::ModelInstance;
use crate::graph::TypeGraph;
use crate::model::{EntityKind, FieldDef, PolymorphicModel, TypeKey};
use crate::registry::PolymorphicRegistry;
use crate::settings::PolymodelsSettings;
use futures::stream::{self, BoxStream, StreamExt};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
	Eq,
	Ne,
	Gt,
	Gte,
	Lt,
	Lte,
	In,
	NotIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
	String(String),
	Integer(i64),
	Float(f64),
	Boolean(bool),
	Null,
	Integers(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
	pub field: String,
	pub operator: FilterOperator,
	pub value: FilterValue,
}

impl Filter {
	pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
		Self {
			field: field.into(),
			operator,
			value,
		}
	}

	pub fn eq(field: impl Into<String>, value: FilterValue) -> Self {
		Self::new(field, FilterOperator::Eq, value)
	}
}

/// One parent-link join of an eager-load lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
	/// Join attributes from the root up to and including this hop
	pub path: Vec<String>,
	pub model: TypeKey,
	pub table: String,
	pub pk_column: String,
}

impl JoinSpec {
	/// Join attribute of this hop
	pub fn attribute(&self) -> &str {
		self.path.last().map(String::as_str).unwrap_or_default()
	}

	/// Path of the instance this hop hangs off; empty for the root
	pub fn parent_path(&self) -> &[String] {
		&self.path[..self.path.len().saturating_sub(1)]
	}

	pub fn alias(&self) -> String {
		self.path.join("__")
	}
}

/// Table of an ancestor joined into every row of the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
	pub model: TypeKey,
	pub table: String,
	pub pk_column: String,
	/// Columns stored in `table`
	pub columns: Vec<String>,
}

/// Engine-facing description of a polymorphic query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
	pub model: TypeKey,
	pub table: String,
	pub pk_column: String,
	/// Columns stored in `table`
	pub columns: Vec<String>,
	/// Tables of the root's ancestors, nearest first
	pub parents: Vec<TableRef>,
	pub filters: Vec<Filter>,
	/// Eager-load lookups, in request order
	pub select_related: Vec<String>,
	/// One entry per distinct hop of `select_related`, parents before children
	pub joins: Vec<JoinSpec>,
	pub prefetch_related: Vec<String>,
	/// Field names; a leading `-` sorts descending
	pub order_by: Vec<String>,
	pub limit: Option<usize>,
	pub offset: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum DiscriminatorFilter {
	In(Vec<TypeKey>),
	Exact(TypeKey),
}

/// Primary key column followed by the columns of the fields stored in `key`'s table
pub(crate) fn table_columns(
	graph: &TypeGraph,
	key: &TypeKey,
	settings: &PolymodelsSettings,
) -> PolymorphicResult<Vec<String>> {
	let mut columns = vec![graph.pk_column(key, settings)?];
	columns.extend(graph.table_fields(key)?.iter().map(FieldDef::column));
	Ok(columns)
}

/// Lazily evaluated polymorphic query
#[derive(Clone)]
pub struct PolymorphicQuerySet {
	caster: TypeCaster,
	model: TypeKey,
	discriminator_column: String,
	filters: Vec<Filter>,
	discriminator_filters: Vec<DiscriminatorFilter>,
	select_related: Vec<String>,
	prefetch_related: Vec<String>,
	order_by: Vec<String>,
	limit: Option<usize>,
	offset: Option<usize>,
	cast: bool,
}

impl PolymorphicQuerySet {
	/// Open a queryset over `model`
	///
	/// A queryset over a projection only sees rows of that projection's own
	/// subtree.
	pub fn new(caster: TypeCaster, model: TypeKey) -> PolymorphicResult<Self> {
		let (discriminator_column, kind) = caster.registry().with_graph(|graph| {
			let entity = graph.entity(&model)?;
			let column = graph.discriminator_column(&model)?;
			graph.concrete_model(&model)?;
			Ok::<_, PolymorphicError>((column, entity.kind()))
		})?;

		let mut queryset = Self {
			caster,
			model,
			discriminator_column,
			filters: Vec::new(),
			discriminator_filters: Vec::new(),
			select_related: Vec::new(),
			prefetch_related: Vec::new(),
			order_by: Vec::new(),
			limit: None,
			offset: None,
			cast: false,
		};
		if kind == EntityKind::Projection {
			let subtree = queryset.accessors()?.types().cloned().collect();
			queryset
				.discriminator_filters
				.push(DiscriminatorFilter::In(subtree));
		}
		Ok(queryset)
	}

	pub fn model(&self) -> &TypeKey {
		&self.model
	}

	pub fn is_casting(&self) -> bool {
		self.cast
	}

	fn registry(&self) -> &Arc<PolymorphicRegistry> {
		self.caster.registry()
	}

	fn accessors(&self) -> PolymorphicResult<Arc<crate::accessor::AccessorMap>> {
		self.registry().accessors(&self.model)
	}

	/// Restrict to `types` and their descendants and cast every row
	///
	/// With no types every descendant of the root is selected. A type outside
	/// the root's subtree is rejected before anything is fetched.
	pub fn select_subclasses(mut self, types: &[TypeKey]) -> PolymorphicResult<Self> {
		let accessors = self.accessors()?;
		let allowed: IndexSet<TypeKey> = if types.is_empty() {
			accessors.types().cloned().collect()
		} else {
			let mut allowed = IndexSet::new();
			for ty in types {
				if !accessors.contains(ty) {
					return Err(PolymorphicError::InvalidArgument(format!(
						"{} is not a subclass of {}",
						ty, self.model
					)));
				}
				allowed.extend(self.registry().accessors(ty)?.types().cloned());
			}
			allowed
		};

		for lookup in accessors.related_lookups_for(&allowed) {
			if !self.select_related.contains(&lookup) {
				self.select_related.push(lookup);
			}
		}
		self.discriminator_filters
			.push(DiscriminatorFilter::In(allowed.into_iter().collect()));
		self.cast = true;
		Ok(self)
	}

	/// Only rows whose discriminator is the root type itself
	pub fn exclude_subclasses(mut self) -> Self {
		self.discriminator_filters
			.push(DiscriminatorFilter::Exact(self.model.clone()));
		self
	}

	/// Add a filter on a column of the root or one of its ancestors
	///
	/// Filters are combined with AND, after the discriminator filters.
	///
	/// # Examples
	///
	/// ```
	/// use futures::executor::block_on;
	/// use reinhardt_polymodels_test::{Zoo, zoo};
	/// use reinhardt_polymorphic::{Filter, FilterOperator, FilterValue};
	///
	/// let zoo_env = Zoo::new();
	/// let long = Filter::new("length", FilterOperator::Gte, FilterValue::Integer(10));
	/// let snakes = zoo_env
	///     .manager
	///     .queryset(&zoo::snake())
	///     .unwrap()
	///     .filter(long.clone())
	///     .order_by(&["-length", "name"]);
	///
	/// let plan = block_on(snakes.plan()).unwrap();
	/// assert_eq!(plan.filters, [long]);
	/// assert_eq!(plan.order_by, ["-length", "name"]);
	/// ```
	pub fn filter(mut self, filter: Filter) -> Self {
		self.filters.push(filter);
		self
	}

	/// Load the named relations in a second pass after the main query
	///
	/// Casting waits until that pass has filled the base-typed instances.
	pub fn prefetch_related(mut self, lookups: &[&str]) -> Self {
		self.prefetch_related
			.extend(lookups.iter().map(|lookup| lookup.to_string()));
		self
	}

	/// Order by `fields`; a leading `-` sorts descending
	pub fn order_by(mut self, fields: &[&str]) -> Self {
		self.order_by = fields.iter().map(|field| field.to_string()).collect();
		self
	}

	pub fn limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}

	pub fn offset(mut self, offset: usize) -> Self {
		self.offset = Some(offset);
		self
	}

	/// Resolve discriminator filters and join specs into a [`QueryPlan`]
	pub async fn plan(&self) -> PolymorphicResult<QueryPlan> {
		let mut filters = Vec::with_capacity(self.filters.len() + self.discriminator_filters.len());
		for discriminator in &self.discriminator_filters {
			let filter = match discriminator {
				DiscriminatorFilter::In(types) => {
					let values = discriminator_values(self.discriminators().as_ref(), types).await?;
					Filter::new(
						&self.discriminator_column,
						FilterOperator::In,
						FilterValue::Integers(values),
					)
				}
				DiscriminatorFilter::Exact(ty) => Filter::eq(
					&self.discriminator_column,
					FilterValue::Integer(self.discriminators().discriminator_of(ty).await?),
				),
			};
			filters.push(filter);
		}
		filters.extend(self.filters.iter().cloned());

		let accessors = self.accessors()?;
		let settings = self.registry().settings();
		self.registry().with_graph(|graph| -> PolymorphicResult<QueryPlan> {
			let root = graph.concrete_model(&self.model)?;

			let mut parents = Vec::new();
			let mut current = graph.row_parent(root.key())?;
			while let Some(parent) = current {
				parents.push(TableRef {
					model: parent.key().clone(),
					table: graph.table_name(parent.key())?,
					pk_column: graph.pk_column(parent.key(), settings)?,
					columns: table_columns(graph, parent.key(), settings)?,
				});
				current = graph.row_parent(parent.key())?;
			}

			let mut joins: Vec<JoinSpec> = Vec::new();
			for lookup in &self.select_related {
				let accessor = accessors
					.iter()
					.map(|(_, accessor)| accessor)
					.find(|accessor| accessor.lookup() == lookup)
					.ok_or_else(|| {
						PolymorphicError::InvalidArgument(format!(
							"'{}' is not a subclass lookup of {}",
							lookup, self.model
						))
					})?;
				for (depth, model) in accessor.path_types().iter().enumerate() {
					let path = accessor.path()[..=depth].to_vec();
					if joins.iter().any(|join| join.path == path) {
						continue;
					}
					joins.push(JoinSpec {
						path,
						model: model.clone(),
						table: graph.table_name(model)?,
						pk_column: graph.pk_column(model, settings)?,
					});
				}
			}

			Ok(QueryPlan {
				model: self.model.clone(),
				table: root.table_name(),
				pk_column: graph.pk_column(root.key(), settings)?,
				columns: table_columns(graph, root.key(), settings)?,
				parents,
				filters,
				select_related: self.select_related.clone(),
				joins,
				prefetch_related: self.prefetch_related.clone(),
				order_by: self.order_by.clone(),
				limit: self.limit,
				offset: self.offset,
			})
		})
	}

	fn discriminators(&self) -> &Arc<dyn DiscriminatorRegistry> {
		self.caster.discriminators()
	}

	fn engine(&self) -> &Arc<dyn QueryEngine> {
		self.caster.engine()
	}

	/// Fetch rows and run the prefetch pass; casting is left to the caller
	async fn fetch_rows(&self) -> PolymorphicResult<Vec<ModelInstance>> {
		let plan = self.plan().await?;
		let mut rows = self.engine().fetch(&plan).await?;
		if !plan.prefetch_related.is_empty() {
			self.engine()
				.prefetch_related(&mut rows, &plan.prefetch_related)
				.await?;
		}
		Ok(rows)
	}

	/// Casting must wait for the prefetch pass so it can carry its results
	fn defers_cast(&self) -> bool {
		!self.prefetch_related.is_empty()
	}

	/// Evaluate the queryset
	pub async fn all(&self) -> PolymorphicResult<Vec<ModelInstance>> {
		let rows = self.fetch_rows().await?;
		if !self.cast {
			return Ok(rows);
		}
		let with_prefetched = self.defers_cast();
		let mut cast = Vec::with_capacity(rows.len());
		for row in rows {
			cast.push(self.caster.cast(row, None, with_prefetched).await?);
		}
		Ok(cast)
	}

	/// Evaluate lazily, casting each row as it is yielded
	pub fn stream(&self) -> BoxStream<'static, PolymorphicResult<ModelInstance>> {
		let queryset = self.clone();
		let caster = self.caster.clone();
		let cast = self.cast;
		let with_prefetched = self.defers_cast();

		stream::once(async move { queryset.fetch_rows().await })
			.flat_map(|result| match result {
				Ok(rows) => stream::iter(rows.into_iter().map(Ok)).boxed(),
				Err(err) => stream::iter([Err(err)]).boxed(),
			})
			.then(move |row| {
				let caster = caster.clone();
				async move {
					match row {
						Ok(row) if cast => caster.cast(row, None, with_prefetched).await,
						other => other,
					}
				}
			})
			.boxed()
	}

	pub async fn first(&self) -> PolymorphicResult<Option<ModelInstance>> {
		Ok(self.clone().limit(1).all().await?.into_iter().next())
	}

	/// Exactly one row
	pub async fn get(&self) -> PolymorphicResult<ModelInstance> {
		let mut rows = self.all().await?;
		match rows.len() {
			1 => Ok(rows.remove(0)),
			0 => Err(PolymorphicError::DoesNotExist {
				target: self.model.clone(),
				detail: "query returned no rows".to_string(),
			}),
			count => Err(PolymorphicError::MultipleObjectsReturned {
				model: self.model.clone(),
				count,
			}),
		}
	}

	pub async fn count(&self) -> PolymorphicResult<usize> {
		let plan = self.plan().await?;
		Ok(self.engine().count(&plan).await?)
	}
}

/// Entry point for polymorphic queries and hooks over one set of collaborators
#[derive(Clone)]
pub struct PolymorphicManager {
	caster: TypeCaster,
}

impl PolymorphicManager {
	pub fn new(
		registry: Arc<PolymorphicRegistry>,
		discriminators: Arc<dyn DiscriminatorRegistry>,
		engine: Arc<dyn QueryEngine>,
	) -> Self {
		Self {
			caster: TypeCaster::new(registry, discriminators, engine),
		}
	}

	pub fn caster(&self) -> &TypeCaster {
		&self.caster
	}

	pub fn registry(&self) -> &Arc<PolymorphicRegistry> {
		self.caster.registry()
	}

	pub fn queryset(&self, model: &TypeKey) -> PolymorphicResult<PolymorphicQuerySet> {
		PolymorphicQuerySet::new(self.caster.clone(), model.clone())
	}

	/// Queryset over the type bound to `T`
	pub fn objects<T: PolymorphicModel>(&self) -> PolymorphicResult<PolymorphicQuerySet> {
		self.queryset(&T::type_key())
	}

	/// Filter matching rows whose discriminator is one of `types`, or `model` itself when empty
	///
	/// `query_name` defaults to the discriminator column of `model`.
	pub async fn content_type_lookup(
		&self,
		model: &TypeKey,
		types: &[TypeKey],
		query_name: Option<&str>,
	) -> PolymorphicResult<Filter> {
		let field = match query_name {
			Some(name) => name.to_string(),
			None => self
				.registry()
				.with_graph(|graph| graph.discriminator_column(model))?,
		};
		let discriminators = self.caster.discriminators();
		if types.is_empty() {
			let value = discriminators.discriminator_of(model).await?;
			return Ok(Filter::eq(field, FilterValue::Integer(value)));
		}
		let values = discriminator_values(discriminators.as_ref(), types).await?;
		Ok(Filter::new(field, FilterOperator::In, FilterValue::Integers(values)))
	}

	/// Filter matching `model` and all of its descendants
	pub async fn subclasses_lookup(
		&self,
		model: &TypeKey,
		query_name: Option<&str>,
	) -> PolymorphicResult<Filter> {
		let types: Vec<TypeKey> = self.registry().accessors(model)?.types().cloned().collect();
		self.content_type_lookup(model, &types, query_name).await
	}

	/// Pre-insert hook: fill an unset discriminator from the instance's type
	pub async fn prepare_insert(&self, instance: &mut ModelInstance) -> PolymorphicResult<()> {
		let column = self
			.registry()
			.with_graph(|graph| graph.discriminator_column(instance.model()))?;
		if instance.is_unset(&column) {
			let value = self
				.caster
				.discriminators()
				.discriminator_of(instance.model())
				.await?;
			instance.set(column, value);
		}
		Ok(())
	}
}
