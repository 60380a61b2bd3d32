//! In-memory query engine
//!
//! [`MemoryEngine`] stores one map of rows per table, keyed by the shared
//! primary key of the polymorphic family, and executes [`QueryPlan`]s against
//! it the way a SQL backend would run the rendered statement. It counts the
//! queries, single-row loads and prefetch passes it serves so tests can assert
//! round trips.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use reinhardt_polymorphic::{
	Filter, FilterOperator, FilterValue, ModelInstance, PolymorphicError, PolymorphicRegistry,
	PolymorphicResult, QueryEngine, QueryPlan, Row, RowRequest, StorageError, TypeKey,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering as AtomicOrdering};

/// Reverse foreign key served by a prefetch lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
	/// Type whose instances (and their subtypes) own the lookup
	pub owner: TypeKey,
	pub table: String,
	/// Type given to the prefetched rows
	pub model: TypeKey,
	/// Column of `table` holding the owner's primary key
	pub column: String,
}

type Table = BTreeMap<i64, Row>;

pub struct MemoryEngine {
	registry: Arc<PolymorphicRegistry>,
	tables: RwLock<HashMap<String, Table>>,
	relations: RwLock<HashMap<String, Relation>>,
	next_id: AtomicI64,
	queries: AtomicUsize,
	row_loads: AtomicUsize,
	prefetches: AtomicUsize,
	prefetched_models: Mutex<Vec<TypeKey>>,
	fail_next: Mutex<Option<String>>,
}

impl MemoryEngine {
	pub fn new(registry: Arc<PolymorphicRegistry>) -> Self {
		Self {
			registry,
			tables: RwLock::new(HashMap::new()),
			relations: RwLock::new(HashMap::new()),
			next_id: AtomicI64::new(1),
			queries: AtomicUsize::new(0),
			row_loads: AtomicUsize::new(0),
			prefetches: AtomicUsize::new(0),
			prefetched_models: Mutex::new(Vec::new()),
			fail_next: Mutex::new(None),
		}
	}

	/// Store `instance` across the tables of its concrete chain
	///
	/// The primary key is taken from the configured pk field or allocated.
	/// Every table gets its own key column; fields are routed to the table
	/// that declares them and missing fields are stored as null.
	pub fn insert(&self, instance: &ModelInstance) -> PolymorphicResult<i64> {
		let settings = self.registry.settings();
		let id = instance
			.get_i64(&settings.pk_field)
			.unwrap_or_else(|| self.next_id.fetch_add(1, AtomicOrdering::SeqCst));
		self.next_id.fetch_max(id + 1, AtomicOrdering::SeqCst);

		let layout = self.registry.with_graph(|graph| {
			let mut layout = Vec::new();
			let mut current = Some(graph.concrete_model(instance.model())?);
			while let Some(entity) = current {
				let columns: Vec<String> = graph
					.table_fields(entity.key())?
					.iter()
					.map(|field| field.column())
					.collect();
				layout.push((
					entity.table_name(),
					graph.pk_column(entity.key(), settings)?,
					columns,
				));
				current = graph.row_parent(entity.key())?;
			}
			Ok::<_, PolymorphicError>(layout)
		})?;

		let mut tables = self.tables.write();
		for (table, pk_column, columns) in layout {
			let mut row = Row::new();
			row.insert(pk_column, Value::from(id));
			for column in columns {
				let value = instance.get(&column).cloned().unwrap_or(Value::Null);
				row.insert(column, value);
			}
			tracing::trace!(table = %table, id, "inserted row");
			tables.entry(table).or_default().insert(id, row);
		}
		Ok(id)
	}

	/// Store a row of a table outside any polymorphic family
	pub fn insert_row(&self, table: &str, id: i64, row: Row) {
		self.next_id.fetch_max(id + 1, AtomicOrdering::SeqCst);
		self.tables
			.write()
			.entry(table.to_string())
			.or_default()
			.insert(id, row);
	}

	/// Remove the row keyed by `id` from `table`
	pub fn delete_row(&self, table: &str, id: i64) -> Option<Row> {
		self.tables.write().get_mut(table).and_then(|rows| rows.remove(&id))
	}

	pub fn next_id(&self) -> i64 {
		self.next_id.fetch_add(1, AtomicOrdering::SeqCst)
	}

	pub fn register_relation(&self, lookup: impl Into<String>, relation: Relation) {
		self.relations.write().insert(lookup.into(), relation);
	}

	pub fn rows(&self, table: &str) -> Vec<Row> {
		self.tables
			.read()
			.get(table)
			.map(|rows| rows.values().cloned().collect())
			.unwrap_or_default()
	}

	/// Make the next engine call fail with a query error
	pub fn fail_next(&self, message: impl Into<String>) {
		*self.fail_next.lock() = Some(message.into());
	}

	pub fn queries(&self) -> usize {
		self.queries.load(AtomicOrdering::SeqCst)
	}

	pub fn row_loads(&self) -> usize {
		self.row_loads.load(AtomicOrdering::SeqCst)
	}

	pub fn prefetches(&self) -> usize {
		self.prefetches.load(AtomicOrdering::SeqCst)
	}

	/// Types of the instances seen by prefetch passes, in order
	pub fn prefetched_models(&self) -> Vec<TypeKey> {
		self.prefetched_models.lock().clone()
	}

	pub fn reset_counters(&self) {
		self.queries.store(0, AtomicOrdering::SeqCst);
		self.row_loads.store(0, AtomicOrdering::SeqCst);
		self.prefetches.store(0, AtomicOrdering::SeqCst);
		self.prefetched_models.lock().clear();
	}

	fn check_failure(&self) -> Result<(), StorageError> {
		match self.fail_next.lock().take() {
			Some(message) => Err(StorageError::Query(message)),
			None => Ok(()),
		}
	}

	/// Rows of the root table joined with every ancestor table
	fn joined_rows(&self, plan: &QueryPlan) -> Vec<(i64, Row)> {
		let tables = self.tables.read();
		let Some(root) = tables.get(&plan.table) else {
			return Vec::new();
		};
		root.iter()
			.filter_map(|(id, row)| {
				let mut fields = Row::new();
				for parent in plan.parents.iter().rev() {
					fields.extend(tables.get(&parent.table)?.get(id)?.clone());
				}
				fields.extend(row.clone());
				Some((*id, fields))
			})
			.collect()
	}

	fn attach_joins(&self, plan: &QueryPlan, id: i64, instance: &mut ModelInstance) {
		let tables = self.tables.read();
		for join in &plan.joins {
			let mut target = Some(&mut *instance);
			for attribute in join.parent_path() {
				target = target.and_then(|parent| parent.related_mut(attribute));
			}
			let Some(target) = target else {
				continue;
			};
			let child = tables
				.get(&join.table)
				.and_then(|rows| rows.get(&id))
				.map(|row| ModelInstance::from_row(join.model.clone(), row.clone()));
			target.set_related(join.attribute(), child);
		}
	}
}

fn compare(value: &Value, other: &Value) -> Option<Ordering> {
	match (value, other) {
		(Value::Null, Value::Null) => Some(Ordering::Equal),
		(Value::Null, _) => Some(Ordering::Less),
		(_, Value::Null) => Some(Ordering::Greater),
		(Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
		(Value::String(a), Value::String(b)) => Some(a.cmp(b)),
		(Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
		_ => None,
	}
}

fn filter_value(value: &FilterValue) -> Value {
	match value {
		FilterValue::String(s) => Value::from(s.as_str()),
		FilterValue::Integer(i) => Value::from(*i),
		FilterValue::Float(f) => Value::from(*f),
		FilterValue::Boolean(b) => Value::from(*b),
		FilterValue::Null => Value::Null,
		FilterValue::Integers(values) => Value::from(values.clone()),
	}
}

fn row_matches(row: &Row, filter: &Filter) -> bool {
	let value = row.get(&filter.field).unwrap_or(&Value::Null);
	let expected = filter_value(&filter.value);
	let contained = || match &expected {
		Value::Array(items) => items.iter().any(|item| compare(value, item) == Some(Ordering::Equal)),
		other => compare(value, other) == Some(Ordering::Equal),
	};
	match filter.operator {
		FilterOperator::Eq => compare(value, &expected) == Some(Ordering::Equal),
		FilterOperator::Ne => compare(value, &expected) != Some(Ordering::Equal),
		FilterOperator::Gt => compare(value, &expected) == Some(Ordering::Greater),
		FilterOperator::Gte => matches!(
			compare(value, &expected),
			Some(Ordering::Greater | Ordering::Equal)
		),
		FilterOperator::Lt => compare(value, &expected) == Some(Ordering::Less),
		FilterOperator::Lte => matches!(
			compare(value, &expected),
			Some(Ordering::Less | Ordering::Equal)
		),
		FilterOperator::In => contained(),
		FilterOperator::NotIn => !contained(),
	}
}

fn order(rows: &mut [(i64, Row)], order_by: &[String]) {
	rows.sort_by(|(a_id, a), (b_id, b)| {
		for field in order_by {
			let (field, descending) = match field.strip_prefix('-') {
				Some(field) => (field, true),
				None => (field.as_str(), false),
			};
			let ordering = compare(
				a.get(field).unwrap_or(&Value::Null),
				b.get(field).unwrap_or(&Value::Null),
			)
			.unwrap_or(Ordering::Equal);
			let ordering = if descending { ordering.reverse() } else { ordering };
			if ordering != Ordering::Equal {
				return ordering;
			}
		}
		a_id.cmp(b_id)
	});
}

#[async_trait]
impl QueryEngine for MemoryEngine {
	async fn fetch(&self, plan: &QueryPlan) -> Result<Vec<ModelInstance>, StorageError> {
		self.check_failure()?;
		let sql = plan
			.to_sql()
			.map_err(|err| StorageError::Query(err.to_string()))?;
		self.queries.fetch_add(1, AtomicOrdering::SeqCst);
		tracing::debug!(%sql, "executing query");

		let mut rows: Vec<(i64, Row)> = self
			.joined_rows(plan)
			.into_iter()
			.filter(|(_, row)| plan.filters.iter().all(|filter| row_matches(row, filter)))
			.collect();
		order(&mut rows, &plan.order_by);

		let offset = plan.offset.unwrap_or(0);
		let limit = plan.limit.unwrap_or(usize::MAX);
		Ok(rows
			.into_iter()
			.skip(offset)
			.take(limit)
			.map(|(id, row)| {
				let mut instance = ModelInstance::from_row(plan.model.clone(), row);
				self.attach_joins(plan, id, &mut instance);
				instance
			})
			.collect())
	}

	async fn prefetch_related(
		&self,
		instances: &mut [ModelInstance],
		lookups: &[String],
	) -> Result<(), StorageError> {
		self.check_failure()?;
		self.prefetches.fetch_add(1, AtomicOrdering::SeqCst);
		self.prefetched_models
			.lock()
			.extend(instances.iter().map(|instance| instance.model().clone()));

		let pk_field = self.registry.settings().pk_field.clone();
		for lookup in lookups {
			let relation = self.relations.read().get(lookup).cloned().ok_or_else(|| {
				StorageError::Query(format!("cannot resolve prefetch lookup '{}'", lookup))
			})?;

			let mut grouped: HashMap<i64, Vec<ModelInstance>> = HashMap::new();
			for row in self.rows(&relation.table) {
				if let Some(owner) = row.get(&relation.column).and_then(Value::as_i64) {
					grouped
						.entry(owner)
						.or_default()
						.push(ModelInstance::from_row(relation.model.clone(), row));
				}
			}

			for instance in instances.iter_mut() {
				let owned = self
					.registry
					.with_graph(|graph| graph.is_subtype(instance.model(), &relation.owner));
				if !owned {
					return Err(StorageError::Query(format!(
						"'{}' is not a valid prefetch lookup for {}",
						lookup,
						instance.model()
					)));
				}
				let related = instance
					.get_i64(&pk_field)
					.and_then(|id| grouped.get(&id).cloned())
					.unwrap_or_default();
				instance.set_prefetched(lookup.clone(), related);
			}
		}
		Ok(())
	}

	async fn load_row(&self, request: &RowRequest) -> Result<Option<Row>, StorageError> {
		self.check_failure()?;
		self.row_loads.fetch_add(1, AtomicOrdering::SeqCst);
		let Some(pk) = request.pk.as_i64() else {
			return Ok(None);
		};
		Ok(self
			.tables
			.read()
			.get(&request.table)
			.and_then(|rows| rows.get(&pk))
			.cloned())
	}
}
