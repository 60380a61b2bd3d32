//! Interface to the query engine that executes polymorphic queries
//!
//! The polymorphic layer only decides which joins, filters and lookups a
//! query needs; fetching rows is delegated to a [`QueryEngine`].

use crate::error::StorageError;
use crate::instance::{ModelInstance, Row};
use crate::model::TypeKey;
use crate::query::QueryPlan;
use async_trait::async_trait;
use serde_json::Value;

/// Request for the row of `model` sharing the primary key `pk`
#[derive(Debug, Clone, PartialEq)]
pub struct RowRequest {
	pub model: TypeKey,
	pub table: String,
	pub pk_column: String,
	pub pk: Value,
}

#[async_trait]
pub trait QueryEngine: Send + Sync {
	/// Execute `plan`
	///
	/// Returned instances have `plan.model` as their type and carry the
	/// columns of its whole table chain. For every join spec of the plan the
	/// engine fills the matching related cache, recording `None` when the
	/// joined row is missing.
	async fn fetch(&self, plan: &QueryPlan) -> Result<Vec<ModelInstance>, StorageError>;

	/// Run the secondary prefetch pass for `lookups` over `instances`
	async fn prefetch_related(
		&self,
		instances: &mut [ModelInstance],
		lookups: &[String],
	) -> Result<(), StorageError>;

	/// Load a single joined row on demand
	async fn load_row(&self, request: &RowRequest) -> Result<Option<Row>, StorageError>;

	async fn count(&self, plan: &QueryPlan) -> Result<usize, StorageError> {
		Ok(self.fetch(plan).await?.len())
	}
}
