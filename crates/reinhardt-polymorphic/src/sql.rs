//! SQL rendering of query plans
//!
//! Ancestor tables of the root are INNER JOINed on the shared primary key and
//! every eager-load hop becomes one LEFT JOIN aliased by its lookup path.

use crate::error::{PolymorphicError, PolymorphicResult};
use crate::query::{Filter, FilterOperator, FilterValue, QueryPlan};
use sea_query::{
	Alias, Asterisk, Condition, Expr, ExprTrait, JoinType, Order, PostgresQueryBuilder, Query,
	SelectStatement,
};

fn scalar(value: &FilterValue) -> Option<sea_query::Value> {
	match value {
		FilterValue::String(s) => Some(s.clone().into()),
		FilterValue::Integer(i) => Some((*i).into()),
		FilterValue::Float(f) => Some((*f).into()),
		FilterValue::Boolean(b) => Some((*b).into()),
		FilterValue::Null | FilterValue::Integers(_) => None,
	}
}

fn list(value: &FilterValue) -> Option<Vec<sea_query::Value>> {
	match value {
		FilterValue::Integers(values) => Some(values.iter().map(|v| (*v).into()).collect()),
		other => scalar(other).map(|v| vec![v]),
	}
}

fn unsupported(filter: &Filter) -> PolymorphicError {
	PolymorphicError::InvalidArgument(format!(
		"filter {:?} on `{}` does not support {:?}",
		filter.operator, filter.field, filter.value
	))
}

fn add_filter(condition: Condition, table: &str, filter: &Filter) -> PolymorphicResult<Condition> {
	let col = Expr::col((Alias::new(table), Alias::new(&filter.field)));
	let expr = match (&filter.operator, &filter.value) {
		(FilterOperator::Eq, FilterValue::Null) => col.is_null(),
		(FilterOperator::Ne, FilterValue::Null) => col.is_not_null(),
		(FilterOperator::In, value) => col.is_in(list(value).ok_or_else(|| unsupported(filter))?),
		(FilterOperator::NotIn, value) => {
			col.is_not_in(list(value).ok_or_else(|| unsupported(filter))?)
		}
		(operator, value) => {
			let v = scalar(value).ok_or_else(|| unsupported(filter))?;
			match operator {
				FilterOperator::Eq => col.eq(v),
				FilterOperator::Ne => col.ne(v),
				FilterOperator::Gt => col.gt(v),
				FilterOperator::Gte => col.gte(v),
				FilterOperator::Lt => col.lt(v),
				FilterOperator::Lte => col.lte(v),
				FilterOperator::In | FilterOperator::NotIn => return Err(unsupported(filter)),
			}
		}
	};
	Ok(condition.add(expr))
}

impl QueryPlan {
	/// Table holding `column` among the root's table chain
	fn owner_of(&self, column: &str) -> &str {
		if self.columns.iter().any(|c| c == column) {
			return &self.table;
		}
		self.parents
			.iter()
			.find(|parent| parent.columns.iter().any(|c| c == column))
			.map(|parent| parent.table.as_str())
			.unwrap_or(&self.table)
	}

	/// Build the SELECT statement for this plan
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polymorphic::{Filter, FilterValue, QueryPlan, TypeKey};
	///
	/// let plan = QueryPlan {
	///     model: TypeKey::new("zoo", "Animal"),
	///     table: "zoo_animal".to_string(),
	///     pk_column: "id".to_string(),
	///     columns: vec!["id".to_string(), "content_type_id".to_string()],
	///     parents: Vec::new(),
	///     filters: vec![Filter::eq("content_type_id", FilterValue::Integer(1))],
	///     select_related: Vec::new(),
	///     joins: Vec::new(),
	///     prefetch_related: Vec::new(),
	///     order_by: Vec::new(),
	///     limit: None,
	///     offset: None,
	/// };
	/// let sql = plan.to_sql().unwrap();
	/// assert!(sql.starts_with(r#"SELECT * FROM "zoo_animal""#));
	/// assert!(sql.contains(r#""zoo_animal"."content_type_id" = 1"#));
	/// ```
	///
	/// # Errors
	///
	/// Returns [`PolymorphicError::InvalidArgument`] for a filter whose value
	/// does not fit its operator, such as `Eq` against a list or `Gt` against
	/// `Null`.
	pub fn to_select_statement(&self) -> PolymorphicResult<SelectStatement> {
		let mut stmt = Query::select();
		stmt.column(Asterisk).from(Alias::new(&self.table));

		let mut child_table = self.table.as_str();
		let mut child_pk = self.pk_column.as_str();
		for parent in &self.parents {
			stmt.join(
				JoinType::InnerJoin,
				Alias::new(&parent.table),
				Expr::col((Alias::new(child_table), Alias::new(child_pk)))
					.equals((Alias::new(&parent.table), Alias::new(&parent.pk_column))),
			);
			child_table = parent.table.as_str();
			child_pk = parent.pk_column.as_str();
		}

		// Every hop is keyed by the shared primary key of the root row
		for join in &self.joins {
			let (parent_alias, parent_pk) = match self
				.joins
				.iter()
				.find(|candidate| candidate.path == join.parent_path())
			{
				Some(parent) => (parent.alias(), parent.pk_column.clone()),
				None => (self.table.clone(), self.pk_column.clone()),
			};
			stmt.join_as(
				JoinType::LeftJoin,
				Alias::new(&join.table),
				Alias::new(join.alias()),
				Expr::col((Alias::new(parent_alias), Alias::new(parent_pk)))
					.equals((Alias::new(join.alias()), Alias::new(&join.pk_column))),
			);
		}

		if !self.filters.is_empty() {
			let mut condition = Condition::all();
			for filter in &self.filters {
				condition = add_filter(condition, self.owner_of(&filter.field), filter)?;
			}
			stmt.cond_where(condition);
		}

		for field in &self.order_by {
			let (field, order) = match field.strip_prefix('-') {
				Some(field) => (field, Order::Desc),
				None => (field.as_str(), Order::Asc),
			};
			stmt.order_by((Alias::new(self.owner_of(field)), Alias::new(field)), order);
		}
		if let Some(limit) = self.limit {
			stmt.limit(limit as u64);
		}
		if let Some(offset) = self.offset {
			stmt.offset(offset as u64);
		}
		Ok(stmt)
	}

	/// PostgreSQL text of [`to_select_statement`](Self::to_select_statement)
	pub fn to_sql(&self) -> PolymorphicResult<String> {
		Ok(self.to_select_statement()?.to_string(PostgresQueryBuilder))
	}
}
