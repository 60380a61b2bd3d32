//! Tests for polymorphic querysets and manager hooks

use futures::TryStreamExt;
use reinhardt_polymodels_test::zoo::{self, Animal};
use reinhardt_polymodels_test::{Zoo, zoo_env};
use reinhardt_polymorphic::{
	DiscriminatorRegistry, EntityType, Filter, FilterOperator, FilterValue, ModelInstance,
	PolymorphicError, StorageError, TypeKey,
};
use rstest::*;

fn labels(rows: &[ModelInstance]) -> Vec<(String, TypeKey)> {
	rows.iter()
		.map(|row| {
			(
				row.get_str("name").unwrap_or_default().to_string(),
				row.model().clone(),
			)
		})
		.collect()
}

fn expected(pairs: &[(&str, TypeKey)]) -> Vec<(String, TypeKey)> {
	pairs
		.iter()
		.map(|(name, model)| (name.to_string(), model.clone()))
		.collect()
}

#[rstest]
#[tokio::test]
async fn test_select_subclasses(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	let queryset = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.select_subclasses(&[])
		.unwrap();

	let plan = queryset.plan().await.unwrap();
	assert_eq!(plan.select_related, ["mammal", "snake", "mammal.monkey"]);

	let subtree: Vec<TypeKey> = zoo_env
		.registry
		.accessors(&zoo::animal())
		.unwrap()
		.types()
		.cloned()
		.collect();
	let discriminators = zoo_env
		.contenttypes
		.discriminators_of(&subtree)
		.await
		.unwrap();
	assert_eq!(discriminators.len(), 6);
	assert_eq!(
		plan.filters[0],
		Filter::new(
			"content_type_id",
			FilterOperator::In,
			FilterValue::Integers(discriminators.values().copied().collect())
		)
	);

	let rows = queryset.all().await.unwrap();
	assert_eq!(
		labels(&rows),
		expected(&[
			("animal", zoo::animal()),
			("mammal", zoo::mammal()),
			("monkey", zoo::monkey()),
			("snake", zoo::snake()),
			("big snake", zoo::big_snake()),
			("huge snake", zoo::huge_snake()),
		])
	);
	assert_eq!(zoo_env.engine.queries(), 1);
	assert_eq!(zoo_env.engine.row_loads(), 0);
}

#[rstest]
#[tokio::test]
async fn test_select_some_subclasses(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	let animals = zoo_env.manager.queryset(&zoo::animal()).unwrap();

	let mammals = animals
		.clone()
		.select_subclasses(&[zoo::mammal()])
		.unwrap();
	assert_eq!(
		mammals.plan().await.unwrap().select_related,
		["mammal", "mammal.monkey"]
	);
	assert_eq!(
		labels(&mammals.all().await.unwrap()),
		expected(&[("mammal", zoo::mammal()), ("monkey", zoo::monkey())])
	);

	let big_snakes = animals.select_subclasses(&[zoo::big_snake()]).unwrap();
	assert_eq!(big_snakes.plan().await.unwrap().select_related, ["snake"]);
	assert_eq!(
		labels(&big_snakes.all().await.unwrap()),
		expected(&[
			("big snake", zoo::big_snake()),
			("huge snake", zoo::huge_snake())
		])
	);
}

#[rstest]
#[tokio::test]
async fn test_subclass_root_needs_no_joins_for_projections(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	let queryset = zoo_env
		.manager
		.queryset(&zoo::snake())
		.unwrap()
		.select_subclasses(&[])
		.unwrap();

	let plan = queryset.plan().await.unwrap();
	assert!(plan.select_related.is_empty());
	assert!(plan.joins.is_empty());
	assert_eq!(
		labels(&queryset.all().await.unwrap()),
		expected(&[
			("snake", zoo::snake()),
			("big snake", zoo::big_snake()),
			("huge snake", zoo::huge_snake()),
		])
	);
}

#[rstest]
#[tokio::test]
async fn test_exclude_subclasses(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();

	let animals = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.exclude_subclasses()
		.all()
		.await
		.unwrap();
	assert_eq!(labels(&animals), expected(&[("animal", zoo::animal())]));

	let mammals = zoo_env
		.manager
		.queryset(&zoo::mammal())
		.unwrap()
		.exclude_subclasses()
		.all()
		.await
		.unwrap();
	assert_eq!(labels(&mammals), expected(&[("mammal", zoo::mammal())]));
}

#[rstest]
#[tokio::test]
async fn test_projection_queryset_is_restricted(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();

	let rows = zoo_env
		.manager
		.queryset(&zoo::big_snake())
		.unwrap()
		.all()
		.await
		.unwrap();
	assert_eq!(
		labels(&rows),
		expected(&[
			("big snake", zoo::big_snake()),
			("huge snake", zoo::big_snake()),
		])
	);

	let cast = zoo_env
		.manager
		.queryset(&zoo::big_snake())
		.unwrap()
		.select_subclasses(&[])
		.unwrap()
		.all()
		.await
		.unwrap();
	assert_eq!(
		labels(&cast),
		expected(&[
			("big snake", zoo::big_snake()),
			("huge snake", zoo::huge_snake()),
		])
	);
}

#[rstest]
fn test_queryset_without_discriminator(zoo_env: Zoo) {
	zoo_env
		.registry
		.register(EntityType::concrete("farm", "Barn"))
		.unwrap();

	let result = zoo_env.manager.queryset(&TypeKey::new("farm", "Barn"));
	assert!(matches!(result, Err(PolymorphicError::ImproperlyConfigured(_))));
}

#[rstest]
#[tokio::test]
async fn test_foreign_subclass_is_rejected_before_querying(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();

	let result = zoo_env
		.manager
		.queryset(&zoo::mammal())
		.unwrap()
		.select_subclasses(&[zoo::snake()]);

	assert!(matches!(result, Err(PolymorphicError::InvalidArgument(_))));
	assert_eq!(zoo_env.engine.queries(), 0);
	assert_eq!(zoo_env.engine.row_loads(), 0);
}

#[rstest]
#[tokio::test]
async fn test_prefetch_runs_before_casting(zoo_env: Zoo) {
	let ids = zoo_env.populate().await.unwrap();

	let rows = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.select_subclasses(&[])
		.unwrap()
		.prefetch_related(&[zoo::KEEPERS_LOOKUP])
		.all()
		.await
		.unwrap();

	assert_eq!(zoo_env.engine.queries(), 1);
	assert_eq!(zoo_env.engine.prefetches(), 1);
	assert_eq!(zoo_env.engine.row_loads(), 0);
	assert!(
		zoo_env
			.engine
			.prefetched_models()
			.iter()
			.all(|model| *model == zoo::animal())
	);

	let monkey = rows
		.iter()
		.find(|row| row.get_i64("id") == Some(ids.monkey))
		.unwrap();
	assert_eq!(monkey.model(), &zoo::monkey());
	let keepers = monkey.prefetched(zoo::KEEPERS_LOOKUP).unwrap();
	assert_eq!(keepers.len(), 1);
	assert_eq!(keepers[0].get_str("name"), Some("Alice"));

	let mammal = rows
		.iter()
		.find(|row| row.get_i64("id") == Some(ids.mammal))
		.unwrap();
	assert_eq!(mammal.prefetched(zoo::KEEPERS_LOOKUP).map(<[_]>::len), Some(0));
}

#[rstest]
#[tokio::test]
async fn test_unknown_prefetch_lookup(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();

	let result = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.prefetch_related(&["visitors"])
		.all()
		.await;

	assert!(matches!(
		result,
		Err(PolymorphicError::Storage(StorageError::Query(_)))
	));
}

#[rstest]
#[tokio::test]
async fn test_stream_matches_all(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	let queryset = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.select_subclasses(&[])
		.unwrap()
		.prefetch_related(&[zoo::KEEPERS_LOOKUP]);

	let streamed: Vec<ModelInstance> = queryset.stream().try_collect().await.unwrap();
	let collected = queryset.all().await.unwrap();

	assert_eq!(streamed, collected);
}

#[rstest]
#[tokio::test]
async fn test_stream_surfaces_storage_errors(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	zoo_env.engine.fail_next("server closed the connection");

	let result: Result<Vec<ModelInstance>, _> = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.stream()
		.try_collect()
		.await;

	assert!(matches!(result, Err(PolymorphicError::Storage(_))));
}

#[rstest]
#[tokio::test]
async fn test_get_first_and_count(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	let animals = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.select_subclasses(&[])
		.unwrap();

	let monkey = animals
		.clone()
		.filter(Filter::eq("name", FilterValue::String("monkey".to_string())))
		.get()
		.await
		.unwrap();
	assert_eq!(monkey.model(), &zoo::monkey());

	let missing = animals
		.clone()
		.filter(Filter::eq("name", FilterValue::String("unicorn".to_string())))
		.get()
		.await;
	assert!(matches!(missing, Err(PolymorphicError::DoesNotExist { .. })));

	let long = zoo_env
		.manager
		.queryset(&zoo::snake())
		.unwrap()
		.select_subclasses(&[])
		.unwrap()
		.filter(Filter::new("length", FilterOperator::Gte, FilterValue::Integer(10)));
	assert!(matches!(
		long.get().await,
		Err(PolymorphicError::MultipleObjectsReturned { count: 2, .. })
	));
	assert_eq!(long.count().await.unwrap(), 2);

	let first = animals.clone().order_by(&["-name"]).first().await.unwrap().unwrap();
	assert_eq!(first.get_str("name"), Some("snake"));
	assert_eq!(first.model(), &zoo::snake());

	let page = animals.order_by(&["name"]).offset(1).limit(2).all().await.unwrap();
	assert_eq!(
		labels(&page),
		expected(&[
			("big snake", zoo::big_snake()),
			("huge snake", zoo::huge_snake())
		])
	);
}

#[rstest]
#[tokio::test]
async fn test_typed_objects(zoo_env: Zoo) {
	let ids = zoo_env.populate().await.unwrap();

	let animals: Vec<Animal> = zoo_env
		.manager
		.objects::<Animal>()
		.unwrap()
		.exclude_subclasses()
		.all()
		.await
		.unwrap()
		.into_iter()
		.map(|row| row.into_model().unwrap())
		.collect();

	assert_eq!(animals.len(), 1);
	assert_eq!(animals[0].id, ids.animal);
	assert_eq!(animals[0].name, "animal");
}

#[rstest]
#[tokio::test]
async fn test_rendered_sql(zoo_env: Zoo) {
	let plan = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.select_subclasses(&[])
		.unwrap()
		.plan()
		.await
		.unwrap();

	let sql = plan.to_sql().unwrap();
	assert!(sql.contains(
		r#"LEFT JOIN "zoo_mammal" AS "mammal" ON "zoo_animal"."id" = "mammal"."animal_ptr_id""#
	));
	assert!(sql.contains(
		r#"LEFT JOIN "zoo_monkey" AS "mammal__monkey" ON "mammal"."animal_ptr_id" = "mammal__monkey"."mammal_ptr_id""#
	));
	assert!(sql.contains(
		r#"LEFT JOIN "zoo_snake" AS "snake" ON "zoo_animal"."id" = "snake"."animal_ptr_id""#
	));
	assert!(sql.contains(r#""zoo_animal"."content_type_id" IN ("#));
}

#[rstest]
#[tokio::test]
async fn test_storage_failure_propagates(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	zoo_env.engine.fail_next("deadlock detected");

	let result = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.select_subclasses(&[])
		.unwrap()
		.all()
		.await;

	assert!(matches!(
		result,
		Err(PolymorphicError::Storage(StorageError::Query(ref message))) if message == "deadlock detected"
	));
}

#[rstest]
#[tokio::test]
async fn test_unrenderable_filter_fails_the_query(zoo_env: Zoo) {
	zoo_env.populate().await.unwrap();
	let queryset = zoo_env
		.manager
		.queryset(&zoo::animal())
		.unwrap()
		.filter(Filter::eq("name", FilterValue::Integers(vec![1, 2])));

	let result = queryset.all().await;

	assert!(matches!(
		result,
		Err(PolymorphicError::Storage(StorageError::Query(_)))
	));
	assert_eq!(zoo_env.engine.queries(), 0);
}

#[rstest]
#[tokio::test]
async fn test_content_type_lookups(zoo_env: Zoo) {
	let animal_ct = zoo_env
		.contenttypes
		.get_for_model("zoo", "animal")
		.await
		.unwrap();
	let mammal_ct = zoo_env.contenttypes.get_for_model("zoo", "mammal").await.unwrap();
	let monkey_ct = zoo_env.contenttypes.get_for_model("zoo", "monkey").await.unwrap();

	let own = zoo_env
		.manager
		.content_type_lookup(&zoo::animal(), &[], None)
		.await
		.unwrap();
	assert_eq!(
		own,
		Filter::eq("content_type_id", FilterValue::Integer(animal_ct.id.unwrap()))
	);

	let subclasses = zoo_env
		.manager
		.subclasses_lookup(&zoo::mammal(), Some("animal__content_type"))
		.await
		.unwrap();
	assert_eq!(
		subclasses,
		Filter::new(
			"animal__content_type",
			FilterOperator::In,
			FilterValue::Integers(vec![mammal_ct.id.unwrap(), monkey_ct.id.unwrap()])
		)
	);
}

#[rstest]
#[tokio::test]
async fn test_prepare_insert(zoo_env: Zoo) {
	let monkey_ct = zoo_env.contenttypes.get_for_model("zoo", "monkey").await.unwrap();
	let mut monkey = ModelInstance::new(zoo::monkey()).with_field("name", "Bobo");

	zoo_env.manager.prepare_insert(&mut monkey).await.unwrap();
	assert_eq!(monkey.get_i64("content_type_id"), monkey_ct.id);

	let mut explicit = ModelInstance::new(zoo::monkey()).with_field("content_type_id", 42);
	zoo_env.manager.prepare_insert(&mut explicit).await.unwrap();
	assert_eq!(explicit.get_i64("content_type_id"), Some(42));
}
