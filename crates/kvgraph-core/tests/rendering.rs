//! Rendering records against field selections
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p kvgraph-core --test rendering
//! ```

mod common;

use common::Fixture;
use kvgraph_core::{to_global_id, PageRequest, ResolveError, Selection};
use serde_json::json;

#[tokio::test]
async fn test_key_only_selection_stays_lazy() {
    let fixture = Fixture::new().await;
    let employee = fixture.context.types().get("SalaryEmployee").unwrap();
    let peter = fixture.employee("e1").await.with_record_type("SalaryEmployee");

    let selection = Selection::parse("name,department.id");
    let rendered = fixture
        .context
        .render(&fixture.store, &employee, &peter, &selection)
        .await
        .unwrap();

    assert_eq!(
        rendered,
        json!({
            "name": "Peter",
            "department": { "id": to_global_id("Department", "d1") },
        })
    );
    assert_eq!(fixture.memory.metrics().fetches(), 0);
}

#[tokio::test]
async fn test_nested_selection_fetches_related() {
    let fixture = Fixture::new().await;
    let employee = fixture.context.types().get("Employee").unwrap();
    let tracy = fixture.employee("e3").await;

    let selection = Selection::parse("id,department.name,role.name");
    let rendered = fixture
        .context
        .render(&fixture.store, &employee, &tracy, &selection)
        .await
        .unwrap();

    assert_eq!(
        rendered,
        json!({
            "id": to_global_id("Employee", "e3"),
            "department": { "name": "Human Resources" },
            "role": { "name": "engineer" },
        })
    );
    assert_eq!(fixture.memory.metrics().gets, 2);
}

#[tokio::test]
async fn test_empty_selection_renders_scalars() {
    let fixture = Fixture::new().await;
    let employee = fixture.context.types().get("HourlyEmployee").unwrap();
    let tracy = fixture.employee("e3").await.with_record_type("HourlyEmployee");

    let rendered = fixture
        .context
        .render(&fixture.store, &employee, &tracy, &Selection::new())
        .await
        .unwrap();

    assert_eq!(rendered["name"], json!("Tracy"));
    assert_eq!(rendered["hourly"], json!(40));
    assert_eq!(rendered["cls"], json!("HourlyEmployee"));
    assert!(rendered.get("department").is_none());
    assert_eq!(fixture.memory.metrics().fetches(), 0);
}

#[tokio::test]
async fn test_list_relationship_batches() {
    let fixture = Fixture::new().await;
    let projects = fixture.context.types().get("Project").unwrap();
    let apollo = projects
        .by_id(fixture.store.as_ref(), "1")
        .await
        .unwrap()
        .unwrap();
    fixture.memory.reset_metrics();

    let rendered = fixture
        .context
        .render(
            &fixture.store,
            &projects,
            &apollo,
            &Selection::parse("name,departments.name"),
        )
        .await
        .unwrap();

    assert_eq!(
        rendered,
        json!({
            "name": "Apollo",
            "departments": [{ "name": "Human Resources" }, { "name": "Engineering" }],
        })
    );
    let metrics = fixture.memory.metrics();
    assert_eq!((metrics.gets, metrics.batch_gets), (0, 1));
}

#[tokio::test]
async fn test_unknown_field() {
    let fixture = Fixture::new().await;
    let employee = fixture.context.types().get("Employee").unwrap();
    let peter = fixture.employee("e1").await;

    let err = fixture
        .context
        .render(&fixture.store, &employee, &peter, &Selection::parse("salary"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnknownField { ref field, .. } if field == "salary"));
}

#[tokio::test]
async fn test_render_connection_page() {
    let fixture = Fixture::new().await;
    let field = fixture.context.connection_field("Department").unwrap();
    let page = field
        .resolve(fixture.store.as_ref(), &PageRequest::new().first(1))
        .await
        .unwrap();

    let rendered = fixture
        .context
        .render_connection(
            &fixture.store,
            field.bound_type(),
            &page,
            &Selection::parse("edges.node.name"),
        )
        .await
        .unwrap();

    assert_eq!(rendered["edges"][0]["node"], json!({ "name": "Engineering" }));
    assert_eq!(rendered["edges"][0]["cursor"], json!(page.edges[0].cursor));
    assert_eq!(rendered["pageInfo"]["hasNextPage"], json!(true));
    assert_eq!(rendered["totalCount"], json!(2));
}

#[tokio::test]
async fn test_render_connection_level_selections() {
    let fixture = Fixture::new().await;
    let field = fixture.context.connection_field("Department").unwrap();
    let page = field
        .resolve(fixture.store.as_ref(), &PageRequest::new().first(1))
        .await
        .unwrap();

    for spec in ["totalCount", "pageInfo.hasNextPage", "edges.cursor"] {
        let rendered = fixture
            .context
            .render_connection(
                &fixture.store,
                field.bound_type(),
                &page,
                &Selection::parse(spec),
            )
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", spec, e));

        assert_eq!(rendered["totalCount"], json!(2), "{}", spec);
        assert_eq!(rendered["pageInfo"]["hasNextPage"], json!(true), "{}", spec);
        assert_eq!(rendered["edges"][0]["cursor"], json!(page.edges[0].cursor), "{}", spec);
        assert_eq!(rendered["edges"][0]["node"]["name"], json!("Engineering"), "{}", spec);
    }
    assert_eq!(fixture.memory.metrics().gets, 0);
}

#[test]
fn test_render_from_blocking_code() {
    let rendered = tokio_test::block_on(async {
        let fixture = Fixture::new().await;
        let role = fixture.context.types().get("Role").unwrap();
        let record = role
            .by_id(fixture.store.as_ref(), "r1")
            .await
            .unwrap()
            .unwrap();
        fixture
            .context
            .render(&fixture.store, &role, &record, &Selection::parse("name"))
            .await
            .unwrap()
    });
    assert_eq!(rendered, json!({ "name": "manager" }));
}
