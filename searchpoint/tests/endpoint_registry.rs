use std::sync::Arc;

use searchpoint::record::Document;
use searchpoint::{
    EndpointRegistry, FnAuthorizer, MemoryCollection, Principal, RawRequest, Record, ScopeRegistry, SearchEndpoint,
    SearchError, SearchOptions,
};
use serde_json::{Value, json};

#[derive(Debug, Clone, Record)]
struct User {
    id: u64,
    display_name: String,
    team: String,
}

fn users() -> SearchEndpoint<MemoryCollection<User>> {
    let users = vec![
        User { id: 1, display_name: "Ada Lovelace".into(), team: "core".into() },
        User { id: 2, display_name: "Grace Hopper".into(), team: "compilers".into() },
        User { id: 3, display_name: "Alan Kay".into(), team: "core".into() },
    ];
    SearchEndpoint::new(
        "users",
        MemoryCollection::new(users),
        SearchOptions::new().highlight("display_name").order_clause("id asc".parse().expect("clause")),
    )
    .expect("users endpoint")
}

fn projects() -> SearchEndpoint<MemoryCollection<Document>, impl searchpoint::Authorizer<MemoryCollection<Document>>> {
    let docs = [
        json!({"id": 10, "title": "Compiler", "archived": false, "owner": "1"}),
        json!({"id": 11, "title": "Compiler v0", "archived": true, "owner": "1"}),
        json!({"id": 12, "title": "Garden", "archived": false, "owner": "2"}),
    ];
    let collection = MemoryCollection::new(docs.into_iter().filter_map(Document::from_value).collect())
        .with_scopes(ScopeRegistry::new().scope("active", |doc: &Document| doc.0.get("archived") == Some(&json!(false))));

    SearchEndpoint::new(
        "projects",
        collection,
        SearchOptions::new()
            .display_method("title")
            .default_scope("active")
            .term_key_rename("title_cont"),
    )
    .expect("projects endpoint")
    .with_authorizer(FnAuthorizer::new(|principal: Option<&Principal>, collection: MemoryCollection<Document>| {
        let Some(principal) = principal else {
            return Err(SearchError::Forbidden { message: "sign in to search projects".into() });
        };
        let owner = json!(principal.id);
        Ok(collection.restrict(move |doc| doc.0.get("owner") == Some(&owner)))
    }))
}

fn registry() -> EndpointRegistry {
    let mut registry = EndpointRegistry::new();
    registry.register(users()).expect("register users");
    registry.register(projects()).expect("register projects");
    registry
}

#[tokio::test]
async fn query_strings_bind_to_named_endpoints() {
    let registry = registry();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["projects", "users"]);

    let rows = registry
        .dispatch("users", RawRequest::from_query_string("?q[team_eq]=core&q[display_name_start]=A"))
        .await
        .expect("users search");
    assert_eq!(
        rows,
        json!([
            {"value": 1, "text": "<mark>A</mark>da Lovelace"},
            {"value": 3, "text": "<mark>A</mark>lan Kay"},
        ])
    );
}

#[tokio::test]
async fn array_parameters_bind_as_lists() {
    let rows = registry()
        .dispatch("users", RawRequest::from_query_string("id_in[]=2&id_in[]=3"))
        .await
        .expect("users search");
    let ids: Vec<Value> = rows
        .as_array()
        .map(|rows| rows.iter().filter_map(|row| row.get("value").cloned()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![json!(2), json!(3)]);
}

#[tokio::test]
async fn principal_reaches_the_endpoint_authorizer() {
    let registry = registry();
    let request = RawRequest::from_query_string("term=comp").with_principal(Principal::new("1"));
    let rows = registry.dispatch("projects", request).await.expect("projects search");
    assert_eq!(rows, json!([{"value": 10, "text": "Compiler"}]));

    let err = registry
        .dispatch("projects", RawRequest::from_query_string("term=comp"))
        .await
        .expect_err("anonymous");
    assert!(matches!(err, SearchError::Forbidden { .. }));
    assert!(!err.is_configuration());
}

#[tokio::test]
async fn unknown_endpoint_is_reported_by_name() {
    let err = registry()
        .dispatch("invoices", RawRequest::from_query_string("term=x"))
        .await
        .expect_err("not registered");
    assert!(matches!(err, SearchError::UnknownEndpoint { ref name } if name == "invoices"));
}

#[tokio::test]
async fn registry_serves_concurrent_requests() {
    let registry = Arc::new(registry());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let query = if i % 2 == 0 { "team_eq=core" } else { "team_eq=compilers" };
                registry.dispatch("users", RawRequest::from_query_string(query)).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let rows = handle.await.expect("task").expect("search");
        let expected = if i % 2 == 0 { 2 } else { 1 };
        assert_eq!(rows.as_array().map(Vec::len), Some(expected));
    }
}
