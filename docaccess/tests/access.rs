use async_trait::async_trait;
use docaccess::{
    bson::{Bson, DateTime, Document, doc},
    memory::InMemoryStore,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ticket {
    id: i64,
    status: String,
    title: String,
}

impl Ticket {
    fn new(id: i64, status: &str, title: &str) -> Self {
        Self { id, status: status.into(), title: title.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    sku: i64,
    name: String,
}

/// Backend whose every call fails, standing in for an unreachable store.
#[derive(Debug)]
struct FailingBackend;

fn unavailable<T>() -> DocumentStoreResult<T> {
    Err(DocumentStoreError::Backend("store unavailable".into()))
}

#[async_trait]
impl StoreBackend for FailingBackend {
    async fn find(&self, _: &str, _: Document, _: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        unavailable()
    }

    async fn aggregate(&self, _: &str, _: Vec<Document>) -> DocumentStoreResult<Vec<Document>> {
        unavailable()
    }

    async fn insert_one(&self, _: &str, _: Document) -> DocumentStoreResult<()> {
        unavailable()
    }

    async fn insert_many(&self, _: &str, _: Vec<Document>) -> DocumentStoreResult<()> {
        unavailable()
    }

    async fn update_one(&self, _: &str, _: Document, _: Document, _: bool) -> DocumentStoreResult<u64> {
        unavailable()
    }

    async fn update_many(&self, _: &str, _: Document, _: Document) -> DocumentStoreResult<u64> {
        unavailable()
    }

    async fn delete_many(&self, _: &str, _: Document) -> DocumentStoreResult<u64> {
        unavailable()
    }

    async fn estimated_document_count(&self, _: &str) -> DocumentStoreResult<u64> {
        unavailable()
    }
}

async fn raw(collection: &str, documents: Vec<Document>) -> DataAccess<Document> {
    let access = DataAccess::<Document>::new(InMemoryStore::new(), collection);
    for document in documents {
        access.try_add_item(&document, None).await.unwrap();
    }
    access
}

async fn tickets(items: Vec<Ticket>) -> DataAccess<Ticket> {
    let access = DataAccess::<Ticket>::new(InMemoryStore::new(), "tickets");
    for item in items {
        access.try_add_item(&item, None).await.unwrap();
    }
    access
}

#[tokio::test]
async fn get_by_id_returns_first_match_in_scan_order() {
    let access = raw(
        "items",
        vec![
            doc! { "id": 4, "name": "four" },
            doc! { "id": 5, "name": "first five" },
            doc! { "id": 5, "name": "second five" },
        ],
    )
    .await;

    let found = access.get_by_id(&doc! { "id": 5 }).await.unwrap().unwrap();
    assert_eq!(found, doc! { "id": 5, "name": "first five" });

    assert_eq!(access.get_by_id(&doc! { "id": 9 }).await.unwrap(), None);
}

#[tokio::test]
async fn falsy_identifier_adds_no_constraint() {
    let access = raw("items", vec![doc! { "id": 4 }, doc! { "id": 0 }]).await;

    let found = access.get_by_id(&doc! { "id": 0 }).await.unwrap().unwrap();

    assert_eq!(found, doc! { "id": 4 });
}

#[tokio::test]
async fn reads_never_expose_internal_id() {
    let access = raw("items", vec![doc! { "id": 1 }, doc! { "id": 2 }]).await;

    let all = access.get_all(Query::new()).await.unwrap();

    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|d| !d.contains_key("_id")));
}

#[tokio::test]
async fn next_id_is_zero_for_empty_collections() {
    let access = tickets(vec![]).await;

    assert_eq!(access.get_next_id(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn next_id_follows_largest_id() {
    let access = tickets(vec![
        Ticket::new(4, "A", "a"),
        Ticket::new(41, "B", "b"),
        Ticket::new(7, "A", "c"),
    ])
    .await;

    assert_eq!(access.get_next_id(&[]).await.unwrap(), 42);
    assert_eq!(
        access.get_next_id(&[FilterTriple::equal("status", "A")]).await.unwrap(),
        8
    );
}

#[tokio::test]
async fn next_id_reports_exhausted_id_space() {
    let access = raw("items", vec![doc! { "id": i64::MAX }]).await;

    assert!(matches!(
        access.get_next_id(&[]).await,
        Err(DocumentStoreError::InvalidDocument(_))
    ));
}

#[tokio::test]
async fn next_id_accepts_integral_doubles() {
    let access = raw("items", vec![doc! { "id": 9.0 }, doc! { "id": 1e300 }]).await;

    assert!(access.get_next_id(&[]).await.is_err());
    assert_eq!(
        access.get_next_id(&[FilterTriple::less("id", 100)]).await.unwrap(),
        10
    );
}

#[tokio::test]
async fn between_without_bounds_matches_everything() {
    let access = raw("items", vec![doc! { "n": 5 }, doc! { "n": {} }]).await;
    let unbounded = FilterTriple::new(
        "n",
        Operator::Between,
        doc! { "from": Bson::Null, "to": Bson::Null },
    );

    let found = access.get_all(Query::filtered([unbounded])).await.unwrap();

    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn next_id_rejects_non_numeric_ids() {
    let access = raw("items", vec![doc! { "id": "abc" }]).await;

    assert!(matches!(
        access.get_next_id(&[]).await,
        Err(DocumentStoreError::InvalidDocument(_))
    ));
}

#[tokio::test]
async fn group_counts_per_value() {
    let access = tickets(vec![
        Ticket::new(1, "A", "a"),
        Ticket::new(2, "B", "b"),
        Ticket::new(3, "A", "c"),
    ])
    .await;

    let counts = access.group_by_field_filtered("status", Query::new()).await.unwrap();

    assert_eq!(counts.len(), 2);
    assert_eq!(counts["A"], 2);
    assert_eq!(counts["B"], 1);
}

#[tokio::test]
async fn group_applies_filters() {
    let access = tickets(vec![
        Ticket::new(1, "A", "a"),
        Ticket::new(2, "B", "b"),
        Ticket::new(3, "A", "c"),
        Ticket::new(4, "B", "d"),
    ])
    .await;

    let filtered = access
        .group_by_field_filtered("status", Query::filtered([FilterTriple::greater("id", 1)]))
        .await
        .unwrap();

    assert_eq!(filtered.len(), 2);
    assert_eq!(filtered["A"], 1);
    assert_eq!(filtered["B"], 2);
}

#[tokio::test]
async fn group_counts_ignore_sort_and_rows_range() {
    let access = tickets(vec![
        Ticket::new(1, "A", "a"),
        Ticket::new(2, "A", "b"),
        Ticket::new(3, "B", "c"),
    ])
    .await;

    let counts = access
        .group_by_field_filtered(
            "status",
            Query::builder()
                .order_by(OrderBy::desc("id"))
                .rows_range(RowsRange::new(1, 1))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(counts.len(), 2);
    assert_eq!(counts["A"], 2);
    assert_eq!(counts["B"], 1);
}

#[tokio::test]
async fn bulk_add_uses_stringified_id_field() {
    let access = DataAccess::<Product>::new(InMemoryStore::new(), "products");
    let products = vec![
        Product { sku: 17, name: "lamp".into() },
        Product { sku: 18, name: "desk".into() },
    ];

    access.try_bulk_add_items(&products, Some("sku")).await.unwrap();

    let stored = access
        .backend()
        .find("products", doc! { "_id": "17" }, FindOptions::default())
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].get_str("name").unwrap(), "lamp");

    let by_internal_id = access.get_by_id(&doc! { "_id": "17" }).await.unwrap();
    assert_eq!(by_internal_id, Some(products[0].clone()));

    let by_sku = access.get_by_id(&doc! { "sku": 18_i64 }).await.unwrap();
    assert_eq!(by_sku, Some(products[1].clone()));
}

#[tokio::test]
async fn bulk_add_requires_id_field() {
    let access = DataAccess::<Product>::new(InMemoryStore::new(), "products");
    let products = vec![Product { sku: 1, name: "lamp".into() }];

    assert!(matches!(
        access.try_bulk_add_items(&products, Some("code")).await,
        Err(DocumentStoreError::InvalidDocument(_))
    ));
    assert!(access.is_empty().await.unwrap());
}

#[tokio::test]
async fn best_effort_writes_swallow_failures() {
    let access = DataAccess::<Ticket>::new(FailingBackend, "tickets");
    let ticket = Ticket::new(1, "A", "a");

    assert_eq!(access.add_item(ticket.clone(), None).await, ticket);
    assert_eq!(
        access.add_or_update_item(ticket.clone(), Some(&doc! { "id": 1 })).await,
        ticket
    );
    access.bulk_add_items(vec![ticket.clone()], Some("id")).await;

    assert!(access.try_add_item(&ticket, None).await.is_err());
    assert!(access.try_add_or_update_item(&ticket, None).await.is_err());
    assert!(access.try_bulk_add_items(&[ticket], None).await.is_err());
}

#[tokio::test]
async fn reads_updates_and_deletes_propagate_failures() {
    let access = DataAccess::<Ticket>::new(FailingBackend, "tickets");

    assert!(access.get_all(Query::new()).await.is_err());
    assert!(access.get_by_id(&doc! { "id": 1 }).await.is_err());
    assert!(access.get_next_id(&[]).await.is_err());
    assert!(access.group_by_field_filtered("status", Query::new()).await.is_err());
    assert!(access.update_all(&[], &doc! { "status": "B" }).await.is_err());
    assert!(access.delete_all(&[]).await.is_err());
    assert!(access.is_empty().await.is_err());
}

#[tokio::test]
async fn duplicate_internal_id_is_reported_by_strict_insert() {
    let access = tickets(vec![]).await;
    let ticket = Ticket::new(1, "A", "a");
    let ids = doc! { "id": 1 };

    access.try_add_item(&ticket, Some(&ids)).await.unwrap();

    assert!(matches!(
        access.try_add_item(&ticket, Some(&ids)).await,
        Err(DocumentStoreError::DocumentAlreadyExists(..))
    ));
    assert_eq!(access.add_item(ticket, Some(&ids)).await.id, 1);
    assert_eq!(access.get_all(Query::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn add_or_update_upserts_by_first_identifier() {
    let access = tickets(vec![]).await;
    let ids = doc! { "id": 7 };

    access.add_or_update_item(Ticket::new(7, "A", "draft"), Some(&ids)).await;
    access.add_or_update_item(Ticket::new(7, "B", "final"), Some(&ids)).await;

    let all = access.get_all(Query::new()).await.unwrap();
    assert_eq!(all, vec![Ticket::new(7, "B", "final")]);
}

#[tokio::test]
async fn between_is_exclusive() {
    let access = tickets(vec![
        Ticket::new(1, "A", "a"),
        Ticket::new(2, "A", "b"),
        Ticket::new(3, "A", "c"),
    ])
    .await;

    let found = access
        .get_all(Query::filtered([FilterTriple::between("id", 1, 3)]))
        .await
        .unwrap();

    assert_eq!(found, vec![Ticket::new(2, "A", "b")]);
}

#[tokio::test]
async fn between_accepts_extended_json_dates() {
    let access = raw(
        "events",
        vec![
            doc! { "name": "early", "at": DateTime::from_millis(1_000) },
            doc! { "name": "inside", "at": DateTime::parse_rfc3339_str("2024-03-01T00:00:00Z").unwrap() },
            doc! { "name": "late", "at": DateTime::parse_rfc3339_str("2025-01-01T00:00:00Z").unwrap() },
        ],
    )
    .await;

    let triple = FilterTriple::from_json(
        "at",
        Operator::Between,
        &json!({
            "from": { "$date": "2024-01-01T00:00:00Z" },
            "to": { "$date": "2024-12-31T00:00:00Z" }
        }),
    )
    .unwrap();

    let found = access.get_all(Query::filtered([triple])).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_str("name").unwrap(), "inside");
}

#[tokio::test]
async fn contains_text_ignores_case() {
    let access = tickets(vec![
        Ticket::new(1, "A", "Printer jam"),
        Ticket::new(2, "A", "Broken PRINTER"),
        Ticket::new(3, "A", "Network down"),
    ])
    .await;

    let found = access
        .get_all(Query::filtered([FilterTriple::contains_text("title", "printer")]))
        .await
        .unwrap();

    assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn later_triple_on_same_field_wins() {
    let access = tickets(vec![Ticket::new(1, "A", "a"), Ticket::new(2, "B", "b")]).await;

    let found = access
        .get_all(Query::filtered([
            FilterTriple::equal("status", "A"),
            FilterTriple::equal("status", "B"),
        ]))
        .await
        .unwrap();

    assert_eq!(found, vec![Ticket::new(2, "B", "b")]);
}

#[tokio::test]
async fn get_all_sorts_and_paginates() {
    let access = tickets((1..=5).map(|id| Ticket::new(id, "A", "t")).collect()).await;

    let page = access
        .get_all(
            Query::builder()
                .order_by(OrderBy::desc("id"))
                .rows_range(RowsRange::from_page(2, 2))
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3, 2]);
}

#[tokio::test]
async fn get_by_ids_combines_sets_and_secondary_ids() {
    let access = tickets(vec![
        Ticket::new(1, "A", "a"),
        Ticket::new(2, "B", "b"),
        Ticket::new(3, "A", "c"),
    ])
    .await;

    let found = access
        .get_by_ids(&doc! { "id": [1, 2, 3] }, Some(&doc! { "status": "A" }))
        .await
        .unwrap();

    assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);
}

#[tokio::test]
async fn update_item_uses_identifiers_verbatim() {
    let access = raw("items", vec![doc! { "id": 4, "state": "new" }]).await;

    let matched = access
        .update_item(&doc! { "state": "done" }, &doc! { "id": 4 })
        .await
        .unwrap();
    assert_eq!(matched, 1);
    assert_eq!(
        access.get_by_id(&doc! { "id": 4 }).await.unwrap(),
        Some(doc! { "id": 4, "state": "done" })
    );

    let matched = access
        .update_item(&doc! { "state": "gone" }, &doc! { "id": 0 })
        .await
        .unwrap();
    assert_eq!(matched, 0);
}

#[tokio::test]
async fn updates_and_deletes_report_counts() {
    let access = tickets(vec![
        Ticket::new(1, "A", "a"),
        Ticket::new(2, "B", "b"),
        Ticket::new(3, "A", "c"),
    ])
    .await;

    let updated = access
        .update_all(&[FilterTriple::equal("status", "A")], &doc! { "status": "C" })
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let updated = access
        .update_by_ids(&doc! { "title": "done" }, &doc! { "id": [2] }, None)
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let deleted = access.delete_by_ids(&doc! { "id": [1, 2] }, None).await.unwrap();
    assert_eq!(deleted, 2);

    let remaining = access.get_all(Query::new()).await.unwrap();
    assert_eq!(remaining, vec![Ticket::new(3, "C", "c")]);
}

#[tokio::test]
async fn delete_all_without_filters_empties_collection() {
    let access = tickets(vec![Ticket::new(1, "A", "a"), Ticket::new(2, "B", "b")]).await;

    assert!(!access.is_empty().await.unwrap());
    assert_eq!(access.delete_all(&[FilterTriple::equal("status", "")]).await.unwrap(), 2);
    assert!(access.is_empty().await.unwrap());
}

#[tokio::test]
async fn accessors_share_one_client_across_collections() {
    let mut access = tickets(vec![Ticket::new(1, "A", "a")]).await;
    let archive = access.with_collection::<Document>("archive");

    archive.try_add_item(&doc! { "id": 99 }, None).await.unwrap();
    assert_eq!(archive.collection_name(), "archive");

    access.switch_collection("archive");
    assert_eq!(access.collection_name(), "archive");
    assert_eq!(access.get_next_id(&[]).await.unwrap(), 100);

    let tickets = archive.with_collection::<Ticket>("tickets");
    assert_eq!(tickets.get_all(Query::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn in_set_requires_an_array() {
    let access = tickets(vec![Ticket::new(1, "A", "a")]).await;

    let result = access
        .get_all(Query::filtered([FilterTriple::new("id", Operator::InSet, Bson::Int64(1))]))
        .await;

    assert!(matches!(result, Err(DocumentStoreError::Backend(_))));
}
