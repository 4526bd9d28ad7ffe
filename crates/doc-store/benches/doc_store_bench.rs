use criterion::{Criterion, criterion_group, criterion_main};
use doc_store::{
    DocumentKey, DocumentQuery, DocumentStore, DocumentStoreExt, InMemoryDocumentStore,
    Precondition, WriteBatch,
};
use serde_json::json;

fn bench_single_put(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let key = DocumentKey::new("inventory", "bench");

    c.bench_function("doc_store/put_unchecked", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .put_unchecked(key.clone(), &json!({"quantity": 10}))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_versioned_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let stock = DocumentKey::new("inventory", "bench");
    rt.block_on(async {
        store
            .put_unchecked(stock.clone(), &json!({"quantity": 0}))
            .await
            .unwrap();
    });

    c.bench_function("doc_store/compare_and_set_batch", |b| {
        b.iter(|| {
            rt.block_on(async {
                let current = store.get(&stock).await.unwrap().unwrap();
                let batch = WriteBatch::new()
                    .put(
                        stock.clone(),
                        &json!({"quantity": 1}),
                        Precondition::Version(current.version),
                    )
                    .unwrap()
                    .check(DocumentKey::new("user_data", "u1"), Precondition::Any);
                store.commit(batch).await.unwrap();
            });
        });
    });
}

fn bench_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    rt.block_on(async {
        for i in 0..1000 {
            let owner = format!("u{}", i % 10);
            store
                .put_unchecked(
                    DocumentKey::new("cart", format!("line-{i}")),
                    &json!({"owner_id": owner, "quantity": 1}),
                )
                .await
                .unwrap();
        }
    });

    c.bench_function("doc_store/query_1000_filter_owner", |b| {
        b.iter(|| {
            rt.block_on(async {
                let docs = store
                    .query(DocumentQuery::collection("cart").field_eq("owner_id", "u3"))
                    .await
                    .unwrap();
                assert_eq!(docs.len(), 100);
            });
        });
    });
}

criterion_group!(benches, bench_single_put, bench_versioned_batch, bench_query);
criterion_main!(benches);
