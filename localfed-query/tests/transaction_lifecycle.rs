//! Read transaction ownership: one transaction per SERVICE invocation,
//! released on every exit path, with a stable snapshot for its lifetime.

mod support;

use localfed_core::Term;
use localfed_query::{
    build_plan_operators, build_seeded, collect_batches, into_stream, rewrite_patterns,
    BoxedOperator, CancellationFlag, DatasetHandle, ExecutionContext, MemoryDataset, Operator,
    Pattern, QueryError, ServiceRegistry, VarRegistry,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use support::*;

/// `?x p ?y` over subjects s0..s{n}, each with one value
fn wide_dataset(name: &str, n: usize) -> MemoryDataset {
    MemoryDataset::from_triples(name, (0..n).map(|i| triple(&format!("s{}", i), "p", i as i64)))
}

fn scan_query(vars: &mut VarRegistry, name: &str, silent: bool) -> Vec<Pattern> {
    vec![service(name, silent, vec![tp(vars, "?x", "p", "?y")])]
}

fn build(query: &[Pattern], registry: &ServiceRegistry) -> BoxedOperator {
    let (plan, _) = rewrite_patterns(query, registry);
    build_plan_operators(None, &plan).unwrap()
}

#[tokio::test]
async fn released_on_exhaustion_before_close() {
    let ds = wide_dataset("wide", 10);
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let query = scan_query(&mut vars, "wide", false);
    let ctx = ctx(vars).with_batch_size(3);

    let mut op = build(&query, &registry);
    op.open(&ctx).await.unwrap();
    assert_eq!(ds.open_transactions(), 0, "transaction is opened lazily");

    let mut rows = op.next_batch(&ctx).await.unwrap().unwrap().len();
    assert_eq!(ds.open_transactions(), 1);
    while let Some(batch) = op.next_batch(&ctx).await.unwrap() {
        assert!(batch.len() <= 3);
        rows += batch.len();
    }
    assert_eq!(rows, 10);
    assert_eq!(ds.open_transactions(), 0);
    op.close();
    assert_eq!(ds.transactions_opened(), 1);
}

#[tokio::test]
async fn released_when_abandoned_early() {
    let ds = wide_dataset("wide", 10);
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let query = scan_query(&mut vars, "wide", false);
    let ctx = ctx(vars).with_batch_size(2);

    let mut op = build(&query, &registry);
    op.open(&ctx).await.unwrap();
    op.next_batch(&ctx).await.unwrap().unwrap();
    assert_eq!(ds.open_transactions(), 1);

    drop(op);
    assert_eq!(ds.open_transactions(), 0);
}

#[tokio::test]
async fn released_when_stream_is_dropped() {
    let ds = wide_dataset("wide", 10);
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let query = scan_query(&mut vars, "wide", false);
    let ctx = ctx(vars).with_batch_size(4);

    let stream = into_stream(build(&query, &registry), ctx);
    futures::pin_mut!(stream);
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.len(), 4);
    assert_eq!(ds.open_transactions(), 1);

    drop(stream);
    assert_eq!(ds.open_transactions(), 0);
}

#[tokio::test]
async fn released_on_cancellation() {
    let ds = wide_dataset("wide", 10);
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let query = scan_query(&mut vars, "wide", false);
    let flag = CancellationFlag::new();
    let ctx = ctx(vars).with_batch_size(2).with_cancellation(flag.clone());

    let mut op = build(&query, &registry);
    op.open(&ctx).await.unwrap();
    assert!(op.next_batch(&ctx).await.unwrap().is_some());
    assert_eq!(ds.open_transactions(), 1);

    flag.cancel();
    // Cancellation ends the sequence; it is not an error
    assert!(op.next_batch(&ctx).await.unwrap().is_none());
    assert_eq!(ds.open_transactions(), 0);
    assert!(op.next_batch(&ctx).await.unwrap().is_none());
}

#[tokio::test]
async fn released_on_evaluation_error() {
    let ds = wide_dataset("wide", 4);
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let outer = outer(
        &mut vars,
        &["y"],
        &[vec![("y", Term::integer(0))], vec![("y", Term::integer(1))]],
    );
    let query = scan_query(&mut vars, "wide", false);
    let ctx = ctx(vars).with_batch_size(1);

    let (plan, _) = rewrite_patterns(&query, &registry);
    let mut op = build_seeded(outer, &plan).unwrap();
    op.open(&ctx).await.unwrap();
    ds.fail_cursor_after(1);

    assert!(op.next_batch(&ctx).await.unwrap().is_some());
    assert_eq!(ds.open_transactions(), 1);
    let err = op.next_batch(&ctx).await.unwrap_err();
    assert!(matches!(err, QueryError::LocalEvaluation { .. }));
    assert_eq!(ds.open_transactions(), 0);
}

#[tokio::test]
async fn timeout_while_opening_ends_the_sequence() {
    let registry = ServiceRegistry::default();
    registry.initialize();
    registry
        .register_dataset(svc("stalled"), DatasetHandle::new(StalledDataset))
        .unwrap();
    let mut vars = VarRegistry::new();
    let query = scan_query(&mut vars, "stalled", false);
    let ctx = ctx(vars).with_timeout(Duration::from_millis(20));

    let batches = collect_batches(build(&query, &registry), &ctx).await.unwrap();
    assert!(batches.is_empty());
    assert!(ctx.is_interrupted());
}

#[tokio::test]
async fn one_transaction_for_many_outer_rows() {
    let ds = wide_dataset("wide", 5);
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let outer = outer(
        &mut vars,
        &["x"],
        &(0..5)
            .map(|i| vec![("x", iri(&format!("s{}", i)))])
            .collect::<Vec<_>>(),
    );
    let query = scan_query(&mut vars, "wide", false);
    let ctx = ctx(vars).with_batch_size(1);

    let (plan, _) = rewrite_patterns(&query, &registry);
    let batches = collect_batches(build_seeded(outer, &plan).unwrap(), &ctx)
        .await
        .unwrap();

    assert_eq!(batches.iter().map(|b| b.len()).sum::<usize>(), 5);
    assert_eq!(ds.transactions_opened(), 1);
    assert_eq!(ds.open_transactions(), 0);
}

#[tokio::test]
async fn snapshot_is_stable_under_concurrent_writes() {
    let ds = MemoryDataset::from_triples(
        "live",
        [triple("a", "p", 1), triple("b", "p", 1), triple("c", "p", 1)],
    );
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let outer = outer(
        &mut vars,
        &["x"],
        &[
            vec![("x", iri("a"))],
            vec![("x", iri("b"))],
            vec![("x", iri("c"))],
        ],
    );
    let query = scan_query(&mut vars, "live", false);
    let ctx = ctx(vars).with_batch_size(1);

    let (plan, _) = rewrite_patterns(&query, &registry);
    let mut op = build_seeded(outer, &plan).unwrap();
    op.open(&ctx).await.unwrap();
    let mut rows = op.next_batch(&ctx).await.unwrap().unwrap().to_rows();

    // A writer commits while the invocation is in flight
    let writer = {
        let store = ds.store().clone();
        tokio::task::spawn_blocking(move || store.insert(triple("c", "p", 2)))
    };
    assert!(writer.await.unwrap());

    while let Some(batch) = op.next_batch(&ctx).await.unwrap() {
        rows.extend(batch.to_rows());
    }
    op.close();
    assert_eq!(rows.len(), 3, "in-flight invocation must not see the write");

    // A new invocation sees it
    let mut vars = VarRegistry::new();
    let query = scan_query(&mut vars, "live", false);
    let fresh = run(&query, &registry, &ExecutionContext::new(Arc::new(vars)), None)
        .await
        .unwrap();
    assert_eq!(fresh.len(), 4);
}

#[tokio::test]
async fn unregister_does_not_disturb_in_flight_evaluation() {
    let ds = wide_dataset("wide", 6);
    let registry = registry_with(&[&ds]);
    let mut vars = VarRegistry::new();
    let query = scan_query(&mut vars, "wide", false);
    let ctx = ctx(vars).with_batch_size(2);

    let mut op = build(&query, &registry);
    op.open(&ctx).await.unwrap();
    let mut rows = op.next_batch(&ctx).await.unwrap().unwrap().len();

    assert!(registry.unregister(&svc("wide")));
    while let Some(batch) = op.next_batch(&ctx).await.unwrap() {
        rows += batch.len();
    }
    assert_eq!(rows, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_share_the_registry() {
    let ds = wide_dataset("wide", 50);
    let registry = Arc::new(registry_with(&[&ds]));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let mut vars = VarRegistry::new();
                let query = scan_query(&mut vars, "wide", i % 2 == 0);
                let ctx = ctx(vars).with_batch_size(7);
                let batches = collect_batches(build(&query, &registry), &ctx).await?;
                Ok::<_, QueryError>(batches.iter().map(|b| b.len()).sum::<usize>())
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 50);
    }
    assert_eq!(ds.open_transactions(), 0);
    assert_eq!(ds.transactions_opened(), 8);
}
