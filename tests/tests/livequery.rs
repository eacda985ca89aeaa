
use common::*;
use opsin_core::{Entity, LiveQuery, Prefetch, RetrievalError};

#[test]
fn initial_delivery_fires_even_for_an_empty_result() -> anyhow::Result<()> {
    let (store, registry) = setup(&["pets"]);

    let (deliveries, callback) = query_watcher();
    let query = LiveQuery::new(&store, &registry, "pets", selection("true"), Prefetch::none(), callback)?;

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert!(deliveries[0].0.is_empty());
    assert!(deliveries[0].1.is_empty()); // empty kind set marks the initial delivery
    assert!(query.results().is_empty());
    assert_eq!(query.collection(), "pets");
    Ok(())
}

#[test]
fn initial_result_respects_selection_order() -> anyhow::Result<()> {
    let (store, registry) = setup(&["pets"]);
    let mut txn = store.begin();
    let rex = txn.insert(Record::new("pets", &[("name", "Rex")]));
    let daisy = txn.insert(Record::new("pets", &[("name", "Daisy")]));
    let snuffy = txn.insert(Record::new("pets", &[("name", "Snuffy")]));
    txn.commit();

    let (deliveries, callback) = query_watcher();
    let _query = LiveQuery::new(&store, &registry, "pets", selection("true ORDER BY name DESC"), Prefetch::none(), callback)?;

    assert_eq!(deliveries.lock().unwrap()[0].0, vec![snuffy, rex, daisy]);
    Ok(())
}

#[test]
fn unchanged_result_is_suppressed() -> anyhow::Result<()> {
    let (store, registry) = setup(&["pets"]);
    let mut txn = store.begin();
    let _rex = txn.insert(Record::new("pets", &[("name", "Rex")]));
    let snuffy = txn.insert(Record::new("pets", &[("name", "Snuffy")]));
    txn.commit();

    let (deliveries, callback) = query_watcher();
    let _query = LiveQuery::new(&store, &registry, "pets", selection("name = 'Rex'"), Prefetch::none(), callback)?;
    assert_eq!(deliveries.lock().unwrap().len(), 1);

    // same collection, result set untouched: re-fetch happens, delivery does not
    let fetches_before = store.fetches();
    let mut txn = store.begin();
    txn.update(snuffy, "name", "Snuffles");
    txn.commit();

    assert_eq!(store.fetches() - fetches_before, 1);
    assert_eq!(deliveries.lock().unwrap().len(), 1);
    Ok(())
}

#[test]
fn reorder_with_identical_membership_is_delivered() -> anyhow::Result<()> {
    let (store, registry) = setup(&["pets"]);
    let mut txn = store.begin();
    let rex = txn.insert(Record::new("pets", &[("name", "Rex"), ("age", "1")]));
    let snuffy = txn.insert(Record::new("pets", &[("name", "Snuffy"), ("age", "2")]));
    txn.commit();

    let (deliveries, callback) = query_watcher();
    let _query = LiveQuery::new(&store, &registry, "pets", selection("true ORDER BY age ASC"), Prefetch::none(), callback)?;
    assert_eq!(deliveries.lock().unwrap()[0].0, vec![rex, snuffy]);

    let mut txn = store.begin();
    txn.update(rex, "age", "3");
    txn.commit();

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[1].0, vec![snuffy, rex]);
    Ok(())
}

#[test]
fn delete_then_equal_valued_reinsert_is_delivered() -> anyhow::Result<()> {
    let (store, registry) = setup(&["parts"]);

    let (deliveries, callback) = query_watcher();
    let _query = LiveQuery::new(&store, &registry, "parts", selection("true"), Prefetch::none(), callback)?;

    let mut txn = store.begin();
    let first = txn.insert(Record::new("parts", &[("name", "widget")]));
    txn.commit();

    let mut txn = store.begin();
    txn.delete(first);
    txn.commit();

    // equal property values, new identity: still a change
    let mut txn = store.begin();
    let second = txn.insert(Record::new("parts", &[("name", "widget")]));
    txn.commit();
    assert_ne!(first, second);

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 4);
    assert!(deliveries[0].0.is_empty());
    assert_eq!(deliveries[1].0, vec![first]);
    assert!(deliveries[2].0.is_empty());
    assert_eq!(deliveries[3].0, vec![second]);
    Ok(())
}

#[test]
fn invalidate_triggers_refetch_but_unchanged_result_stays_quiet() -> anyhow::Result<()> {
    let (store, registry) = setup(&["pets"]);
    let mut txn = store.begin();
    let rex = txn.insert(Record::new("pets", &[("name", "Rex")]));
    txn.commit();

    let (deliveries, callback) = query_watcher();
    let _query = LiveQuery::new(&store, &registry, "pets", selection("true"), Prefetch::none(), callback)?;

    let fetches_before = store.fetches();
    let mut txn = store.begin();
    txn.invalidate(rex);
    txn.commit();

    assert_eq!(store.fetches() - fetches_before, 1);
    assert_eq!(deliveries.lock().unwrap().len(), 1);
    Ok(())
}

#[test]
fn refresh_error_keeps_last_known_good_result() -> anyhow::Result<()> {
    let (store, registry) = setup(&["pets"]);
    let mut txn = store.begin();
    let rex = txn.insert(Record::new("pets", &[("name", "Rex")]));
    txn.commit();

    let (deliveries, callback) = query_watcher();
    let (errors, on_error) = error_watcher();
    let query = LiveQuery::with_error_handler(&store, &registry, "pets", selection("true"), Prefetch::none(), callback, on_error)?;

    store.set_failing(true);
    let mut txn = store.begin();
    let daisy = txn.insert(Record::new("pets", &[("name", "Daisy")]));
    txn.commit();

    {
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RetrievalError::Storage(_)));
    }
    assert_eq!(deliveries.lock().unwrap().len(), 1);
    let stale: Vec<_> = query.results().iter().map(|record| record.id()).collect();
    assert_eq!(stale, vec![rex]);

    // next successful refresh diffs against the preserved result
    store.set_failing(false);
    let mut txn = store.begin();
    let snuffy = txn.insert(Record::new("pets", &[("name", "Snuffy")]));
    txn.commit();

    let deliveries = deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[1].0, vec![rex, daisy, snuffy]);
    Ok(())
}

#[test]
fn unknown_collection_fails_construction() {
    let (store, registry) = setup(&["pets"]);

    let (deliveries, callback) = query_watcher();
    let result = LiveQuery::new(&store, &registry, "garments", selection("true"), Prefetch::none(), callback);

    assert!(matches!(result, Err(RetrievalError::InvalidCollection(_))));
    assert!(deliveries.lock().unwrap().is_empty());
}
