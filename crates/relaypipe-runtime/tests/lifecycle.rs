//! Black-box lifecycle scenarios, run against the public `Pipeline` API only
//! (no access to its internals) the way a library consumer would.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use relaypipe_runtime::{Pipeline, SequenceError, TransformError, TransformOutput};

fn one<T>(v: T) -> Result<TransformOutput<T>, TransformError> {
    Ok(TransformOutput::One(v))
}

#[tokio::test]
async fn chunk_sizes_bound_every_emitted_chunk_without_losing_items() {
    let mut pipe: Pipeline<i64> = Pipeline::unnamed();
    pipe.add_origin(
        "gen",
        |up_to: i64| -> Result<TransformOutput<i64>, TransformError> {
            Ok(TransformOutput::Many(Box::new(0..up_to)))
        },
        Some(1),
        Some(11),
    )
    .unwrap();
    pipe.add_task(
        "plus-one",
        |v: i64| one(v + 1),
        Some(20),
        Some(17),
    )
    .unwrap();
    pipe.add_task(
        "minus-three",
        |v: i64| one(v - 3),
        Some(17),
        Some(3),
    )
    .unwrap();
    pipe.add_destination(
        "times-five",
        |v: i64| one(v * 5),
        Some(7),
        Some(9),
    )
    .unwrap();
    pipe.start().unwrap();
    pipe.feed(100).await.unwrap();
    pipe.join().await.unwrap();

    let mut result: Vec<i64> = pipe.as_completed().unwrap().collect().await;
    result.sort_unstable();
    let mut expected: Vec<i64> = (0..100).map(|x| (x + 1 - 3) * 5).collect();
    expected.sort_unstable();
    assert_eq!(result, expected);
}

#[tokio::test]
async fn setup_teardown_witness_matches_the_literal_scenario() {
    static TEARDOWN_RUNS: AtomicUsize = AtomicUsize::new(0);

    // A 1-tuple output: Rust tuples are already single values, so the
    // original's "splat a tuple, or pass it as one item" distinction doesn't
    // need a runtime type test here — a caller who wants tuple-shaped items
    // just picks a tuple `T`.
    let mut pipe: Pipeline<(String,)> = Pipeline::unnamed();
    pipe.add_task_with_state(
        "stash",
        |item: (String,), stash: Option<&Arc<Mutex<Option<String>>>>| {
            let stash = stash.expect("setup always provides state");
            *stash.lock().unwrap() = Some(item.0.clone());
            one(item)
        },
        || Some(Arc::new(Mutex::new(None))),
        move |stash: Option<Arc<Mutex<Option<String>>>>| {
            let stash = stash.expect("setup always provides state");
            assert_eq!(stash.lock().unwrap().as_deref(), Some("Hello"));
            TEARDOWN_RUNS.fetch_add(1, Ordering::SeqCst);
        },
        Some(1),
        None,
    )
    .unwrap();
    pipe.start().unwrap();
    pipe.feed(("Hello".to_string(),)).await.unwrap();
    pipe.join().await.unwrap();

    let output: Vec<(String,)> = pipe.as_completed().unwrap().collect().await;
    assert_eq!(output, vec![("Hello".to_string(),)]);
    assert_eq!(TEARDOWN_RUNS.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn declaration_order_within_a_role_is_preserved_but_roles_are_fixed() {
    // Same three transforms as the basic-order scenario, declared entirely
    // out of role order; origins still run before tasks, destinations last.
    let mut pipe: Pipeline<i64> = Pipeline::unnamed();
    pipe.add_destination("times-five", |v: i64| one(v * 5), None, None)
        .unwrap();
    pipe.add_task("minus-three", |v: i64| one(v - 3), None, None)
        .unwrap();
    pipe.add_origin("plus-one", |v: i64| one(v + 1), None, None)
        .unwrap();
    pipe.start().unwrap();
    pipe.feed(0).await.unwrap();
    pipe.join().await.unwrap();
    let out: Vec<i64> = pipe.as_completed().unwrap().collect().await;
    assert_eq!(out, vec![-10]);
}

#[tokio::test]
async fn misuse_of_the_lifecycle_is_a_sequence_error_not_a_panic() {
    let pipe: Pipeline<i64> = Pipeline::unnamed();
    assert_eq!(pipe.feed(1).await, Err(SequenceError::NotStarted));

    let mut pipe: Pipeline<i64> = Pipeline::unnamed();
    pipe.add_task("noop", one, None, None).unwrap();
    pipe.start().unwrap();
    assert_eq!(pipe.start(), Err(SequenceError::AlreadyStarted));
}
