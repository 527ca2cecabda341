//! Black-box messaging-routing scenario: two named sink pipelines, fed by a
//! single source pipeline's destination stage dispatching through the
//! broker. Mirrors the even/odd fan-out scenario from the pipeline spec.

use futures::StreamExt;
use relaypipe::{flush, Pipeline, TransformError, TransformOutput};

#[tokio::test]
async fn messages_route_to_the_named_destination_by_parity() {
    let mut even: Pipeline<i64> = Pipeline::new(Some("even"), -1);
    even
        .add_destination(
            "identity",
            |v| -> Result<TransformOutput<i64>, TransformError> { Ok(TransformOutput::One(v)) },
            Some(1),
            None,
        )
        .unwrap();
    even.start().unwrap();

    let mut odd: Pipeline<i64> = Pipeline::new(Some("odd"), -1);
    odd.add_destination(
        "identity",
        |v| -> Result<TransformOutput<i64>, TransformError> { Ok(TransformOutput::One(v)) },
        Some(1),
        None,
    )
    .unwrap();
    odd.start().unwrap();

    let mut source: Pipeline<i64> = Pipeline::unnamed();
    source
        .add_destination(
            "dispatch",
            |v: i64| -> Result<TransformOutput<i64>, TransformError> {
                let dest = if v % 2 == 0 { "even" } else { "odd" };
                Pipeline::send(dest, v).expect("broker is configured by the time this runs");
                Ok(TransformOutput::None)
            },
            Some(4),
            None,
        )
        .unwrap();
    source.start().unwrap();

    for v in 0..100 {
        source.feed(v).await.unwrap();
    }
    source.join().await.unwrap();
    flush().await;

    even.join().await.unwrap();
    odd.join().await.unwrap();

    let mut even_out: Vec<i64> = even.as_completed().unwrap().collect().await;
    let mut odd_out: Vec<i64> = odd.as_completed().unwrap().collect().await;
    even_out.sort_unstable();
    odd_out.sort_unstable();

    let expected_even: Vec<i64> = (0..100).step_by(2).collect();
    let expected_odd: Vec<i64> = (1..100).step_by(2).collect();
    assert_eq!(even_out, expected_even);
    assert_eq!(odd_out, expected_odd);

    let mut union = even_out;
    union.extend(odd_out);
    union.sort_unstable();
    assert_eq!(union, (0..100).collect::<Vec<i64>>());
}
