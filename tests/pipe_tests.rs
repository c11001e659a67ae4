use pipe_stream::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::sleep;

fn in_place(err_on_move: bool) -> PipeConfig {
    PipeConfig::default()
        .with_move_on_chain(false)
        .with_err_on_move(err_on_move)
}

#[test]
fn test_pipeline_first() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let pipeline = Pipeline::new(from_iter(vec![1]));
        assert_eq!(pipeline.first().await, Ok(Some(1)));
    });
}

#[tokio::test]
async fn test_pipeline_first_of_empty() {
    let pipeline = Pipeline::new(empty::<i32>());
    assert_eq!(pipeline.first().await, Ok(None));
}

#[tokio::test]
async fn test_pipeline_flat() {
    let pipeline = Pipeline::new(from_iter(vec![
        PipeInput::value(1),
        PipeInput::stream(from_iter(vec![2])),
        PipeInput::iter(vec![3]),
    ]));

    assert_eq!(pipeline.flat().collect().await, Ok(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_pipeline_chaining() {
    let result = Pipeline::new(from_iter(1..=10))
        .filter(|x, _| x % 2 == 0)
        .map(|x, _| x * 3)
        .skip(1)
        .take(3)
        .collect()
        .await;

    assert_eq!(result, Ok(vec![12, 18, 24]));
}

#[tokio::test]
async fn test_pipeline_async_callbacks() {
    let result = Pipeline::new(from_iter(vec![1u64, 2, 3, 4]))
        .eval_map(|x, _| async move {
            sleep(Duration::from_millis(1)).await;
            Ok(x * x)
        })
        .eval_filter(|x, _| {
            let keep = *x > 1;
            async move { Ok(keep) }
        })
        .collect()
        .await;

    assert_eq!(result, Ok(vec![4, 9, 16]));
}

#[tokio::test]
async fn test_pipeline_peek() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let result = Pipeline::new(from_iter(vec!['a', 'b']))
        .peek(move |c, idx| record.lock().unwrap().push((*c, idx)))
        .collect()
        .await;

    assert_eq!(result, Ok(vec!['a', 'b']));
    assert_eq!(*seen.lock().unwrap(), vec![('a', 0), ('b', 1)]);
}

#[tokio::test]
async fn test_pipeline_eval_peek() {
    let seen = Arc::new(AtomicUsize::new(0));
    let record = seen.clone();
    let result = Pipeline::new(from_iter(vec![1, 2, 3]))
        .eval_peek(move |_, _| {
            let record = record.clone();
            async move {
                record.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .collect()
        .await;

    assert_eq!(result, Ok(vec![1, 2, 3]));
    assert_eq!(seen.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_pipeline_chain() {
    let result = Pipeline::new(from_iter(vec![1, 2]))
        .chain(from_iter(vec![3]))
        .collect()
        .await;
    assert_eq!(result, Ok(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_pipeline_chain_another_pipeline() {
    let tail = Pipeline::new(from_iter(vec![3, 4])).map(|x, _| x * 10);
    let result = Pipeline::new(from_iter(vec![1, 2]))
        .chain(tail.into_stream())
        .collect()
        .await;
    assert_eq!(result, Ok(vec![1, 2, 30, 40]));
}

#[tokio::test]
async fn test_pipeline_combine() {
    let mut result = Pipeline::new(from_iter(vec![1, 2]))
        .combine(vec![from_iter(vec![3]), from_iter(vec![4, 5])])
        .collect()
        .await
        .unwrap();
    result.sort();
    assert_eq!(result, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_pipeline_terminals() {
    let sum = Pipeline::new(from_iter(1..=4)).fold(0, |acc, x, _| acc + x).await;
    assert_eq!(sum, Ok(10));

    let product = Pipeline::new(from_iter(1..=4))
        .eval_fold(1, |acc, x, _| async move { Ok(acc * x) })
        .await;
    assert_eq!(product, Ok(24));

    let found = Pipeline::new(from_iter(vec![3, 6, 9])).find(|x, _| *x > 4).await;
    assert_eq!(found, Ok(Some((6, 1))));

    let found = Pipeline::new(from_iter(vec![3, 6, 9]))
        .eval_find(|x, _| {
            let hit = *x > 100;
            async move { Ok(hit) }
        })
        .await;
    assert_eq!(found, Ok(None));

    let joined = Pipeline::new(from_iter(vec!["a", "b", "c"])).join("-").await;
    assert_eq!(joined, Ok("a-b-c".to_string()));

    let first_two = Pipeline::new(from_iter(vec![5, 6, 7])).collect_n(2).await;
    assert_eq!(first_two, Ok(vec![5, 6]));
}

#[tokio::test]
async fn test_pipeline_for_each() {
    let mut seen = Vec::new();
    Pipeline::new(from_iter(vec![1, 2]))
        .for_each(|x, idx| seen.push((x, idx)))
        .await
        .unwrap();
    assert_eq!(seen, vec![(1, 0), (2, 1)]);

    let total = Arc::new(AtomicUsize::new(0));
    let sink = total.clone();
    Pipeline::new(from_iter(vec![1usize, 2, 3]))
        .eval_for_each(move |x, _| {
            let sink = sink.clone();
            async move {
                sink.fetch_add(x, Ordering::SeqCst);
                Ok(())
            }
        })
        .await
        .unwrap();
    assert_eq!(total.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn test_callback_failure_reaches_terminal() {
    let result = Pipeline::new(from_iter(vec![1, 2, 3]))
        .eval_map(|x, _| async move {
            if x == 3 {
                Err(StreamError::callback("bad item"))
            } else {
                Ok(x)
            }
        })
        .collect()
        .await;

    assert_eq!(result, Err(StreamError::Callback("bad item".to_string())));
}

// ================================
// Move discipline
// ================================

#[tokio::test]
async fn test_chaining_moves_source_by_default() {
    let source = Pipeline::new(from_iter(vec![1, 2, 3]));
    let doubled = source.map(|x, _| x * 2);

    assert!(source.is_moved());
    assert!(!doubled.is_moved());
    assert_eq!(next(&mut source.stream()).await, Ok(None));
    assert_eq!(source.collect().await, Ok(vec![]));
    assert_eq!(doubled.collect().await, Ok(vec![2, 4, 6]));
}

#[tokio::test]
async fn test_use_after_move_errors_when_enabled() {
    let config = PipeConfig::default().with_err_on_move(true);
    let source = Pipeline::with_config(from_iter(vec![1, 2, 3]), config);
    let evens = source.filter(|x, _| x % 2 == 0);

    assert_eq!(
        next(&mut source.stream()).await,
        Err(StreamError::UseAfterMove)
    );
    assert_eq!(source.collect().await, Err(StreamError::UseAfterMove));
    assert_eq!(evens.collect().await, Ok(vec![2]));
}

#[tokio::test]
async fn test_derived_pipeline_inherits_config() {
    let config = PipeConfig::default().with_err_on_move(true);
    let source = Pipeline::with_config(from_iter(vec![1]), config);
    let derived = source.take(1);

    assert_eq!(derived.config(), config);
    assert_eq!(derived.collect().await, Ok(vec![1]));
    assert_eq!(derived.collect().await, Err(StreamError::UseAfterMove));
}

#[tokio::test]
async fn test_terminal_moves_source_by_default() {
    let pipeline = Pipeline::new(from_iter(vec![1, 2, 3]));

    assert_eq!(pipeline.collect().await, Ok(vec![1, 2, 3]));
    assert!(pipeline.is_moved());
    assert_eq!(pipeline.collect().await, Ok(vec![]));
}

#[tokio::test]
async fn test_first_moves_source_by_default() {
    let pipeline = Pipeline::new(from_iter(vec![1, 2, 3]));

    assert_eq!(pipeline.first().await, Ok(Some(1)));
    assert_eq!(pipeline.first().await, Ok(None));
}

#[tokio::test]
async fn test_err_on_move_applies_at_move_time() {
    let pipeline = Pipeline::new(from_iter(vec![1]));
    pipeline.set_err_on_move(true);
    assert!(pipeline.err_on_move());

    let _moved = pipeline.skip(0);
    assert_eq!(pipeline.collect().await, Err(StreamError::UseAfterMove));
}

#[tokio::test]
async fn test_in_place_chaining_retargets_same_pipeline() {
    let pipeline = Pipeline::with_config(from_iter(1..=6), in_place(false));

    let odd = pipeline.filter(|x, _| x % 2 == 1);
    pipeline.take(2);

    assert!(!pipeline.is_moved());
    // `odd` is the same pipeline, so it sees the later `take` too
    assert_eq!(odd.collect().await, Ok(vec![1, 3]));
}

#[tokio::test]
async fn test_in_place_terminal_keeps_source() {
    let pipeline = Pipeline::with_config(from_iter(vec![1, 2, 3, 4, 5]), in_place(false));

    assert_eq!(pipeline.collect_n(2).await, Ok(vec![1, 2]));
    assert!(!pipeline.is_moved());
    assert_eq!(pipeline.collect().await, Ok(vec![3, 4, 5]));
}

#[tokio::test]
async fn test_in_place_first_narrows_pipeline() {
    let pipeline = Pipeline::with_config(from_iter(vec![1, 2, 3]), in_place(false));

    assert_eq!(pipeline.first().await, Ok(Some(1)));
    // `first` retargeted the pipeline to its own `take(1)`
    assert_eq!(pipeline.collect().await, Ok(vec![]));
}

#[tokio::test]
async fn test_in_place_map_still_moves() {
    let pipeline = Pipeline::with_config(from_iter(vec![1, 2]), in_place(true));
    let labels = pipeline.map(|x, _| format!("#{}", x));

    assert!(pipeline.is_moved());
    assert_eq!(pipeline.first().await, Err(StreamError::UseAfterMove));
    assert_eq!(labels.join(",").await, Ok("#1,#2".to_string()));
}

#[tokio::test]
async fn test_in_place_map_moves_to_empty() {
    let pipeline = Pipeline::with_config(from_iter(vec![1, 2]), in_place(false));
    let doubled = pipeline.map(|x, _| x * 2);

    assert_eq!(pipeline.collect().await, Ok(vec![]));
    assert_eq!(doubled.collect().await, Ok(vec![2, 4]));
}

#[tokio::test]
async fn test_switching_to_in_place() {
    let pipeline = Pipeline::new(from_iter(vec![1, 2, 3]));
    pipeline.set_move_on_chain(false);
    assert!(!pipeline.move_on_chain());

    let same = pipeline.skip(1);
    assert_eq!(same.collect().await, Ok(vec![2, 3]));
    assert_eq!(pipeline.collect().await, Ok(vec![]));
}

#[tokio::test]
async fn test_stream_view_reads_without_moving() {
    let pipeline = Pipeline::new(from_iter(vec![1, 2, 3]));
    let mut view = pipeline.stream();

    assert_eq!(next(&mut view).await, Ok(Some(1)));
    assert!(!pipeline.is_moved());
    assert_eq!(pipeline.collect().await, Ok(vec![2, 3]));
}

#[tokio::test]
async fn test_into_stream_moves_source() {
    let pipeline = Pipeline::new(from_iter(vec![1, 2]));
    let stream = pipeline.into_stream();
    assert_eq!(collect(stream).await, Ok(vec![1, 2]));
}

#[tokio::test]
async fn test_into_pipeline_extension() {
    let pipeline = from_iter(vec![1, 2, 3]).into_pipeline();
    assert_eq!(pipeline.join("").await, Ok("123".to_string()));

    let config = PipeConfig::default().with_err_on_move(true);
    let pipeline = from_iter(vec![1]).into_pipeline_with(config);
    assert!(pipeline.err_on_move());
}

#[tokio::test]
async fn test_pipeline_debug() {
    let pipeline = Pipeline::new(from_iter(vec![1]));
    assert!(format!("{:?}", pipeline).contains("live"));
    let _moved = pipeline.take(1);
    assert!(format!("{:?}", pipeline).contains("moved"));
}

// ================================
// pipe(...) builder
// ================================

#[tokio::test]
async fn test_pipe_mixed_inputs() {
    let mut items = pipe(vec![
        PipeInput::value(1),
        PipeInput::stream(from_iter(vec![2, 3])),
        PipeInput::deferred(async { Ok(PipeInput::iter(vec![4])) }),
    ])
    .collect()
    .await
    .unwrap();

    items.sort();
    assert_eq!(items, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_pipe_deferred_is_flattened_once() {
    let items = pipe(vec![PipeInput::deferred(async {
        sleep(Duration::from_millis(2)).await;
        Ok(PipeInput::stream(from_iter(vec!["x", "y"])))
    })])
    .collect()
    .await;

    assert_eq!(items, Ok(vec!["x", "y"]));
}

#[tokio::test]
async fn test_pipe_deferred_failure() {
    let result = pipe::<i32, _>(vec![PipeInput::deferred(async {
        Err(StreamError::Source("lookup failed".to_string()))
    })])
    .collect()
    .await;

    assert_eq!(result, Err(StreamError::Source("lookup failed".to_string())));
}

#[tokio::test]
async fn test_pipe_with_config() {
    let pipeline = pipe_with(vec![PipeInput::from(vec![1, 2])], in_place(false));
    assert!(!pipeline.move_on_chain());
    assert_eq!(pipeline.fold(0, |acc, x, _| acc + x).await, Ok(3));
}

#[tokio::test]
async fn test_pipe_of_nothing() {
    let pipeline = pipe(Vec::<PipeInput<i32>>::new());
    assert_eq!(pipeline.collect().await, Ok(vec![]));
}

#[tokio::test]
async fn test_terminal_moves_source_when_called() {
    let pipeline = Pipeline::new(from_iter(vec![1, 2, 3]));

    let pending = pipeline.collect();
    assert!(pipeline.is_moved());

    let later = pipeline.map(|x, _| x * 10).collect().await;
    assert_eq!(later, Ok(vec![]));
    assert_eq!(pending.await, Ok(vec![1, 2, 3]));
}

#[tokio::test]
async fn test_first_moves_source_when_called() {
    let pipeline = Pipeline::with_config(
        from_iter(vec![1, 2]),
        PipeConfig::default().with_err_on_move(true),
    );

    let pending = pipeline.first();
    assert!(pipeline.is_moved());
    assert_eq!(pipeline.collect().await, Err(StreamError::UseAfterMove));
    assert_eq!(pending.await, Ok(Some(1)));
}

#[tokio::test]
async fn test_in_place_terminal_ignores_later_derivations() {
    let pipeline = Pipeline::with_config(from_iter(vec![1, 2, 3]), in_place(false));

    let pending = pipeline.collect();
    pipeline.take(1);

    assert_eq!(pending.await, Ok(vec![1, 2, 3]));
    assert!(!pipeline.is_moved());
    assert_eq!(pipeline.collect().await, Ok(vec![]));
}

#[tokio::test]
async fn test_in_place_terminals_share_one_source() {
    let pipeline = Pipeline::with_config(from_iter(1..=6), in_place(false));

    let head = pipeline.collect_n(2);
    let odd = pipeline.filter(|x, _| x % 2 == 1);

    assert_eq!(head.await, Ok(vec![1, 2]));
    assert_eq!(odd.collect().await, Ok(vec![3, 5]));
}

fn released_source(values: std::ops::RangeFrom<i32>, released: Arc<AtomicUsize>) -> PipeInput<i32> {
    PipeInput::stream(with_release(from_iter(values), move || {
        released.fetch_add(1, Ordering::SeqCst);
    }))
}

#[tokio::test]
async fn test_pipe_first_releases_merged_sources() {
    let released = Arc::new(AtomicUsize::new(0));
    let pipeline = pipe(vec![
        released_source(0.., released.clone()),
        released_source(100.., released.clone()),
    ]);

    let first = pipeline.first().await.unwrap();
    assert!(matches!(first, Some(x) if x == 0 || x == 100));
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_pipe_collect_n_releases_merged_sources() {
    let released = Arc::new(AtomicUsize::new(0));
    let pipeline = pipe(vec![
        released_source(0.., released.clone()),
        released_source(100.., released.clone()),
        PipeInput::iter(vec![-1]),
    ]);

    assert_eq!(pipeline.collect_n(4).await.map(|items| items.len()), Ok(4));
    assert_eq!(released.load(Ordering::SeqCst), 2);
}
