use super::*;
use futures::FutureExt;
use tokio::sync::mpsc;

type Flushed = (String, BTreeSet<u32>);

fn recorder() -> (FlushFn<String, BTreeSet<u32>>, mpsc::UnboundedReceiver<Flushed>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let flush: FlushFn<String, BTreeSet<u32>> = Arc::new(move |key, items| {
        let tx = tx.clone();
        async move {
            let _ = tx.send((key, items));
        }
        .boxed()
    });
    (flush, rx)
}

#[tokio::test]
async fn bursts_coalesce_into_one_flush() {
    let queue = WriteQueue::new(Duration::from_millis(40));
    let (flush, mut flushed) = recorder();

    queue.schedule("work".to_string(), BTreeSet::from([1]), flush.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;
    queue.schedule("work".to_string(), BTreeSet::from([2, 1]), flush.clone());
    assert_eq!(queue.pending(&"work".to_string()), Some(BTreeSet::from([1, 2])));

    let (key, items) = tokio::time::timeout(Duration::from_secs(2), flushed.recv())
        .await
        .expect("flush in time")
        .expect("flushed");
    assert_eq!(key, "work");
    assert_eq!(items, BTreeSet::from([1, 2]));
    assert!(queue.is_empty());

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(flushed.try_recv().is_err());
}

#[tokio::test]
async fn distinct_keys_flush_independently() {
    let queue = WriteQueue::new(Duration::from_millis(20));
    let (flush, mut flushed) = recorder();

    queue.schedule("a".to_string(), BTreeSet::from([1]), flush.clone());
    queue.schedule("b".to_string(), BTreeSet::from([2]), flush);
    assert_eq!(queue.pending_keys(), vec!["a".to_string(), "b".to_string()]);

    let mut keys = Vec::new();
    for _ in 0..2 {
        let (key, _) = tokio::time::timeout(Duration::from_secs(2), flushed.recv())
            .await
            .expect("flush in time")
            .expect("flushed");
        keys.push(key);
    }
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
}

#[tokio::test]
async fn cancel_drops_the_pending_write() {
    let queue = WriteQueue::new(Duration::from_millis(20));
    let (flush, mut flushed) = recorder();

    queue.schedule("a".to_string(), BTreeSet::from([1]), flush);
    assert!(queue.cancel(&"a".to_string()));
    assert!(!queue.cancel(&"a".to_string()));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(flushed.try_recv().is_err());
}

#[tokio::test]
async fn flush_all_runs_pending_writes_immediately() {
    let queue = WriteQueue::new(Duration::from_secs(60));
    let (flush, mut flushed) = recorder();

    queue.schedule("b".to_string(), BTreeSet::from([2]), flush.clone());
    queue.schedule("a".to_string(), BTreeSet::from([1]), flush);
    queue.flush_all().await;

    assert_eq!(flushed.try_recv().expect("a").0, "a");
    assert_eq!(flushed.try_recv().expect("b").0, "b");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn snapshot_lists_every_pending_payload() {
    let queue = WriteQueue::new(Duration::from_secs(60));
    let (flush, _flushed) = recorder();

    queue.schedule("b".to_string(), BTreeSet::from([2]), flush.clone());
    queue.schedule("a".to_string(), BTreeSet::from([1]), flush.clone());
    queue.schedule("a".to_string(), BTreeSet::from([3]), flush);

    assert_eq!(
        queue.snapshot(),
        vec![
            ("a".to_string(), BTreeSet::from([1, 3])),
            ("b".to_string(), BTreeSet::from([2])),
        ]
    );
}
