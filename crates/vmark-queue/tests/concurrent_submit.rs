//! Many producers, one consumer.

use std::collections::HashMap;

use vmark_models::{Task, TaskId};
use vmark_queue::{task_queue, StatusBoard};

fn task(producer: usize, seq: usize) -> Task {
    let id = format!("p{}-{}", producer, seq);
    Task::new(
        TaskId::from(id.as_str()),
        format!("/tmp/up/{}.mp4", id),
        format!("/tmp/out/{}.mp4", id),
        "concurrent",
        0.2,
        format!("{}.mp4", id),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_per_producer_order_preserved() {
    let (queue, mut rx) = task_queue(StatusBoard::default());
    let producers = 8;
    let per_producer = 50;

    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let queue = queue.clone();
            tokio::spawn(async move {
                for seq in 0..per_producer {
                    queue.submit(task(p, seq)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(queue.len(), producers * per_producer);

    let mut next_seq: HashMap<String, usize> = HashMap::new();
    for _ in 0..producers * per_producer {
        let task = rx.recv().await.unwrap();
        let (producer, seq) = task.id.as_str().split_once('-').unwrap();
        let expected = next_seq.entry(producer.to_string()).or_insert(0);
        assert_eq!(seq.parse::<usize>().unwrap(), *expected);
        *expected += 1;
    }
    assert!(queue.is_empty());
    assert_eq!(queue.stats().queue_size, 0);
}
