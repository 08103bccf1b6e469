use quick_vision::delivery::overlay::MAX_REQUESTS_PER_POLL;
use quick_vision::delivery::overlay_channel;
use std::collections::HashSet;
use std::thread;
use std::time::Duration;

#[test]
fn requests_from_many_threads_arrive_once() {
    let (handle, queue) = overlay_channel();
    let producers: Vec<_> = (0..2)
        .map(|t| {
            let handle = handle.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    handle
                        .show(format!("{t}-{i}"), Duration::from_secs(1), false)
                        .unwrap();
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    let mut seen = HashSet::new();
    loop {
        let batch = queue.drain(MAX_REQUESTS_PER_POLL);
        if batch.is_empty() {
            break;
        }
        assert!(batch.len() <= MAX_REQUESTS_PER_POLL);
        for request in batch {
            assert!(seen.insert(request.text), "duplicate request");
        }
    }
    assert_eq!(seen.len(), 100);
}

#[test]
fn per_producer_order_is_kept() {
    let (handle, queue) = overlay_channel();
    for i in 0..5 {
        handle.show(i.to_string(), Duration::from_secs(1), false).unwrap();
    }
    let texts: Vec<_> = queue.drain(10).into_iter().map(|r| r.text).collect();
    assert_eq!(texts, ["0", "1", "2", "3", "4"]);
}
