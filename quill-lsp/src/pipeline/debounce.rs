//! Time-windowed event collapsing.
//!
//! Both variants are trailing-edge: nothing is emitted until a window of
//! silence has passed, and only the final state of a burst survives.
//! Intermediate events are dropped, never queued, so downstream logic
//! must depend only on the final state each event represents.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Per-key debounce: for any burst of events sharing a key and arriving
/// less than `window` apart, only the last event is emitted, once,
/// after `window` of same-key silence. Keys are independent; one key's
/// burst never delays another's.
///
/// Closing the input sender lets pending entries flush at their deadlines
/// before the output channel closes.
pub fn debounce_by_key<T, K, F>(
    window: Duration,
    key_of: F,
) -> (mpsc::UnboundedSender<T>, mpsc::UnboundedReceiver<T>)
where
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
    F: Fn(&T) -> K + Send + 'static,
{
    let (in_tx, mut in_rx) = mpsc::unbounded_channel::<T>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<T>();

    tokio::spawn(async move {
        let mut pending: HashMap<K, (T, Instant)> = HashMap::new();
        let mut open = true;

        while open || !pending.is_empty() {
            let next_due = pending.values().map(|(_, due)| *due).min();
            // Placeholder target when nothing is pending; that branch is
            // disabled below so the value is never slept on.
            let target = next_due.unwrap_or_else(|| Instant::now() + window);

            tokio::select! {
                event = in_rx.recv(), if open => match event {
                    Some(event) => {
                        let key = key_of(&event);
                        // Supersedes any earlier event for the same key.
                        pending.insert(key, (event, Instant::now() + window));
                    }
                    None => open = false,
                },
                _ = sleep_until(target), if next_due.is_some() => {
                    let now = Instant::now();
                    let (due, rest): (HashMap<_, _>, HashMap<_, _>) =
                        pending.into_iter().partition(|(_, (_, d))| *d <= now);
                    pending = rest;
                    for (_, (event, _)) in due {
                        if out_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    });

    (in_tx, out_rx)
}

/// Collapse-all debounce: the whole input is one group. After `window`
/// of total silence the full ordered batch collected since the last
/// emission is sent as one item.
pub fn debounce_all<T>(
    window: Duration,
) -> (mpsc::UnboundedSender<T>, mpsc::UnboundedReceiver<Vec<T>>)
where
    T: Send + 'static,
{
    let (in_tx, mut in_rx) = mpsc::unbounded_channel::<T>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<T>>();

    tokio::spawn(async move {
        let mut batch: Vec<T> = Vec::new();
        let mut due: Option<Instant> = None;
        let mut open = true;

        while open || !batch.is_empty() {
            let target = due.unwrap_or_else(|| Instant::now() + window);

            tokio::select! {
                event = in_rx.recv(), if open => match event {
                    Some(event) => {
                        batch.push(event);
                        due = Some(Instant::now() + window);
                    }
                    None => open = false,
                },
                _ = sleep_until(target), if due.is_some() => {
                    due = None;
                    if out_tx.send(std::mem::take(&mut batch)).is_err() {
                        return;
                    }
                }
            }
        }
    });

    (in_tx, out_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const WINDOW: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn burst_yields_only_the_final_event() {
        let (tx, mut rx) = debounce_by_key(WINDOW, |&(key, _): &(&str, u32)| key);

        tx.send(("a", 1)).unwrap();
        sleep(Duration::from_millis(30)).await;
        tx.send(("a", 2)).unwrap();
        sleep(Duration::from_millis(30)).await;
        tx.send(("a", 3)).unwrap();
        // Quiet past the window, then a fresh event.
        sleep(Duration::from_millis(140)).await;
        tx.send(("a", 4)).unwrap();

        assert_eq!(rx.recv().await, Some(("a", 3)));
        assert_eq!(rx.recv().await, Some(("a", 4)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn emission_waits_for_window_of_silence() {
        let (tx, mut rx) = debounce_by_key(WINDOW, |&(key, _): &(&str, u32)| key);

        tx.send(("a", 1)).unwrap();
        sleep(Duration::from_millis(99)).await;
        assert!(rx.try_recv().is_err());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.try_recv().ok(), Some(("a", 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn keys_debounce_independently() {
        let (tx, mut rx) = debounce_by_key(WINDOW, |&(key, _): &(&str, u32)| key);

        tx.send(("a", 1)).unwrap();
        sleep(Duration::from_millis(60)).await;
        // Keeps "a"'s deadline untouched.
        tx.send(("b", 9)).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let mut flushed = vec![first, second];
        flushed.sort();
        assert_eq!(flushed, vec![("a", 1), ("b", 9)]);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_events_flush_after_sender_drop() {
        let (tx, mut rx) = debounce_by_key(WINDOW, |&(key, _): &(&str, u32)| key);
        tx.send(("a", 1)).unwrap();
        drop(tx);

        assert_eq!(rx.recv().await, Some(("a", 1)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn collapse_all_emits_ordered_batches() {
        let (tx, mut rx) = debounce_all::<u32>(WINDOW);

        tx.send(1).unwrap();
        sleep(Duration::from_millis(40)).await;
        tx.send(2).unwrap();
        sleep(Duration::from_millis(40)).await;
        tx.send(3).unwrap();

        assert_eq!(rx.recv().await, Some(vec![1, 2, 3]));

        sleep(Duration::from_millis(200)).await;
        tx.send(4).unwrap();
        assert_eq!(rx.recv().await, Some(vec![4]));
    }
}
