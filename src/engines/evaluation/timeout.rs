use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Run `f` on a dedicated worker thread with a hard deadline.
///
/// Pipeline fitting is arbitrary numeric code that never checks a
/// cancellation flag, so a cooperative timeout cannot bound it. Instead the
/// call is shipped to a fresh worker; if the deadline expires the worker is
/// abandoned (dropped, not joined), its eventual result is discarded into a
/// closed channel, and the caller proceeds immediately.
///
/// Returns `None` on deadline expiry (or if the worker could not be
/// spawned), `Some(result)` otherwise.
pub fn call_with_deadline<T, F>(deadline: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("evopipe-eval".to_string())
        .spawn(move || {
            // The receiver may be gone already; the send result is moot.
            let _ = tx.send(f());
        });

    if let Err(e) = spawned {
        log::warn!("could not spawn evaluation worker: {}", e);
        return None;
    }

    match rx.recv_timeout(deadline) {
        Ok(value) => Some(value),
        Err(_) => None,
    }
}
