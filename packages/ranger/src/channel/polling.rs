// blocking the current thread on a channel future.
//
// design based on pollster crate: the waker notifies a mutex + condvar that the blocked thread
// waits on between polls.

use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Condvar, Mutex, PoisonError},
    task::{Context, Poll, Wake, Waker},
    time::Instant,
};


// `Future` which can be abandoned before resolving, without losing whatever it was holding.
//
// if polling times out, rescind is called, and its output is returned instead. the future is
// never polled again after that.
pub(crate) trait Rescind: Future {
    type Rescinded;

    fn rescind(&mut self) -> Self::Rescinded;
}

// timeout for blocking on a future.
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
    // time out if the future cannot be resolved without blocking.
    NonBlocking,
}

// poll the future until it resolves or the timeout is reached, in which case rescind it and
// return err.
pub(crate) fn poll<F>(fut: &mut F, timeout: Timeout) -> Result<F::Output, F::Rescinded>
where
    F: Rescind + Unpin,
{
    let signal = Arc::new(Signal {
        notified: Mutex::new(false),
        cond: Condvar::new(),
    });
    let waker = Waker::from(Arc::clone(&signal));
    let mut cx = Context::from_waker(&waker);
    loop {
        if let Poll::Ready(output) = Pin::new(&mut *fut).poll(&mut cx) {
            return Ok(output);
        }
        if !signal.wait(&timeout) {
            return Err(fut.rescind());
        }
    }
}

// synchronization signal. the bool is whether a notification is pending.
struct Signal {
    notified: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    // block until notified or timed out, consuming the notification. returns false if timed out.
    fn wait(&self, timeout: &Timeout) -> bool {
        let mut notified = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
        match timeout {
            &Timeout::Never =>
                while !*notified {
                    notified = self.cond.wait(notified).unwrap_or_else(PoisonError::into_inner);
                },
            &Timeout::At(deadline) =>
                while !*notified {
                    let Some(duration) =
                        deadline.checked_duration_since(Instant::now())
                        else { return false };
                    notified = self.cond.wait_timeout(notified, duration)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                },
            // a notification may still have arrived since the last poll
            &Timeout::NonBlocking =>
                if !*notified {
                    return false;
                },
        }
        *notified = false;
        true
    }
}

impl Wake for Signal {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        *self.notified.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_one();
    }
}
