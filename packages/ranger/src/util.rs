//! Producer task utility.
//!
//! Runs a producer in the background and hands back only the receiver. The producer should stop
//! once a send fails, which happens as soon as the receiver is dropped.

use crate::{pair, Receiver, Sender};
use std::{
    future::Future,
    thread,
};


/// Spawn a tokio task that produces values into a new channel, and return the receiver
///
/// Must be called from within a tokio runtime.
pub fn spawn<T, F, Fut>(produce: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce(Sender<T>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (send, recv) = pair();
    tokio::task::spawn(produce(send));
    recv
}

/// Spawn an OS thread that produces values into a new channel, and return the receiver
///
/// The producer should block on its sends, such as with [`SendFut::block`][1].
///
/// [1]: crate::future::SendFut::block
pub fn spawn_thread<T, F>(produce: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce(Sender<T>) + Send + 'static,
{
    let (send, recv) = pair();
    thread::spawn(move || produce(send));
    recv
}
