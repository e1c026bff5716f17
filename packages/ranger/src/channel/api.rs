// exposed API of channels

use self::future::*;
use super::{
    error::*,
    core,
};
use std::fmt::{self, Debug, Formatter};


// ==== helper functions for adapting core API to exposed API ====


// mark the channel abandoned, avoiding locking if possible.
fn abandon<T>(channel: &core::Channel<T>) {
    if channel.send_state() == core::SendState::Normal as u8 && channel.lock().abandon() {
        debug!("receiver abandoned channel");
    }
}

// end the stream with the given terminal state, avoiding locking if possible.
fn finish<T>(channel: &core::Channel<T>, state: core::RecvState) -> bool {
    channel.recv_state() == core::RecvState::Normal as u8 && channel.lock().finish(state)
}

// convert recv state byte into typed representation of optional terminal state.
fn recv_terminal_state(recv_state_byte: u8) -> Option<RecvTerminalState> {
    if recv_state_byte == core::RecvState::Normal as u8 {
        None
    } else if recv_state_byte == core::RecvState::Closed as u8 {
        Some(RecvTerminalState::Closed)
    } else if recv_state_byte == core::RecvState::SenderDropped as u8 {
        Some(RecvTerminalState::SenderDropped)
    } else {
        unreachable!("invalid recv_state_byte: {}", recv_state_byte)
    }
}


// ==== the exposed API ====


/// Create a linked sender and receiver
///
/// The channel has no buffer: each [`send`](Sender::send) waits until the receiver takes its value
/// with [`recv`](Receiver::recv), or until the receiver is dropped.
pub fn pair<T>() -> (Sender<T>, Receiver<T>) {
    let channel_1 = core::Channel::new();
    let channel_2 = channel_1.clone();
    let send = Sender { channel: channel_1, closing: false };
    let recv = Receiver(channel_2);
    (send, recv)
}


/// Sender half of a channel
///
/// Dropping the sender without calling [`close`](Self::close) still ends the stream, but the
/// receiver can tell the difference through [`Receiver::terminal_state`].
pub struct Sender<T> {
    channel: core::Channel<T>,
    // set by close right before dropping.
    closing: bool,
}

impl<T> Sender<T> {
    /// Create a future to send a value to the receiver
    ///
    /// See the API of [`SendFut`], as it is not only a future, but also provides additional
    /// methods, including the API for blocking on a send operation.
    pub fn send(&mut self, msg: T) -> SendFut<'_, T> {
        SendFut(core::Send::new(&self.channel, msg))
    }

    /// Close the sender, telling the receiver that no more values will arrive
    pub fn close(mut self) {
        self.closing = true;
        drop(self);
    }

    /// Whether the receiver has been dropped or released
    ///
    /// If this returns true, all attempts to send will fail.
    pub fn is_abandoned(&self) -> bool {
        self.channel.send_state() != core::SendState::Normal as u8
    }

    /// Create a future that resolves once the receiver has been dropped or released
    pub fn abandoned(&mut self) -> AbandonedFut<'_, T> {
        AbandonedFut(core::Abandoned::new(&self.channel))
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.closing {
            if finish(&self.channel, core::RecvState::Closed) {
                trace!("sender closed channel");
            }
        } else if finish(&self.channel, core::RecvState::SenderDropped) {
            debug!("sender dropped without closing channel");
        }
    }
}

impl<T> Debug for Sender<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Sender")
            .field("abandoned", &self.is_abandoned())
            .finish_non_exhaustive()
    }
}


/// Receiver half of a channel
///
/// Dropping the receiver, or calling [`release`](Self::release), abandons the channel, which makes
/// the sender's pending and future sends fail.
pub struct Receiver<T>(core::Channel<T>);

impl<T> Receiver<T> {
    /// Create a future to receive the next value from the sender
    ///
    /// Resolves to `None` once the sender has been closed or dropped. See the API of [`RecvFut`],
    /// as it is not only a future, but also provides additional methods, including the API for
    /// blocking on a recv operation or trying to recv immediately.
    pub fn recv(&mut self) -> RecvFut<'_, T> {
        RecvFut(core::Recv::new(&self.0))
    }

    /// Release the receiver, telling the sender that no more values will be received
    ///
    /// Equivalent to dropping it.
    pub fn release(self) {
        drop(self);
    }

    /// If the sender has ended the stream, get how it did so
    ///
    /// A value offered before the stream ended may still be received even once this returns
    /// `Some`. After that, all attempts to receive will return `None`.
    pub fn terminal_state(&self) -> Option<RecvTerminalState> {
        recv_terminal_state(self.0.recv_state())
    }

    /// Iterate over received values, blocking the current thread on each
    pub fn iter(&mut self) -> Iter<'_, T> {
        Iter(self)
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        abandon(&self.0);
    }
}

impl<T> Debug for Receiver<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("terminal_state", &self.terminal_state())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "futures")]
impl<T> futures::stream::Stream for Receiver<T> {
    type Item = T;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context,
    ) -> std::task::Poll<Option<T>> {
        self.get_mut().0.poll_recv(cx)
    }
}

#[cfg(feature = "futures")]
impl<T> futures::stream::FusedStream for Receiver<T> {
    fn is_terminated(&self) -> bool {
        self.0.is_drained()
    }
}

/// Blocking iterator over values received by a borrowed [`Receiver`]
pub struct Iter<'a, T>(&'a mut Receiver<T>);

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.recv().block()
    }
}

/// Blocking iterator over values received by an owned [`Receiver`]
///
/// Dropping the iterator drops the receiver.
pub struct IntoIter<T>(Receiver<T>);

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.0.recv().block()
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter(self)
    }
}

impl<'a, T> IntoIterator for &'a mut Receiver<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}


// future types for channels.
pub(crate) mod future {
    use super::*;
    use crate::channel::polling::{Timeout, poll};
    use std::{
        task::{Poll, Context},
        future::Future,
        pin::{Pin, pin},
        time::{Duration, Instant},
    };

    /// Future for sending into a [`Sender`]
    ///
    /// The value is offered to the receiver when this future is first polled, and this future
    /// resolves once the receiver has taken it. If the receiver is dropped first, this future
    /// resolves to an error which hands the value back: in that case, it was never received.
    ///
    /// If this future has not yet resolved, the send operation may be aborted and its value
    /// retrieved by calling [`rescind`](Self::rescind) (or by dropping).
    ///
    /// Errors are "sticky": once the receiver is gone, every further send fails immediately.
    #[must_use = "futures do nothing unless polled or blocked on"]
    pub struct SendFut<'a, T>(pub(super) core::Send<'a, T>);

    fn map_send_result<T>(result: Result<(), T>) -> Result<(), SendError<T>> {
        result.map_err(|msg| SendError { msg, cause: AbandonedError })
    }

    pub(super) fn map_try_send_result<T>(
        result: Result<Result<(), T>, Option<T>>,
        abandoned: bool,
    ) -> Result<(), TrySendError<T>> {
        match result {
            Ok(send_result) => map_send_result(send_result).map_err(TrySendError::from),
            // taken by the receiver right before timing out
            Err(None) => Ok(()),
            // abandoned right before timing out
            Err(Some(msg)) if abandoned => Err(SendError { msg, cause: AbandonedError.into() }),
            Err(Some(msg)) => {
                trace!("send timed out");
                Err(SendError { msg, cause: WouldBlockError.into() })
            }
        }
    }

    impl<'a, T> Future for SendFut<'a, T> {
        type Output = Result<(), SendError<T>>;

        fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
            let this = self.get_mut();
            // for implementation of FusedFuture
            if this.is_terminated() {
                return Poll::Pending;
            }
            pin!(&mut this.0)
                .poll(cx)
                .map(map_send_result)
        }
    }

    impl<'a, T> SendFut<'a, T> {
        /// If the value has not yet been received, abort the send operation and take it back
        ///
        /// Returns `None` if this future has already resolved or rescinded, or if the receiver
        /// already took the value.
        pub fn rescind(&mut self) -> Option<T> {
            self.0.cancel()
        }

        /// Block until this future resolves
        ///
        /// Calling this method counts as polling this future, and when this method returns, that
        /// counts as this future resolving. This method will panic if this future has already
        /// resolved or rescinded.
        pub fn block(&mut self) -> Result<(), SendError<T>> {
            assert!(!self.is_terminated(), "SendFut.block called after terminated");
            match poll(&mut self.0, Timeout::Never) {
                Ok(result) => map_send_result(result),
                Err(_) => unreachable!("poll timed out with Timeout::Never"),
            }
        }

        /// Block until this future resolves or a timeout elapses
        ///
        /// If the timeout elapses first, the value is rescinded and returned with
        /// [`WouldBlockError`]. Calling this method counts as polling this future, and when this
        /// method returns, that counts as this future resolving. This method will panic if this
        /// future has already resolved or rescinded.
        pub fn block_timeout(&mut self, timeout: Duration) -> Result<(), TrySendError<T>> {
            assert!(!self.is_terminated(), "SendFut.block_timeout called after terminated");
            self.block_deadline(Instant::now() + timeout)
        }

        /// Block until this future resolves or the deadline is reached
        ///
        /// If the deadline is reached first, the value is rescinded and returned with
        /// [`WouldBlockError`]. Calling this method counts as polling this future, and when this
        /// method returns, that counts as this future resolving. This method will panic if this
        /// future has already resolved or rescinded.
        pub fn block_deadline(&mut self, deadline: Instant) -> Result<(), TrySendError<T>> {
            assert!(!self.is_terminated(), "SendFut.block_deadline called after terminated");
            let result = poll(&mut self.0, Timeout::At(deadline));
            map_try_send_result(result, self.0.is_abandoned())
        }

        /// Whether this future has already resolved or rescinded
        pub fn is_terminated(&self) -> bool {
            self.0.is_terminated()
        }
    }

    #[cfg(feature = "futures")]
    impl<'a, T> futures::future::FusedFuture for SendFut<'a, T> {
        fn is_terminated(&self) -> bool {
            Self::is_terminated(self)
        }
    }


    /// Future for receiving from a [`Receiver`]
    ///
    /// Resolves to `None` to represent end-of-stream: the sender has been closed or dropped, and
    /// no value remains to be received. End-of-stream is permanent.
    ///
    /// A value is only taken from the sender when this future resolves, so aborting a pending
    /// receive with [`abort`](Self::abort) (or by dropping) never loses a value.
    #[must_use = "futures do nothing unless polled or blocked on"]
    pub struct RecvFut<'a, T>(pub(super) core::Recv<'a, T>);

    fn map_try_recv_result<T>(result: Result<Option<T>, ()>) -> Result<Option<T>, WouldBlockError> {
        result.map_err(|()| WouldBlockError)
    }

    impl<'a, T> Future for RecvFut<'a, T> {
        type Output = Option<T>;

        fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
            let this = self.get_mut();
            // for implementation of FusedFuture
            if this.is_terminated() {
                return Poll::Pending;
            }
            pin!(&mut this.0).poll(cx)
        }
    }

    impl<'a, T> RecvFut<'a, T> {
        /// Try to abort this receive operation
        ///
        /// This aborts the receive operation, unless this future has already resolved or aborted,
        /// in which case this does nothing. This method never panics.
        pub fn abort(&mut self) {
            self.0.cancel();
        }

        /// Block until this future resolves
        ///
        /// Calling this method counts as polling this future, and when this method returns, that
        /// counts as this future resolving. This method will panic if this future has already
        /// resolved or aborted.
        pub fn block(&mut self) -> Option<T> {
            assert!(!self.is_terminated(), "RecvFut.block called after terminated");
            match poll(&mut self.0, Timeout::Never) {
                Ok(msg) => msg,
                Err(()) => unreachable!("poll timed out with Timeout::Never"),
            }
        }

        /// Try to resolve this future immediately without blocking
        ///
        /// Succeeds if the sender is already waiting with a value, or the stream has ended.
        /// Calling this method counts as polling this future, and if this method returns anything
        /// other than [`WouldBlockError`], that counts as this future resolving. This method will
        /// panic if this future has already resolved or aborted.
        pub fn try_now(&mut self) -> Result<Option<T>, WouldBlockError> {
            assert!(!self.is_terminated(), "RecvFut.try_now called after terminated");
            map_try_recv_result(poll(&mut self.0, Timeout::NonBlocking))
        }

        /// Block until this future resolves or a timeout elapses
        ///
        /// Calling this method counts as polling this future, and if this method returns anything
        /// other than [`WouldBlockError`], that counts as this future resolving. This method will
        /// panic if this future has already resolved or aborted.
        pub fn block_timeout(&mut self, timeout: Duration) -> Result<Option<T>, WouldBlockError> {
            assert!(!self.is_terminated(), "RecvFut.block_timeout called after terminated");
            self.block_deadline(Instant::now() + timeout)
        }

        /// Block until this future resolves or the deadline is reached
        ///
        /// Calling this method counts as polling this future, and if this method returns anything
        /// other than [`WouldBlockError`], that counts as this future resolving. This method will
        /// panic if this future has already resolved or aborted.
        pub fn block_deadline(&mut self, deadline: Instant) -> Result<Option<T>, WouldBlockError> {
            assert!(!self.is_terminated(), "RecvFut.block_deadline called after terminated");
            map_try_recv_result(poll(&mut self.0, Timeout::At(deadline)))
        }

        /// Whether this future has already resolved or aborted
        pub fn is_terminated(&self) -> bool {
            self.0.is_terminated()
        }
    }

    #[cfg(feature = "futures")]
    impl<'a, T> futures::future::FusedFuture for RecvFut<'a, T> {
        fn is_terminated(&self) -> bool {
            Self::is_terminated(self)
        }
    }


    /// Future for a [`Sender`]'s receiver being dropped or released
    #[must_use = "futures do nothing unless polled or blocked on"]
    pub struct AbandonedFut<'a, T>(pub(super) core::Abandoned<'a, T>);

    impl<'a, T> Future for AbandonedFut<'a, T> {
        type Output = ();

        fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
            let this = self.get_mut();
            // for implementation of FusedFuture
            if this.is_terminated() {
                return Poll::Pending;
            }
            pin!(&mut this.0).poll(cx)
        }
    }

    impl<'a, T> AbandonedFut<'a, T> {
        /// Block until the receiver is dropped or released
        ///
        /// This method will panic if this future has already resolved.
        pub fn block(&mut self) {
            assert!(!self.is_terminated(), "AbandonedFut.block called after terminated");
            if poll(&mut self.0, Timeout::Never).is_err() {
                unreachable!("poll timed out with Timeout::Never");
            }
        }

        /// Block until the receiver is dropped or released, or a timeout elapses
        ///
        /// This method will panic if this future has already resolved.
        pub fn block_timeout(&mut self, timeout: Duration) -> Result<(), WouldBlockError> {
            assert!(!self.is_terminated(), "AbandonedFut.block_timeout called after terminated");
            self.block_deadline(Instant::now() + timeout)
        }

        /// Block until the receiver is dropped or released, or the deadline is reached
        ///
        /// This method will panic if this future has already resolved.
        pub fn block_deadline(&mut self, deadline: Instant) -> Result<(), WouldBlockError> {
            assert!(!self.is_terminated(), "AbandonedFut.block_deadline called after terminated");
            poll(&mut self.0, Timeout::At(deadline)).map_err(|()| WouldBlockError)
        }

        /// Whether this future has already resolved
        pub fn is_terminated(&self) -> bool {
            self.0.is_terminated()
        }
    }

    #[cfg(feature = "futures")]
    impl<'a, T> futures::future::FusedFuture for AbandonedFut<'a, T> {
        fn is_terminated(&self) -> bool {
            Self::is_terminated(self)
        }
    }
}


// ==== tests ====


#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        thread,
        time::Duration,
    };

    fn ensure_is_send<T: Send>() {}

    fn ensure_is_sync<T: Sync>() {}

    #[test]
    fn handles_are_send_and_sync() {
        ensure_is_send::<Sender<String>>();
        ensure_is_send::<Receiver<String>>();
        ensure_is_sync::<Sender<String>>();
        ensure_is_sync::<Receiver<String>>();
        ensure_is_send::<SendFut<'static, String>>();
        ensure_is_send::<RecvFut<'static, String>>();
    }

    #[test]
    fn sends_then_closes() {
        let (mut send, mut recv) = pair::<i32>();
        let join = thread::spawn(move || {
            for i in 1..=3 {
                send.send(i).block().unwrap();
            }
            send.close();
        });
        assert_eq!(recv.recv().block(), Some(1));
        assert_eq!(recv.recv().block(), Some(2));
        assert_eq!(recv.recv().block(), Some(3));
        assert_eq!(recv.recv().block(), None);
        assert_eq!(recv.recv().block(), None);
        assert_eq!(recv.recv().try_now(), Ok(None));
        assert_eq!(recv.terminal_state(), Some(RecvTerminalState::Closed));
        join.join().unwrap();
    }

    #[test]
    fn send_after_abandon_fails() {
        let (mut send, recv) = pair::<String>();
        drop(recv);
        assert!(send.is_abandoned());
        let error = send.send("x".to_owned()).block().unwrap_err();
        assert_eq!(error.msg, "x");
        assert_eq!(error.cause, AbandonedError);
        assert_eq!(send.send("y".to_owned()).block().unwrap_err().into_inner(), "y");
    }

    #[test]
    fn release_abandons() {
        let (send, recv) = pair::<()>();
        assert!(!send.is_abandoned());
        recv.release();
        assert!(send.is_abandoned());
    }

    #[test]
    fn blocked_recv_unblocks_on_close() {
        let (send, mut recv) = pair::<u8>();
        let join = thread::spawn(move || recv.recv().block());
        thread::sleep(Duration::from_millis(50));
        send.close();
        assert_eq!(join.join().unwrap(), None);
    }

    #[test]
    fn blocked_send_unblocks_on_abandon() {
        let (mut send, recv) = pair::<u8>();
        let join = thread::spawn(move || send.send(5).block());
        thread::sleep(Duration::from_millis(50));
        drop(recv);
        let error = join.join().unwrap().unwrap_err();
        assert_eq!(error.msg, 5);
    }

    #[test]
    fn sender_dropped_ends_stream() {
        let (send, mut recv) = pair::<u8>();
        assert_eq!(recv.terminal_state(), None);
        drop(send);
        assert_eq!(recv.recv().block(), None);
        assert_eq!(recv.terminal_state(), Some(RecvTerminalState::SenderDropped));
    }

    #[test]
    fn timed_out_send_is_not_received() {
        let (mut send, mut recv) = pair::<u8>();
        let error = send.send(1).block_timeout(Duration::from_millis(20)).unwrap_err();
        assert_eq!(error.msg, 1);
        assert_eq!(error.cause, TrySendErrorCause::WouldBlock(WouldBlockError));
        assert_eq!(recv.recv().try_now(), Err(WouldBlockError));
        assert_eq!(recv.recv().block_timeout(Duration::from_millis(20)), Err(WouldBlockError));
        let join = thread::spawn(move || {
            send.send(2).block().unwrap();
            send.close();
        });
        assert_eq!(recv.iter().collect::<Vec<_>>(), vec![2]);
        join.join().unwrap();
    }

    #[test]
    fn try_now_takes_offered_value() {
        let (mut send, mut recv) = pair::<u8>();
        let join = thread::spawn(move || send.send(9).block());
        let msg = loop {
            match recv.recv().try_now() {
                Ok(msg) => break msg,
                Err(WouldBlockError) => thread::sleep(Duration::from_millis(1)),
            }
        };
        assert_eq!(msg, Some(9));
        assert!(join.join().unwrap().is_ok());
    }

    #[test]
    fn rescinded_send_is_not_received() {
        use std::{
            future::Future,
            pin::Pin,
            task::{Context, Waker},
        };

        let (mut send, mut recv) = pair::<u8>();
        let mut fut = send.send(4);
        assert!(Pin::new(&mut fut).poll(&mut Context::from_waker(Waker::noop())).is_pending());
        assert_eq!(fut.rescind(), Some(4));
        assert!(fut.is_terminated());
        drop(fut);
        assert_eq!(recv.recv().try_now(), Err(WouldBlockError));

        // dropping is rescinding
        let mut fut = send.send(6);
        assert!(Pin::new(&mut fut).poll(&mut Context::from_waker(Waker::noop())).is_pending());
        drop(fut);
        assert_eq!(recv.recv().try_now(), Err(WouldBlockError));
    }

    #[test]
    fn abandoned_unblocks() {
        let (mut send, recv) = pair::<u8>();
        assert_eq!(send.abandoned().block_timeout(Duration::from_millis(10)), Err(WouldBlockError));
        let join = thread::spawn(move || {
            send.abandoned().block();
            send.is_abandoned()
        });
        thread::sleep(Duration::from_millis(20));
        drop(recv);
        assert!(join.join().unwrap());
    }

    #[test]
    fn unwinding_receiver_abandons() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let (mut send, recv) = pair::<u8>();
        let join = thread::spawn(move || send.send(7).block());
        thread::sleep(Duration::from_millis(50));
        let result = catch_unwind(AssertUnwindSafe(move || {
            let _recv = recv;
            panic!("consumer failed");
        }));
        assert!(result.is_err());
        let error = join.join().unwrap().unwrap_err();
        assert_eq!(error.msg, 7);
        assert_eq!(error.cause, AbandonedError);
    }

    #[test]
    fn timeout_after_abandon_reports_abandoned() {
        let error = future::map_try_send_result(Err(Some(3)), true).unwrap_err();
        assert_eq!(error.msg, 3);
        assert_eq!(error.cause, TrySendErrorCause::Abandoned(AbandonedError));
        let error = future::map_try_send_result(Err(Some(3)), false).unwrap_err();
        assert_eq!(error.cause, TrySendErrorCause::WouldBlock(WouldBlockError));
        assert_eq!(future::map_try_send_result(Err(None::<u8>), true), Ok(()));
    }

    #[test]
    fn into_iter_collects_stream() {
        let (mut send, recv) = pair();
        let join = thread::spawn(move || {
            for i in 0..100 {
                send.send(i).block().unwrap();
            }
            send.close();
        });
        assert_eq!(recv.into_iter().collect::<Vec<_>>(), (0..100).collect::<Vec<_>>());
        join.join().unwrap();
    }

    #[test]
    fn dropping_iterator_abandons() {
        let (mut send, recv) = pair();
        let join = thread::spawn(move || {
            let mut sent = 0;
            while send.send(sent).block().is_ok() {
                sent += 1;
            }
            sent
        });
        assert_eq!(recv.into_iter().take(10).collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
        assert_eq!(join.join().unwrap(), 10);
    }

    #[test]
    fn stochastic_exactly_once_test() {
        use rand::prelude::*;
        use rand_pcg::Pcg32;

        for round in 0..200u64 {
            let mut rng = Pcg32::seed_from_u64(round);
            let n = rng.gen_range(0..50u32);
            let k = rng.gen_range(0..60u32);
            let send_seed = rng.gen::<u64>();
            let (mut send, mut recv) = pair();

            let join = thread::spawn(move || {
                let mut rng = Pcg32::seed_from_u64(send_seed);
                let mut acked = Vec::new();
                for i in 0..n {
                    let result = if rng.gen_ratio(1, 3) {
                        let timeout = Duration::from_micros(rng.gen_range(0..500));
                        send.send(i).block_timeout(timeout)
                    } else {
                        send.send(i).block().map_err(TrySendError::from)
                    };
                    match result {
                        Ok(()) => acked.push(i),
                        Err(SendError { msg, cause: TrySendErrorCause::WouldBlock(_) }) => {
                            assert_eq!(msg, i);
                        }
                        Err(SendError { msg, cause: TrySendErrorCause::Abandoned(_) }) => {
                            assert_eq!(msg, i);
                            return acked;
                        }
                    }
                }
                send.close();
                acked
            });

            let mut received = Vec::new();
            for _ in 0..k {
                let msg = if rng.gen_ratio(1, 4) {
                    match recv.recv().try_now() {
                        Ok(msg) => msg,
                        Err(WouldBlockError) => continue,
                    }
                } else {
                    recv.recv().block()
                };
                match msg {
                    Some(msg) => received.push(msg),
                    None => break,
                }
            }
            drop(recv);

            let acked = join.join().unwrap();
            assert_eq!(received, acked, "round {}", round);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn async_sends_then_closes() {
        let (mut send, mut recv) = pair();
        let join = tokio::spawn(async move {
            for i in 0..10 {
                send.send(i).await.unwrap();
            }
            send.close();
        });
        let mut received = Vec::new();
        while let Some(i) = recv.recv().await {
            received.push(i);
        }
        assert_eq!(received, (0..10).collect::<Vec<_>>());
        assert!(recv.recv().await.is_none());
        join.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn async_producer_exits_on_abandon() {
        let (mut send, mut recv) = pair();
        let join = tokio::spawn(async move {
            let mut sent = 0;
            while send.send(sent).await.is_ok() {
                sent += 1;
            }
            send.abandoned().await;
            sent
        });
        for i in 0..3 {
            assert_eq!(recv.recv().await, Some(i));
        }
        drop(recv);
        assert_eq!(join.await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn aborted_consumer_task_abandons() {
        let (mut send, mut recv) = pair::<u8>();
        let consumer = tokio::spawn(async move {
            assert_eq!(recv.recv().await, Some(1));
            std::future::pending::<()>().await;
        });
        send.send(1).await.unwrap();
        let producer = tokio::spawn(async move { send.send(2).await });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        consumer.abort();
        assert!(consumer.await.unwrap_err().is_cancelled());
        let error = producer.await.unwrap().unwrap_err();
        assert_eq!(error.msg, 2);
    }

    #[cfg(feature = "futures")]
    #[tokio::test]
    async fn stream_yields_values() {
        use futures::stream::{FusedStream, StreamExt};

        let (mut send, mut recv) = pair();
        tokio::spawn(async move {
            for i in 0..5 {
                send.send(i * 2).await.unwrap();
            }
            send.close();
        });
        let received = (&mut recv).collect::<Vec<_>>().await;
        assert_eq!(received, vec![0, 2, 4, 6, 8]);
        assert!(recv.is_terminated());
        assert_eq!(recv.next().await, None);
    }
}
