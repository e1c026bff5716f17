// minimal safe API for the channel. the exposed API is a convenience wrapper around this.

use super::polling::Rescind;
use std::{
    future::Future,
    mem::replace,
    pin::Pin,
    sync::{
        atomic::{
            Ordering::Relaxed,
            AtomicU8,
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    task::{Poll, Context, Waker},
};


// handle to a channel.
pub(crate) struct Channel<T>(Arc<Shared<T>>);

// channel shared state.
struct Shared<T> {
    // mutex around lockable state.
    lockable: Mutex<Lockable<T>>,

    // begins as SendState::Normal. may eventually change to SendState::Abandoned.
    //
    // - only changes while lockable is locked.
    // - once abandoned, never changes again.
    // - if abandoned, send operations return their elem back instead of offering it.
    send_state: AtomicU8,
    // begins as RecvState::Normal. may eventually change to a different value.
    //
    // - only changes while lockable is locked.
    // - once changes to a value other than normal, never changes again.
    // - if holds a value other than normal, recv operations return none once the slot is empty.
    recv_state: AtomicU8,
}

// channel lockable state.
struct Lockable<T> {
    // elem offered by the pending send, not yet taken by a recv.
    //
    // only the send side puts elems in, so if a send future observes that the slot is empty after
    // offering, its elem was taken.
    slot: Option<T>,
    // waker for the pending send future.
    send_waker: Option<Waker>,
    // waker for the pending recv future.
    recv_waker: Option<Waker>,
    // waker for the pending abandoned future.
    abandoned_waker: Option<Waker>,
}

// possible values for Shared.send_state
#[repr(u8)]
pub(crate) enum SendState {
    // sending may still be possible.
    Normal,
    // the receiver has been dropped.
    Abandoned,
}

// possible values for Shared.recv_state
#[repr(u8)]
pub(crate) enum RecvState {
    // receiving may still be possible.
    Normal,
    // the sender was closed.
    Closed,
    // the sender was dropped without closing.
    SenderDropped,
}

// replace the waker in the slot with the waker from the context, unless it would wake the same
// task anyways.
fn store_waker(slot: &mut Option<Waker>, cx: &Context) {
    if !slot.as_ref().is_some_and(|waker| waker.will_wake(cx.waker())) {
        *slot = Some(cx.waker().clone());
    }
}

// take and wake the waker in the slot, if any.
//
// must be called while the channel is locked, so that the woken future cannot observe its
// resolution and return before we're done with its waker.
fn wake(slot: &mut Option<Waker>) {
    if let Some(waker) = slot.take() {
        waker.wake();
    }
}

impl<T> Channel<T> {
    // construct empty channel.
    pub(crate) fn new() -> Self {
        Channel(Arc::new(Shared {
            lockable: Mutex::new(Lockable {
                slot: None,
                send_waker: None,
                recv_waker: None,
                abandoned_waker: None,
            }),
            send_state: AtomicU8::new(SendState::Normal as u8),
            recv_state: AtomicU8::new(RecvState::Normal as u8),
        }))
    }

    // clone another handle to the channel.
    pub(crate) fn clone(&self) -> Self {
        Channel(Arc::clone(&self.0))
    }

    // atomic-read the send state byte.
    pub(crate) fn send_state(&self) -> u8 {
        self.0.send_state.load(Relaxed)
    }

    // atomic-read the recv state byte.
    pub(crate) fn recv_state(&self) -> u8 {
        self.0.recv_state.load(Relaxed)
    }

    // lock the channel.
    //
    // poisoning is ignored: the lockable state is never left half-modified, and the only foreign
    // code that runs under the lock is waking wakers.
    pub(crate) fn lock(&self) -> Lock<'_, T> {
        Lock {
            shared: &self.0,
            lock: self.0.lockable.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    // poll for an elem.
    //
    // - resolves to some upon taking an elem from the slot, waking the send future that offered
    //   it.
    // - resolves to none if the slot is empty and the recv state is not normal.
    // - otherwise, installs the context's waker as the recv waker and returns pending.
    //
    // internally locks the channel.
    pub(crate) fn poll_recv(&self, cx: &mut Context) -> Poll<Option<T>> {
        let mut lock = self.lock();
        if let Some(elem) = lock.lock.slot.take() {
            lock.lock.recv_waker = None;
            wake(&mut lock.lock.send_waker);
            return Poll::Ready(Some(elem));
        }
        if self.recv_state() != RecvState::Normal as u8 {
            lock.lock.recv_waker = None;
            return Poll::Ready(None);
        }
        store_waker(&mut lock.lock.recv_waker, cx);
        Poll::Pending
    }

    // poll for the channel becoming abandoned.
    //
    // internally locks the channel, unless it is already abandoned.
    pub(crate) fn poll_abandoned(&self, cx: &mut Context) -> Poll<()> {
        if self.send_state() != SendState::Normal as u8 {
            return Poll::Ready(());
        }
        let mut lock = self.lock();
        if self.send_state() != SendState::Normal as u8 {
            lock.lock.abandoned_waker = None;
            return Poll::Ready(());
        }
        store_waker(&mut lock.lock.abandoned_waker, cx);
        Poll::Pending
    }

    // whether the recv state is not normal and no elem remains in the slot.
    //
    // internally locks the channel, unless the recv state is normal.
    pub(crate) fn is_drained(&self) -> bool {
        self.recv_state() != RecvState::Normal as u8 && self.lock().lock.slot.is_none()
    }
}

// lock on a channel.
pub(crate) struct Lock<'a, T> {
    shared: &'a Arc<Shared<T>>,
    lock: MutexGuard<'a, Lockable<T>>,
}

impl<'a, T> Lock<'a, T> {
    // if the send state is normal, change it to abandoned and wake the pending send future and
    // abandoned future. returns whether it changed.
    //
    // a pending send future will take its elem back out of the slot when it next polls.
    pub(crate) fn abandon(&mut self) -> bool {
        if self.shared.send_state.load(Relaxed) != SendState::Normal as u8 {
            return false;
        }
        self.shared.send_state.store(SendState::Abandoned as u8, Relaxed);
        wake(&mut self.lock.send_waker);
        wake(&mut self.lock.abandoned_waker);
        true
    }

    // if the recv state is normal, change it to the given terminal state and wake the pending recv
    // future. returns whether it changed.
    pub(crate) fn finish(&mut self, state: RecvState) -> bool {
        if self.shared.recv_state.load(Relaxed) != RecvState::Normal as u8 {
            return false;
        }
        self.shared.recv_state.store(state as u8, Relaxed);
        wake(&mut self.lock.recv_waker);
        true
    }
}


// ==== futures ====


// send future. internally locks the channel when polled or dropped.
pub(crate) struct Send<'a, T> {
    channel: &'a Channel<T>,
    stage: Stage<T>,
}

// progress of a send future.
enum Stage<T> {
    // elem not yet put in the slot.
    Unoffered(T),
    // elem put in the slot. it is still there unless a recv took it.
    Offered,
    // resolved or rescinded.
    Terminated,
}

impl<'a, T> Send<'a, T> {
    // construct a send future which will offer elem when first polled.
    pub(crate) fn new(channel: &'a Channel<T>, elem: T) -> Self {
        Send { channel, stage: Stage::Unoffered(elem) }
    }

    // if not already resolved or rescinded, withdraw the elem from the slot and return it.
    //
    // returns none if the elem was already taken by a recv. never panics.
    pub(crate) fn cancel(&mut self) -> Option<T> {
        match replace(&mut self.stage, Stage::Terminated) {
            Stage::Terminated => None,
            Stage::Unoffered(elem) => Some(elem),
            Stage::Offered => {
                let mut lock = self.channel.lock();
                lock.lock.send_waker = None;
                let elem = lock.lock.slot.take();
                if elem.is_some() {
                    trace!("send withdrawn before being received");
                }
                elem
            }
        }
    }

    // whether already resolved or rescinded.
    pub(crate) fn is_terminated(&self) -> bool {
        matches!(&self.stage, &Stage::Terminated)
    }

    // whether the channel has been abandoned.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.channel.send_state() != SendState::Normal as u8
    }
}

impl<'a, T> Future for Send<'a, T> {
    // on err, the elem was not received.
    type Output = Result<(), T>;

    // poll the future.
    //
    // - on first poll, offers the elem by putting it in the slot and waking the recv future.
    // - resolves to ok once the slot is empty again.
    // - resolves to err with the elem if the channel is abandoned before the elem is taken.
    //
    // internally locks the channel. panics if already resolved or rescinded.
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = self.get_mut();
        let channel = this.channel;
        let mut lock = channel.lock();

        // now that channel is locked, we can check for abandonment without race conditions
        let abandoned = channel.send_state() != SendState::Normal as u8;
        match replace(&mut this.stage, Stage::Terminated) {
            Stage::Terminated => panic!("send future polled after already resolved or rescinded"),
            Stage::Unoffered(elem) => {
                if abandoned {
                    return Poll::Ready(Err(elem));
                }
                if lock.lock.slot.is_some() {
                    // a previous send future was leaked while offered. its elem stays receivable,
                    // so wait for the recv to take it before offering ours.
                    store_waker(&mut lock.lock.send_waker, cx);
                    this.stage = Stage::Unoffered(elem);
                    return Poll::Pending;
                }
                lock.lock.slot = Some(elem);
                wake(&mut lock.lock.recv_waker);
                store_waker(&mut lock.lock.send_waker, cx);
                this.stage = Stage::Offered;
                Poll::Pending
            }
            Stage::Offered => {
                if abandoned || lock.lock.slot.is_none() {
                    lock.lock.send_waker = None;
                    // the recv may have taken it just before the channel was abandoned
                    return Poll::Ready(match lock.lock.slot.take() {
                        Some(elem) => Err(elem),
                        None => Ok(()),
                    });
                }
                store_waker(&mut lock.lock.send_waker, cx);
                this.stage = Stage::Offered;
                Poll::Pending
            }
        }
    }
}

impl<'a, T> Rescind for Send<'a, T> {
    type Rescinded = Option<T>;

    fn rescind(&mut self) -> Option<T> {
        self.cancel()
    }
}

// the elem is never pinned.
impl<'a, T> Unpin for Send<'a, T> {}

impl<'a, T> Drop for Send<'a, T> {
    fn drop(&mut self) {
        // make sure an elem left in the slot doesn't get received after all
        self.cancel();
    }
}


// recv future. internally locks the channel when polled, or when dropped while pending.
pub(crate) struct Recv<'a, T> {
    channel: &'a Channel<T>,
    terminated: bool,
}

impl<'a, T> Recv<'a, T> {
    // construct a recv future.
    pub(crate) fn new(channel: &'a Channel<T>) -> Self {
        Recv { channel, terminated: false }
    }

    // if not already resolved or cancelled, cancel the future, dropping its waker.
    pub(crate) fn cancel(&mut self) {
        if !replace(&mut self.terminated, true) {
            self.channel.lock().lock.recv_waker = None;
        }
    }

    // whether already resolved or cancelled.
    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<'a, T> Future for Recv<'a, T> {
    type Output = Option<T>;

    // poll the future. see `Channel::poll_recv`. panics if already resolved or cancelled.
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = self.get_mut();
        assert!(!this.terminated, "recv future polled after already resolved or cancelled");
        let poll = this.channel.poll_recv(cx);
        this.terminated = poll.is_ready();
        poll
    }
}

impl<'a, T> Rescind for Recv<'a, T> {
    type Rescinded = ();

    fn rescind(&mut self) {
        self.cancel()
    }
}

impl<'a, T> Drop for Recv<'a, T> {
    fn drop(&mut self) {
        self.cancel();
    }
}


// future for the channel becoming abandoned.
pub(crate) struct Abandoned<'a, T> {
    channel: &'a Channel<T>,
    terminated: bool,
}

impl<'a, T> Abandoned<'a, T> {
    // construct an abandoned future.
    pub(crate) fn new(channel: &'a Channel<T>) -> Self {
        Abandoned { channel, terminated: false }
    }

    // if not already resolved or cancelled, cancel the future, dropping its waker.
    pub(crate) fn cancel(&mut self) {
        if !replace(&mut self.terminated, true) {
            self.channel.lock().lock.abandoned_waker = None;
        }
    }

    // whether already resolved or cancelled.
    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<'a, T> Future for Abandoned<'a, T> {
    type Output = ();

    // poll the future. see `Channel::poll_abandoned`. panics if already resolved or cancelled.
    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
        let this = self.get_mut();
        assert!(!this.terminated, "abandoned future polled after already resolved or cancelled");
        let poll = this.channel.poll_abandoned(cx);
        this.terminated = poll.is_ready();
        poll
    }
}

impl<'a, T> Rescind for Abandoned<'a, T> {
    type Rescinded = ();

    fn rescind(&mut self) {
        self.cancel()
    }
}

impl<'a, T> Drop for Abandoned<'a, T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
