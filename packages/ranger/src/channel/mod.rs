// implementation of the ranger channel.
//
// a channel is a rendezvous between exactly one sender and exactly one receiver. it carries two
// signals in opposite directions:
//
// - values flow from sender to receiver through a single slot. the sender puts its value into
//   the slot and waits for the slot to become empty again, which means the receiver took it.
// - "abandoned" flows from receiver to sender. it is raised when the receiver handle is dropped,
//   and makes every pending and future send fail, handing the value back.
//
// "closed" (end-of-stream) is the third signal, raised when the sender handle is closed or
// dropped, and makes every pending and future recv resolve to none once the slot is empty.
//
// channel handles wrap around Arc<shared state>
//                                  |
//          /-----------------------/
//          v
//       shared state
//          |
//          |------ atomic send state and recv state bytes. these only change while the mutex is
//          |       held, but may be read without it as a fast path.
//          |
//          \------ mutex around the slot and the wakers of the pending send future, the pending
//                  recv future, and the pending abandoned future.
//
// blocking versions of operations are built as a layer on top of the futures in the polling
// module, which parks the current thread until woken.
//
// the organization of these modules is as such:
//
//      core: owns the locking protocol. presents futures which are safe but panicky when misused.
//       ^
//       |
//      api: wrapper around core that adapts it into an API that is convenient and makes misuse
//           unrepresentable. the crate re-exports this API publically.
//       |
//       v
//      polling: blocks the current thread on a core future, with optional deadline.
//
// there is also the error module, which contains the relevant error types, which is also
// re-exported publically.

pub(crate) mod error;
pub(crate) mod api;

mod polling;
mod core;
