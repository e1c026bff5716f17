//! Single-producer single-consumer rendezvous channels that cannot strand either side.
//!
//! [`pair`] creates a linked [`Sender`] and [`Receiver`]. The sender learns when the receiver has
//! been dropped, and the receiver learns when the sender has finished:
//!
//! - [`Sender::send`] resolves once the receiver has taken the value, or fails (handing the value
//!   back) once the receiver is gone.
//! - [`Receiver::recv`] resolves to `Some` with the next value, or `None` once the sender has
//!   closed.
//!
//! This is a convenient way to let a producing task exit when its consumer stops reading, without
//! requiring the consumer to remember any cleanup: dropping the receiver is enough.
//!
//! ```
//! let (mut send, mut recv) = ranger::pair();
//! let producer = std::thread::spawn(move || {
//!     for i in 0.. {
//!         if send.send(i).block().is_err() {
//!             // the receiver is gone
//!             return i;
//!         }
//!     }
//!     unreachable!()
//! });
//! assert_eq!(recv.recv().block(), Some(0));
//! assert_eq!(recv.recv().block(), Some(1));
//! drop(recv);
//! assert_eq!(producer.join().unwrap(), 2);
//! ```

#[macro_use]
extern crate tracing;

mod channel;
pub mod util;

pub use crate::channel::api::*;

/// Error types
pub mod error {
    pub use crate::channel::error::*;
}

/// Future types
pub mod future {
    pub use crate::channel::api::future::*;
}
