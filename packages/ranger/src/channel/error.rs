// channel error types.

use std::fmt::{self, Debug, Display, Formatter};
use thiserror::Error;


// ==== base error types ====


/// Error for trying to send into a channel whose receiver has been dropped or released
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("receiver abandoned the channel")]
pub struct AbandonedError;

/// Error for attempting to use a channel with no or limited blocking, and the operation not
/// completing immediately or by the specified deadline
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("operation would block")]
pub struct WouldBlockError;


// ==== compound error types ====


/// Error for trying to send into a channel
///
/// The message was not delivered, and is handed back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SendError<T, E = AbandonedError> {
    /// The message that could not be sent
    pub msg: T,
    /// The reason the message could not be sent
    pub cause: E,
}

impl<T, E> SendError<T, E> {
    /// Take back the message that could not be sent
    pub fn into_inner(self) -> T {
        self.msg
    }
}

impl<T, E: Display> Display for SendError<T, E> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "message not sent: {}", self.cause)
    }
}

impl<T: Debug, E: Debug + Display> std::error::Error for SendError<T, E> {}

/// Error for trying to send into a channel with limited blocking
pub type TrySendError<T> = SendError<T, TrySendErrorCause>;

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(error: SendError<T>) -> Self {
        SendError { msg: error.msg, cause: error.cause.into() }
    }
}

macro_rules! compound_from {
    ($compound:ident {$(
        $variant:ident($inner:ty),
    )*})=>{$(
        impl From<$inner> for $compound {
            fn from(inner: $inner) -> Self {
                Self::$variant(inner)
            }
        }
    )*};
}

/// Reason a send with limited blocking did not deliver its message
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TrySendErrorCause {
    /// The receiver has been dropped or released
    #[error(transparent)]
    Abandoned(AbandonedError),
    /// The receiver did not take the message by the specified deadline
    #[error(transparent)]
    WouldBlock(WouldBlockError),
}

compound_from!(TrySendErrorCause {
    Abandoned(AbandonedError),
    WouldBlock(WouldBlockError),
});

/// Terminal state for trying to receive from a channel
///
/// Both are graceful: no value was lost, and every value the sender saw delivered was received.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum RecvTerminalState {
    /// The sender was closed with [`Sender::close`](crate::Sender::close)
    Closed,
    /// The sender was dropped without being closed
    SenderDropped,
}
