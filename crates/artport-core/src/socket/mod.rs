//! Interruptible socket layer.
//!
//! libcurl opens and closes every socket of a connection through this layer
//! (plain and TLS alike, since TLS runs on top of the socket opened here).
//! Each pooled connection owns a `SocketSet`; interrupting the set shuts its
//! live sockets down so any thread blocked in connect/read/write on them
//! returns at once, instead of waiting for a timeout.
//!
//! On non-unix targets sockets are left to libcurl and interruption is only
//! observed through the transfer progress callback.

mod factory;
mod set;

pub use factory::InterruptibleSocketFactory;
pub use set::SocketSet;

#[cfg(unix)]
pub(crate) use factory::install_close_hook;
