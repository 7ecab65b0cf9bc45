//! Stateless socket factory used by the curl handler's open/close callbacks.

use super::set::SocketSet;

/// Produces sockets registered in a caller-supplied `SocketSet`. Holds no
/// state of its own; use the shared `INSTANCE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptibleSocketFactory;

impl InterruptibleSocketFactory {
    pub const INSTANCE: InterruptibleSocketFactory = InterruptibleSocketFactory;
}

#[cfg(unix)]
mod unix {
    use super::{InterruptibleSocketFactory, SocketSet};
    use std::os::raw::{c_int, c_void};
    use std::os::unix::io::RawFd;

    impl InterruptibleSocketFactory {
        /// Open a socket for libcurl. Returns `None` (connect fails) if the set
        /// was interrupted or the OS refused the socket.
        pub fn open(
            &self,
            set: &SocketSet,
            family: c_int,
            socktype: c_int,
            protocol: c_int,
        ) -> Option<RawFd> {
            let mut state = set.lock();
            if state.interrupted {
                tracing::debug!("socket open refused: connection interrupted");
                return None;
            }
            // SAFETY: plain libc calls on a descriptor we own until registered.
            let fd = unsafe { libc::socket(family, socktype, protocol) };
            if fd < 0 {
                tracing::warn!(
                    "socket() failed: {}",
                    std::io::Error::last_os_error()
                );
                return None;
            }
            unsafe {
                libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
            }
            state.live.push(fd);
            Some(fd)
        }

        /// Close a socket on libcurl's behalf and forget it.
        pub fn close(&self, set: &SocketSet, fd: RawFd) -> c_int {
            let mut state = set.lock();
            if let Some(pos) = state.live.iter().position(|s| *s == fd) {
                state.live.swap_remove(pos);
            }
            // SAFETY: libcurl hands back ownership of fd; it is no longer registered.
            unsafe { libc::close(fd) }
        }
    }

    const CURLOPT_CLOSESOCKETFUNCTION: curl_sys::CURLoption =
        curl_sys::CURLOPTTYPE_FUNCTIONPOINT + 208;
    const CURLOPT_CLOSESOCKETDATA: curl_sys::CURLoption = curl_sys::CURLOPTTYPE_OBJECTPOINT + 209;

    extern "C" fn close_socket_cb(clientp: *mut c_void, item: curl_sys::curl_socket_t) -> c_int {
        if clientp.is_null() {
            // SAFETY: no registry attached; just release the descriptor.
            return unsafe { libc::close(item) };
        }
        // SAFETY: clientp is `Arc::as_ptr` of the SocketSet owned by the handler,
        // which outlives the easy handle (cleanup runs before the handler drops).
        let set = unsafe { &*(clientp as *const SocketSet) };
        InterruptibleSocketFactory::INSTANCE.close(set, item)
    }

    /// Route libcurl's socket close for `raw` through `set`. Must be called
    /// after every `reset()` of the handle, before the next perform.
    pub(crate) fn install_close_hook(
        raw: *mut curl_sys::CURL,
        set: &SocketSet,
    ) -> Result<(), curl::Error> {
        let cb: extern "C" fn(*mut c_void, curl_sys::curl_socket_t) -> c_int = close_socket_cb;
        // SAFETY: raw is a live easy handle; option types match libcurl's contract.
        unsafe {
            let rc = curl_sys::curl_easy_setopt(raw, CURLOPT_CLOSESOCKETFUNCTION, cb);
            if rc != curl_sys::CURLE_OK {
                return Err(curl::Error::new(rc));
            }
            let rc = curl_sys::curl_easy_setopt(
                raw,
                CURLOPT_CLOSESOCKETDATA,
                set as *const SocketSet as *mut c_void,
            );
            if rc != curl_sys::CURLE_OK {
                return Err(curl::Error::new(rc));
            }
        }
        Ok(())
    }

}

#[cfg(unix)]
pub(crate) use unix::install_close_hook;
