use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use libc::{c_int, c_void, socklen_t, SOCK_CLOEXEC, SOCK_NONBLOCK, SOCK_STREAM};

/// Creates a stream socket for the given address family, non-blocking for
/// its whole lifetime.
pub fn stream_socket(family: c_int) -> io::Result<RawFd> {
    let fd = syscall!(socket(family, SOCK_STREAM | SOCK_NONBLOCK | SOCK_CLOEXEC, 0))?;
    Ok(fd)
}

pub fn connect(fd: RawFd, addr: *const libc::sockaddr, len: socklen_t) -> io::Result<()> {
    syscall!(connect(fd, addr, len))?;
    Ok(())
}

pub fn recv(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = syscall!(recv(fd, buf.as_mut_ptr() as *mut c_void, buf.len(), 0))?;
    Ok(n as usize)
}

pub fn send(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let n = syscall!(send(
        fd,
        buf.as_ptr() as *const c_void,
        buf.len(),
        libc::MSG_NOSIGNAL
    ))?;
    Ok(n as usize)
}

/// Reads and clears `SO_ERROR`; `None` means the socket reports no error.
pub fn take_error(fd: RawFd) -> io::Result<Option<io::Error>> {
    let mut raw: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;

    syscall!(getsockopt(
        fd,
        libc::SOL_SOCKET,
        libc::SO_ERROR,
        &mut raw as *mut _ as *mut c_void,
        &mut len
    ))?;

    if raw == 0 {
        Ok(None)
    } else {
        Ok(Some(io::Error::from_raw_os_error(raw)))
    }
}

pub fn close(fd: RawFd) {
    unsafe {
        let _ = libc::close(fd);
    }
}
