use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use libc::{EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT, EPOLLPRI, EPOLLRDHUP};

use crate::ready::Ready;

pub struct Epoll {
    epfd: RawFd,
}

impl Epoll {
    pub fn new() -> io::Result<Epoll> {
        let epfd = syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?;

        Ok(Epoll { epfd })
    }

    pub fn add(&self, fd: RawFd, interest: Ready) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: ready_to_epoll(interest),
            u64: fd as u64,
        };

        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut info))?;

        Ok(())
    }

    pub fn modify(&self, fd: RawFd, interest: Ready) -> io::Result<()> {
        let mut info = libc::epoll_event {
            events: ready_to_epoll(interest),
            u64: fd as u64,
        };

        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, fd, &mut info))?;

        Ok(())
    }

    pub fn delete(&self, fd: RawFd) -> io::Result<()> {
        let mut info = libc::epoll_event { events: 0, u64: 0 };

        syscall!(epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, &mut info))?;

        Ok(())
    }

    /// Waits for readiness, retrying transparently on `EINTR`. A negative
    /// `timeout_ms` blocks indefinitely, zero returns immediately.
    pub fn wait(&self, events: &mut Vec<libc::epoll_event>, timeout_ms: i32) -> io::Result<usize> {
        events.clear();

        let cnt = loop {
            match syscall!(epoll_wait(
                self.epfd,
                events.as_mut_ptr(),
                events.capacity() as i32,
                timeout_ms
            )) {
                Ok(cnt) => break cnt,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        unsafe { events.set_len(cnt as usize) };

        Ok(cnt as usize)
    }
}

fn ready_to_epoll(interest: Ready) -> u32 {
    let mut kind = 0;

    if interest.is_readable() {
        kind |= EPOLLIN;
    }

    if interest.is_writable() {
        kind |= EPOLLOUT;
    }

    kind as u32
}

pub fn epoll_to_ready(epoll: libc::c_int) -> Ready {
    let mut kind = Ready::empty();

    if (epoll & EPOLLIN) != 0 || (epoll & EPOLLPRI) != 0 {
        kind = kind | Ready::readable();
    }

    if (epoll & EPOLLOUT) != 0 {
        kind = kind | Ready::writable();
    }

    if (epoll & EPOLLERR) != 0 || (epoll & EPOLLHUP) != 0 || (epoll & EPOLLRDHUP) != 0 {
        kind = kind | Ready::error();
    }

    kind
}

impl AsRawFd for Epoll {
    fn as_raw_fd(&self) -> RawFd {
        self.epfd
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::close(self.epfd);
        }
    }
}
