//! Family-tagged socket address, usable directly by address-family-generic
//! socket calls.

use std::fmt;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use libc::{sockaddr, sockaddr_in, sockaddr_in6, socklen_t, AF_INET, AF_INET6};

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressFamily {
    Any,
    V4,
    V6,
}

/// An IPv4 or IPv6 address plus port, stored as a `sockaddr_storage` large
/// enough for either family. Immutable after construction.
#[derive(Copy, Clone)]
pub struct Endpoint {
    storage: libc::sockaddr_storage,
    len: socklen_t,
}

impl Endpoint {
    /// Parses a literal IP address. Fails with `InvalidArgument` when the
    /// string is valid for neither family.
    pub fn from_ip_string(ip: &str, port: u16) -> Result<Endpoint> {
        match ip.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => Ok(Endpoint::from_ipv4_be(u32::from(v4).to_be(), port)),
            Ok(IpAddr::V6(v6)) => Ok(Endpoint::from_ipv6(v6.octets(), port)),
            Err(_) => Err(Error::config()
                .invalid_argument()
                .message("invalid IP address literal")
                .context(ip.to_owned())
                .build()),
        }
    }

    /// Builds an IPv4 endpoint from an address already in network byte
    /// order.
    pub fn from_ipv4_be(addr_be: u32, port: u16) -> Endpoint {
        let mut sa: sockaddr_in = unsafe { mem::zeroed() };
        sa.sin_family = AF_INET as libc::sa_family_t;
        sa.sin_addr.s_addr = addr_be;
        sa.sin_port = port.to_be();

        unsafe { Endpoint::from_raw_parts(&sa as *const _ as *const u8, mem::size_of::<sockaddr_in>()) }
    }

    pub fn from_ipv6(octets: [u8; 16], port: u16) -> Endpoint {
        let mut sa: sockaddr_in6 = unsafe { mem::zeroed() };
        sa.sin6_family = AF_INET6 as libc::sa_family_t;
        sa.sin6_addr.s6_addr = octets;
        sa.sin6_port = port.to_be();

        unsafe { Endpoint::from_raw_parts(&sa as *const _ as *const u8, mem::size_of::<sockaddr_in6>()) }
    }

    pub fn from_std(addr: &SocketAddr) -> Endpoint {
        match addr {
            SocketAddr::V4(v4) => Endpoint::from_ipv4_be(u32::from(*v4.ip()).to_be(), v4.port()),
            SocketAddr::V6(v6) => Endpoint::from_ipv6(v6.ip().octets(), v6.port()),
        }
    }

    pub fn any_ipv4(port: u16) -> Endpoint {
        Endpoint::from_ipv4_be(u32::from(Ipv4Addr::UNSPECIFIED).to_be(), port)
    }

    pub fn loopback_ipv4(port: u16) -> Endpoint {
        Endpoint::from_ipv4_be(u32::from(Ipv4Addr::LOCALHOST).to_be(), port)
    }

    /// # Safety
    ///
    /// `ptr` must point at a valid sockaddr of `len` bytes, `len` no larger
    /// than `sockaddr_storage`.
    unsafe fn from_raw_parts(ptr: *const u8, len: usize) -> Endpoint {
        let mut storage: libc::sockaddr_storage = mem::zeroed();
        std::ptr::copy_nonoverlapping(ptr, &mut storage as *mut _ as *mut u8, len);

        Endpoint {
            storage,
            len: len as socklen_t,
        }
    }

    pub fn port(&self) -> u16 {
        match self.storage.ss_family as libc::c_int {
            AF_INET => {
                let sa = unsafe { &*(&self.storage as *const _ as *const sockaddr_in) };
                u16::from_be(sa.sin_port)
            }
            AF_INET6 => {
                let sa = unsafe { &*(&self.storage as *const _ as *const sockaddr_in6) };
                u16::from_be(sa.sin6_port)
            }
            _ => 0,
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self.storage.ss_family as libc::c_int {
            AF_INET6 => AddressFamily::V6,
            _ => AddressFamily::V4,
        }
    }

    /// Pointer and length for passing to syscalls.
    pub fn as_raw(&self) -> (*const sockaddr, socklen_t) {
        (&self.storage as *const _ as *const sockaddr, self.len)
    }

    pub fn len(&self) -> socklen_t {
        self.len
    }

    fn active_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(&self.storage as *const _ as *const u8, self.len as usize)
        }
    }

    pub fn ip(&self) -> IpAddr {
        match self.storage.ss_family as libc::c_int {
            AF_INET6 => {
                let sa = unsafe { &*(&self.storage as *const _ as *const sockaddr_in6) };
                IpAddr::V6(Ipv6Addr::from(sa.sin6_addr.s6_addr))
            }
            _ => {
                let sa = unsafe { &*(&self.storage as *const _ as *const sockaddr_in) };
                IpAddr::V4(Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr)))
            }
        }
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Endpoint) -> bool {
        self.len == other.len && self.active_bytes() == other.active_bytes()
    }
}

impl Eq for Endpoint {}

impl fmt::Display for Endpoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self.ip() {
            IpAddr::V4(ip) => write!(fmt, "{}:{}", ip, self.port()),
            IpAddr::V6(ip) => write!(fmt, "[{}]:{}", ip, self.port()),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Endpoint({})", self)
    }
}
