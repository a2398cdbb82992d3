//! Host name resolution.
//!
//! The [`Resolver`] trait is the contract the probe core relies on; the
//! default [`SystemResolver`] wraps `getaddrinfo` and normalises its result
//! codes into the DNS error categories.

use std::ffi::CString;
use std::mem;
use std::ptr;

use libc::{addrinfo, AF_INET, AF_INET6, AF_UNSPEC, AI_ADDRCONFIG, SOCK_STREAM};
use tracing::debug;

use crate::error::{category_from_gai, Error, Result};
use crate::net::endpoint::{AddressFamily, Endpoint};

pub trait Resolver {
    /// Resolves `host` into a non-empty, preference-ordered endpoint list
    /// carrying `port`.
    fn resolve(&self, host: &str, port: u16, family: AddressFamily) -> Result<Vec<Endpoint>>;
}

/// `getaddrinfo`-backed resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16, family: AddressFamily) -> Result<Vec<Endpoint>> {
        let c_host = CString::new(host).map_err(|_| {
            Error::dns()
                .invalid_argument()
                .message("host name contains an interior NUL")
                .context(host.to_owned())
                .build()
        })?;

        let mut hints: addrinfo = unsafe { mem::zeroed() };
        hints.ai_socktype = SOCK_STREAM;
        hints.ai_flags = AI_ADDRCONFIG;
        hints.ai_family = match family {
            AddressFamily::V4 => AF_INET,
            AddressFamily::V6 => AF_INET6,
            AddressFamily::Any => AF_UNSPEC,
        };

        let mut res: *mut addrinfo = ptr::null_mut();
        let err = unsafe { libc::getaddrinfo(c_host.as_ptr(), ptr::null(), &hints, &mut res) };

        if err != 0 {
            let message = unsafe {
                std::ffi::CStr::from_ptr(libc::gai_strerror(err))
                    .to_string_lossy()
                    .into_owned()
            };
            return Err(Error::dns()
                .code(err)
                .category(category_from_gai(err))
                .message(message)
                .context(host.to_owned())
                .build());
        }

        let mut out = Vec::new();
        let mut cur = res;
        while !cur.is_null() {
            let info = unsafe { &*cur };
            match info.ai_family {
                AF_INET => {
                    let sa = unsafe { &*(info.ai_addr as *const libc::sockaddr_in) };
                    out.push(Endpoint::from_ipv4_be(sa.sin_addr.s_addr, port));
                }
                AF_INET6 => {
                    let sa = unsafe { &*(info.ai_addr as *const libc::sockaddr_in6) };
                    out.push(Endpoint::from_ipv6(sa.sin6_addr.s6_addr, port));
                }
                _ => {}
            }
            cur = info.ai_next;
        }

        unsafe { libc::freeaddrinfo(res) };

        if out.is_empty() {
            return Err(Error::dns()
                .target_not_found()
                .message("DNS query returned no addresses")
                .context(host.to_owned())
                .build());
        }

        debug!(host, count = out.len(), "resolved");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_loopback_literal() {
        let endpoints = SystemResolver
            .resolve("127.0.0.1", 80, AddressFamily::V4)
            .unwrap();

        assert!(!endpoints.is_empty());
        assert_eq!(endpoints[0], Endpoint::loopback_ipv4(80));
    }

    #[test]
    fn nul_in_host_rejected() {
        let err = SystemResolver
            .resolve("bad\0host", 80, AddressFamily::Any)
            .unwrap_err();

        assert_eq!(err.category(), crate::ErrorCategory::InvalidArgument);
    }
}
