//! Minimal URL splitting: scheme, host, port, path+query.

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Url {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Url {
    pub fn parse(input: &str) -> Result<Url> {
        let mut rest = input;

        let scheme = match rest.find("://") {
            Some(pos) => {
                let scheme = rest[..pos].to_ascii_lowercase();
                rest = &rest[pos + 3..];
                scheme
            }
            None => "http".to_owned(),
        };

        let (authority, mut path) = match rest.find('/') {
            Some(slash) => (&rest[..slash], &rest[slash..]),
            None => (rest, "/"),
        };

        if let Some(hash) = path.find('#') {
            path = &path[..hash];
        }

        let default_port = if scheme == "https" { 443 } else { 80 };
        let (host, port) = match authority.rfind(':') {
            Some(colon) => {
                let port = authority[colon + 1..].parse::<u16>().map_err(|_| {
                    Error::config()
                        .invalid_argument()
                        .message("invalid port in URL")
                        .context(input.to_owned())
                        .build()
                })?;
                (authority[..colon].to_owned(), port)
            }
            None => (authority.to_owned(), default_port),
        };

        if host.is_empty() {
            return Err(Error::config()
                .invalid_argument()
                .message("URL has no host")
                .context(input.to_owned())
                .build());
        }

        Ok(Url {
            scheme,
            host,
            port,
            path: if path.is_empty() { "/".to_owned() } else { path.to_owned() },
        })
    }
}
