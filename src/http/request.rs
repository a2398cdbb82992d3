use std::time::Duration;

/// An HTTP/1.1 request waiting to be serialized onto the wire.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: String,
    pub host: String,
    pub port: u16,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub connection_close: bool,
}

impl HttpRequest {
    pub fn get(host: impl Into<String>, port: u16, target: impl Into<String>) -> HttpRequest {
        HttpRequest {
            method: "GET".to_owned(),
            host: host.into(),
            port,
            target: target.into(),
            headers: Vec::new(),
            timeout: Duration::from_secs(3),
            connection_close: true,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> HttpRequest {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> HttpRequest {
        self.timeout = timeout;
        self
    }

    /// Renders the request head. The Host header carries the port only
    /// when it is not the protocol default.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = String::new();

        out.push_str(&self.method);
        out.push(' ');
        out.push_str(&self.target);
        out.push_str(" HTTP/1.1\r\n");

        if self.port == 80 {
            out.push_str(&format!("Host: {}\r\n", self.host));
        } else {
            out.push_str(&format!("Host: {}:{}\r\n", self.host, self.port));
        }

        out.push_str(concat!("User-Agent: netprobe/", env!("CARGO_PKG_VERSION"), "\r\n"));

        if self.connection_close {
            out.push_str("Connection: close\r\n");
        }

        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }

        out.push_str("\r\n");
        out.into_bytes()
    }
}
