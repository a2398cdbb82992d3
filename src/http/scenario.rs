use crate::core::orchestrator::Orchestrator;
use crate::core::scenario::Scenario;
use crate::error::{Error, ErrorCategory, Result};
use crate::http::client::HttpClient;
use crate::http::request::HttpRequest;
use crate::http::url::Url;

/// One HTTP GET against a user-supplied URL, run as an engine scenario.
///
/// All events emitted by the run share one freshly allocated session id.
pub struct HttpGetScenario {
    url: Url,
}

impl HttpGetScenario {
    pub fn new(url: &str) -> Result<HttpGetScenario> {
        Ok(HttpGetScenario {
            url: Url::parse(url)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Scenario for HttpGetScenario {
    fn run(&mut self, orch: &Orchestrator) -> Result<()> {
        let session = orch.new_session();
        let mut client = HttpClient::new(orch, session);
        let request = HttpRequest::get(self.url.host.clone(), self.url.port, self.url.path.clone());

        match client.get(&request) {
            Ok(_) => Ok(()),
            // A close racing the final read is a normal end of exchange.
            Err(err) if err.category() == ErrorCategory::PeerClosed => Ok(()),
            Err(err) => Err(Error::protocol()
                .message("HTTP GET failed")
                .context("HttpGetScenario")
                .wrap(err)
                .build()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_parses_its_url() {
        let scenario = HttpGetScenario::new("http://example.com:8080/x").unwrap();

        assert_eq!(scenario.url().host, "example.com");
        assert_eq!(scenario.url().port, 8080);
    }

    #[test]
    fn bad_url_rejected_up_front() {
        assert!(HttpGetScenario::new("http://:80/").is_err());
    }
}
