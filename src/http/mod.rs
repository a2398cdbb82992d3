pub mod client;
pub mod request;
pub mod response;
pub mod scenario;
pub mod url;

pub use client::HttpClient;
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use scenario::HttpGetScenario;
pub use url::Url;
