pub mod endpoint;
pub mod resolver;
pub mod tcp;

pub use endpoint::{AddressFamily, Endpoint};
pub use resolver::{Resolver, SystemResolver};
pub use tcp::TcpSocket;
