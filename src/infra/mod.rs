mod catalog;
mod config;
mod logging;
mod message_stream;
mod peer_name;
mod status;

pub use catalog::*;
pub use config::*;
pub use logging::*;
pub use message_stream::*;
pub use peer_name::*;
pub use status::*;
