pub mod http;
pub mod memory;

pub use http::HttpHealthSink;
pub use memory::MemorySink;
