//! Infrastructure layer: configuration, logging, HTTP, page loading, HTML
//! extraction and output sinks.

pub mod config;
pub mod http_client;
pub mod logging;
pub mod page_loader;
pub mod parsing;
pub mod retry;
pub mod sink;

pub use config::{ConfigError, HarvesterConfig};
pub use http_client::{
    HttpFetcher, ReqwestTransport, ReqwestTransportFactory, Transport, TransportError, TransportFactory,
};
pub use logging::LoggingHandle;
pub use page_loader::{PageCheck, PageLoader, PageOutcome, Verdict};
pub use retry::BackoffPolicy;
pub use sink::{JsonSnapshot, RecordSink, SinkError, TsvFileSink};
