pub mod classify;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod frontier;
pub mod normalize;
pub mod result;
pub mod transport;

pub use classify::{Classifier, Verdict};
pub use config::CrawlConfig;
pub use crawler::{CrawlObserver, CrawlSummary, Crawler, ProgressCallback};
pub use error::ScanError;
pub use normalize::normalize;
pub use result::{CrawlRecord, FormDescriptor, FrontierEntry, Method, RequestKey, Status};
pub use transport::{FetchRequest, FetchResponse, HttpTransport, Transport};
