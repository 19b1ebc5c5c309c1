pub mod cancel;
pub mod coordinator;
pub mod fetch;
pub mod links;
pub mod task;

pub use cancel::CancellationToken;
pub use coordinator::Coordinator;
pub use fetch::{FetchedPage, Fetcher, HttpFetcher};
