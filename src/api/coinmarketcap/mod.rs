pub mod http;

pub use http::{Endpoints, Fetcher, HttpFetcher};
