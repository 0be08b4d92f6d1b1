pub mod proxy;
pub mod tools;

pub use proxy::{classify, FetchError, FetchResult, HttpTransport, RawResponse, Transport, TransportError};
pub use tools::{FetchedImage, ImageError};
