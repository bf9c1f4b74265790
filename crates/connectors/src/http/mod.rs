pub mod classify;
pub mod pagination;
pub mod transport;

pub use classify::{GraphApiClassifier, ResponseClassifier, StatusClassifier};
pub use pagination::{JsonCursorPagination, PaginationScheme};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport};
