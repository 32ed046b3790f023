pub mod enrichment;
pub mod error;
pub(crate) mod http;
pub mod lifecycle;
pub mod mirror;
pub mod queue;
pub mod speech;
pub mod storage;
