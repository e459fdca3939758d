//! Async variant of the adapter, based on [embedded_io_async]
pub mod transaction;
pub mod wifi;
