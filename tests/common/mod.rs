//! Common test utilities shared across integration tests.

pub mod test_data;
