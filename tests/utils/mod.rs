pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use mocks::{FailingSessionStore, ReadOnlySessionStore};
#[allow(unused_imports)]
pub use setup::{TestApp, TestAppBuilder, TestResponse};
