//! This module provides reusable test utilities:
//! - An in-memory ZFS implementing the storage trait
//! - Test configuration builders
//! - Common test data

// Allow unused code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod mock_storage;

// Re-export commonly used items
pub use mock_storage::{FakeDataset, FakeSnapshot, MockZfs};
pub use test_config::{config_with_roots, TestConfigBuilder};
pub use test_data::*;
