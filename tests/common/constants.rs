//! Shared constants for the e2e test suite

/// Login of the pre-registered test user.
pub const TEST_USER: &str = "testuser";
pub const TEST_PASS: &str = "testpass123";

/// A second pre-registered user, for multi-user scenarios.
pub const OTHER_USER: &str = "otheruser";
pub const OTHER_PASS: &str = "otherpass456";

pub const REQUEST_TIMEOUT_SECS: u64 = 5;
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
