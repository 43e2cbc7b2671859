//! Tests for production assertions promoted from `debug_assert!()`
//!
//! This module contains tests that verify production assertions fire correctly
//! when invariants are violated. Tests verify that all 25 promoted crypto assertions
//! properly reject invalid inputs in production builds.
