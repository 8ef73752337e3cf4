//! Core reservation
//!
//! This module is responsible for:
//! - Representing sets of cores (`CoreSet`)
//! - Tracking which claimant holds which cores (`AllocationRegistry`)
//! - Granting, releasing and applying reservations (`CoreManager`)

pub mod core_set;
pub mod manager;
pub mod registry;

pub use core_set::{CoreSet, CoreSetParseError};
pub use manager::CoreManager;
pub use registry::{AllocationRegistry, Claim};
