//! Route handlers

pub mod blink_test;
pub mod patients;
pub mod scans;
