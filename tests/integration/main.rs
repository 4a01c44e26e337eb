//! Integration test driver for `tests/integration/`.
//!
//! Each `mod` below exercises the wired composter core against mock
//! pins, scripted sensors and a fake cloud.  Everything runs on the
//! host with no hardware attached.

mod classifier_tests;
mod cloud_sync_tests;
mod interlock_tests;
mod mock_hw;
