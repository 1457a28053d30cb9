//! tests/mod.rs
mod campaign_runner_tests;
mod support;
