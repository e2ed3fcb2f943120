//! CLI integration tests. Step and generator commands are POSIX shell.
#![cfg(unix)]

mod common;

mod build_tests;
mod license_tests;
mod listing_tests;
