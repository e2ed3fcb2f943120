//! Library integration tests: definitions on disk through execution.

#![cfg(unix)]

mod common;
mod definitions_tests;
mod pipeline_tests;
