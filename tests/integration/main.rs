//! Integration tests for the catalog crawler

mod common;
mod crawl_tests;
mod engine_tests;
