//! Integration tests for coursesync-sync
//!
//! Drives the crawler, builder, differ and engine against a scripted
//! in-process fetcher and an in-memory state store.

mod common;

mod test_course_map;
mod test_differ;
mod test_engine;
