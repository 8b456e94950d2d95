//! Shared helpers for chunking integration tests.

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use quire_core::OwnerId;

pub fn owner() -> OwnerId {
    OwnerId::new("tester").unwrap()
}
