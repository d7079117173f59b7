//! Shared utilities for the integration tests.

#![allow(dead_code)]

pub mod data_gen;
