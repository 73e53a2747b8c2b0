//! Shared test fixtures (used by unit, functional, integration, and proptest).

#![allow(dead_code)]

pub mod fixtures;
