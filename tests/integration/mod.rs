//! Integration test suite for lace
//!
//! End-to-end tests that exercise the complete resolution pipeline the way
//! the `resolve` command wires it together, plus black-box tests of the
//! `lace` binary itself. These tests run quickly and are executed in CI on
//! every commit.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! Tests are organized by functionality area:
//! - **pipeline**: Injection → validation → substitution → port-entry
//!   generation through the library API, with deterministic port probes
//! - **cli**: The `lace` binary (`resolve`, `state`) run against temporary
//!   workspaces with an isolated `LACE_CONFIG_DIR`

mod cli;
mod pipeline;
