//! Shared test utilities for labelsort integration tests.
//!
//! The in-memory mail service and model come from `labelsort::test_utils`;
//! this module adds builders for setting up scenarios.

pub mod builders;

pub use builders::*;
pub use labelsort::test_utils::{engine_config, engine_config_from, FakeMailbox, ModifyCall, ScriptedModel};
