//! Cross-module tests for the answer pipeline and the optimization harness.

pub(crate) mod support;
