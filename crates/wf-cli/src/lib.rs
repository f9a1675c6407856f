// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library surface for the workflow engine CLI, split out so integration
//! tests can exercise `commands` and `format` directly alongside the
//! black-box `assert_cmd` tests that drive the `wf` binary.

pub mod commands;
pub mod format;
