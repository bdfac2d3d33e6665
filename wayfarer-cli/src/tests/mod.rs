//! Unit tests for the Wayfarer CLI.

use super::*;

mod execution;
mod parsing;
