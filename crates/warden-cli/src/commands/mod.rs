//! Subcommand implementations.

pub(crate) mod classify;
pub(crate) mod hook;
pub(crate) mod intent;
pub(crate) mod trace;
