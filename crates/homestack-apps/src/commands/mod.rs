//! Lifecycle commands - one guarded state transition per module
//!
//! Shared failure contract: validation errors are raised before any row
//! mutation; once a transitional status is persisted, every path resolves
//! the row to a defined terminal state before re-raising the error.

pub(crate) mod backup;
pub(crate) mod install;
pub(crate) mod restart;
pub(crate) mod restore;
pub(crate) mod start;
pub(crate) mod start_all;
pub(crate) mod stop;
pub(crate) mod uninstall;
pub(crate) mod update;
pub(crate) mod update_config;
pub(crate) mod validate;
