//! CLI command implementations

pub(crate) mod migrate;
pub(crate) mod new;
pub(crate) mod status;
