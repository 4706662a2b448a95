// Crate root library declaration and module exports.
pub mod cli;
pub mod config;
pub mod context;
pub mod history;
pub mod model;
pub mod remote;
pub mod rewrite;
pub mod storage;
pub mod sync;
