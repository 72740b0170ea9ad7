// Core modules: error model, handle tables and the fault boundary.
pub mod error;
pub mod fault;
pub mod handle;
