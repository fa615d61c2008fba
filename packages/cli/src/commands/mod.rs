//! Command implementations
//!
//! One module per subcommand.

pub mod service;
