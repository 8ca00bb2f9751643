//! Persistence layer modules.

pub mod state;

pub use state::StatePersister;
