//! Cache store implementations

pub mod policy;

pub use policy::PolicyCache;
