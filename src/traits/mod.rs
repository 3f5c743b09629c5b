//! Core traits for the dependency injection system.

pub mod dispose;
pub mod resolver;

pub use dispose::{Dispose, DisposeError};
pub use resolver::{Resolver, ResolverCore};
