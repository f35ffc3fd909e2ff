pub mod runtime;
pub mod setup;

pub use runtime::Runtime;
