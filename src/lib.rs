pub mod catalog;
pub mod enrich;
mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod urls;

pub use error::{EnrichError, Result};
