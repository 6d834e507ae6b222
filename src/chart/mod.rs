pub mod extractor;
pub mod schema;

pub use extractor::*;
pub use schema::*;
