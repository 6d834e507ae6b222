pub mod context;
pub mod fetcher;
pub mod model;


pub use context::*;
pub use fetcher::*;
pub use model::*;
