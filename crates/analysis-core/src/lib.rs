pub mod error;
pub mod scoring;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use scoring::*;
pub use traits::*;
pub use types::*;
