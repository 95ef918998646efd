pub mod error;
pub mod results;
pub mod traits;
pub mod types;

pub use error::*;
pub use results::*;
pub use traits::*;
pub use types::*;
