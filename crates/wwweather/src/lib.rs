mod config;
mod db;
mod error;
mod interchange;
mod model;
mod search;
pub mod units;
mod utils;

pub use config::*;
pub use db::*;
pub use error::*;
pub use interchange::*;
pub use model::*;
pub use search::*;
pub use utils::*;
