pub mod cycle;
mod error;
mod field;
mod identifier;
mod orchestrator;
mod pattern;
mod record;
mod render;
mod repository;
mod store;
mod time;
mod value;

pub use crate::cycle::Cycle;
pub use crate::error::*;
pub use crate::field::*;
pub use crate::identifier::*;
pub use crate::orchestrator::*;
pub use crate::pattern::*;
pub use crate::record::*;
pub use crate::render::*;
pub use crate::repository::*;
pub use crate::store::*;
pub use crate::time::*;
pub use crate::value::*;
