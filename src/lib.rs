pub mod error;
pub mod io;
pub mod math;
pub mod mesh;
pub mod model;

pub use error::{BrepError, Result};
pub use io::{FormatRegistry, SaveParams};
pub use model::{ComponentId, ComponentType, ComponentVertex, Model, ModelBuilder};
