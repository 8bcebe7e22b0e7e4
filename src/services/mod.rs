// Material record management
pub mod materials;

pub use materials::{MaterialInput, MaterialService};
