pub mod batch;
pub mod enums;
pub mod image;

pub use batch::*;
pub use enums::*;
pub use image::*;
