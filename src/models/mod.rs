pub mod enums;
pub mod item;

pub use enums::*;
pub use item::*;
