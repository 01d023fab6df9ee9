mod plans;
mod subscribe;

pub use plans::*;
pub use subscribe::*;
