mod command;
mod entity;
mod link;
mod phase;
mod session;

pub use command::*;
pub use entity::*;
pub use link::*;
pub use phase::*;
pub use session::*;
