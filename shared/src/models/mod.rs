//! Domain models for the warehouse back office

mod audit;
mod category;
mod item;
mod movement;
mod notification;
mod request;
mod user;

pub use audit::*;
pub use category::*;
pub use item::*;
pub use movement::*;
pub use notification::*;
pub use request::*;
pub use user::*;
