pub mod health;
pub mod links;

pub use health::{health, root};
pub use links::resolve_link;
