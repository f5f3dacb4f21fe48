// Domain records shared by the stores, services and actions

pub mod api_key;
pub mod contact;
pub mod integration;
pub mod organization;
pub mod segment;
pub mod survey;
pub mod team;

pub use api_key::*;
pub use contact::*;
pub use integration::*;
pub use organization::*;
pub use segment::*;
pub use survey::*;
pub use team::*;
