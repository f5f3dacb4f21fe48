// Machine clients authenticated with an organization API key in `x-api-key`.

pub mod me;

pub use me::me;

pub const API_KEY_HEADER: &str = "x-api-key";
