// Handlers grouped by how the caller is authenticated:
// public (none), protected (session JWT), management (organization API key).

pub mod management;
pub mod protected;
pub mod public;
