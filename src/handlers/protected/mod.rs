// Routes behind jwt_auth_middleware. Handlers read the caller from the AuthUser extension.

pub mod actions;
