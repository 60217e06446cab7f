/// Router Module Index
///
/// Routing split by access level. Each module's handlers declare the capability they need
/// through their extractors (`AuthUser`, `AdminUser`), so a route cannot be mounted in the
/// wrong module and silently lose its check.

/// Routes open to anonymous clients.
pub mod public;

/// Routes requiring a valid bearer token.
pub mod authenticated;

/// Routes requiring an admin user.
pub mod admin;
