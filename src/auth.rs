//! Authentication heuristics.

/// Substrings that mark a middleware expression as an authentication guard.
pub const AUTH_KEYWORDS: &[&str] = &[
    "auth",
    "jwt",
    "passport",
    "protect",
    "token",
    "bearer",
    "login_required",
];

/// `true` when any middleware expression contains an auth keyword, ignoring case.
///
/// `authenticate`, `requireAuth` and `isAuthorized` all match through `auth`.
pub fn requires_auth(middleware: &[String]) -> bool {
    middleware.iter().any(|expr| is_auth_middleware(expr))
}

pub fn is_auth_middleware(expr: &str) -> bool {
    let lowered = expr.to_lowercase();
    AUTH_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}
