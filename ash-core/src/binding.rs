//! Binding normalization (spec §4.2): canonical `METHOD /path` string
//! identifying the protected operation.

/// Normalize `(method, path)` into a canonical `"<METHOD> <path>"` string.
///
/// Steps, in order: uppercase method, strip query string, ensure leading
/// slash, collapse repeated slashes, strip trailing slash unless the path
/// is exactly `/`.
pub fn normalize_binding(method: &str, path: &str) -> String {
    let method = method.to_uppercase();

    let path = path.split('?').next().unwrap_or("");

    let mut normalized = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    let mut last_was_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        normalized.push(ch);
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    format!("{method} {normalized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uppercase_method() {
        assert_eq!(normalize_binding("post", "/api/update"), "POST /api/update");
    }

    #[test]
    fn remove_query_string() {
        assert_eq!(normalize_binding("GET", "/api/users?id=123"), "GET /api/users");
    }

    #[test]
    fn ensure_leading_slash() {
        assert_eq!(normalize_binding("GET", "api/users"), "GET /api/users");
    }

    #[test]
    fn collapse_duplicate_slashes() {
        assert_eq!(
            normalize_binding("GET", "/api//users///list"),
            "GET /api/users/list"
        );
    }

    #[test]
    fn remove_trailing_slash() {
        assert_eq!(normalize_binding("GET", "/api/users/"), "GET /api/users");
    }

    #[test]
    fn preserve_root_slash() {
        assert_eq!(normalize_binding("GET", "/"), "GET /");
    }

    #[test]
    fn complex_normalization() {
        assert_eq!(
            normalize_binding("post", "api//test/?foo=bar"),
            "POST /api/test"
        );
    }

    #[test]
    fn binding_idempotence() {
        let once = normalize_binding("post", "api//test/?foo=bar");
        let (method, path) = once.split_once(' ').unwrap();
        let twice = normalize_binding(method, path);
        assert_eq!(once, twice);
    }
}
