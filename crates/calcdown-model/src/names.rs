/// Property names that are never readable or writable from a document.
pub const BANNED_KEYS: [&str; 3] = ["__proto__", "prototype", "constructor"];

/// Identifier bound to the standard library namespace; not available as a user name.
pub const STD_NAME: &str = "std";

#[must_use]
pub fn is_banned_key(key: &str) -> bool {
    BANNED_KEYS.contains(&key)
}

/// Returns `true` for `[A-Za-z_][A-Za-z0-9_]*`.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("a"));
        assert!(is_identifier("_tmp1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier("café"));
    }

    #[test]
    fn banned() {
        assert!(is_banned_key("__proto__"));
        assert!(is_banned_key("constructor"));
        assert!(!is_banned_key("proto"));
    }
}
