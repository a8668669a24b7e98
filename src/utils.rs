/// Usernames come from the SSO token and feed the users table, which
/// caps them at 32 characters.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= 32
        && username.chars().any(|x| x.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::is_valid_username;

    #[test]
    fn accepts_ordinary_usernames() {
        assert!(is_valid_username("poster"));
        assert!(is_valid_username("jdoe2"));
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"a".repeat(33)));
    }

    #[test]
    fn rejects_non_alphanumeric_only() {
        assert!(!is_valid_username("___"));
    }
}
