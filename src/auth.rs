//! MD5 password authentication (`AuthenticationMD5Password`).
//!
//! `"md5" || md5_hex(md5_hex(password || user) || salt)`, per
//! <https://www.postgresql.org/docs/current/auth-password.html>.
use std::fmt::Write;

pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let inner = md5::compute(format!("{password}{user}").as_bytes());

    let mut outer_input = format!("{inner:x}").into_bytes();
    outer_input.extend_from_slice(&salt);
    let outer = md5::compute(&outer_input);

    let mut result = String::with_capacity(35);
    result.push_str("md5");
    write!(&mut result, "{outer:x}").unwrap();
    result
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn produces_md5_prefixed_32_hex_digest() {
        let out = md5_password("postgres", "secret", [0x01, 0x02, 0x03, 0x04]);
        assert!(out.starts_with("md5"));
        assert_eq!(out.len(), 3 + 32);
        assert!(out[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn is_sensitive_to_salt() {
        let a = md5_password("postgres", "secret", [0, 0, 0, 0]);
        let b = md5_password("postgres", "secret", [1, 1, 1, 1]);
        assert_ne!(a, b);
    }
}
