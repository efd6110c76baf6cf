//! Object key generation.
//!
//! Keys have the shape `prefix/YYYY/MM/token.ext` so lifecycle rules can be
//! scoped by year and month. The token is 16 lowercase hex characters drawn
//! from a CSPRNG, which makes overwriting an existing object practically
//! impossible without a lookup.

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Number of random bytes behind each token (two hex chars per byte).
pub const TOKEN_BYTES: usize = 8;

/// Generate an object key for `filename` under `prefix`, dated now (UTC).
#[must_use]
pub fn generate_key(prefix: &str, filename: &str) -> String {
    generate_key_at(prefix, filename, Utc::now())
}

/// Generate an object key dated at `now`.
///
/// Leading and trailing slashes are stripped from `prefix`; an empty prefix
/// yields a key starting with `/`. The extension is taken from `filename`,
/// lowercased, and omitted when absent.
#[must_use]
pub fn generate_key_at(prefix: &str, filename: &str, now: DateTime<Utc>) -> String {
    let prefix = prefix.trim_matches('/');
    let token = random_token();
    let date = now.format("%Y/%m");

    match extension_of(filename) {
        Some(ext) => format!("{prefix}/{date}/{token}.{ext}"),
        None => format!("{prefix}/{date}/{token}"),
    }
}

/// Lowercased extension of `filename`, if any.
#[must_use]
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
}

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0)
            .single()
            .expect("valid date")
    }

    fn split(key: &str) -> Vec<&str> {
        key.split('/').collect()
    }

    #[test]
    fn test_key_format() {
        let key = generate_key_at("uploads", "photo.JPG", fixed_now());
        let parts = split(&key);

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "uploads");
        assert_eq!(parts[1], "2025");
        assert_eq!(parts[2], "03");

        let (token, ext) = parts[3].split_once('.').expect("has extension");
        assert_eq!(ext, "jpg");
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_prefix_slashes_are_stripped() {
        let key = generate_key_at("/media/avatars/", "a.png", fixed_now());
        assert!(key.starts_with("media/avatars/2025/03/"));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_missing_extension_is_omitted() {
        let key = generate_key_at("uploads", "README", fixed_now());
        let token = split(&key)[3];
        assert_eq!(token.len(), 16);
        assert!(!token.contains('.'));
    }

    #[test]
    fn test_empty_prefix() {
        let key = generate_key_at("", "a.webp", fixed_now());
        assert!(key.starts_with("/2025/03/"));
    }

    #[test]
    fn test_tokens_differ() {
        let a = generate_key("uploads", "a.png");
        let b = generate_key("uploads", "a.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("file.WebP").as_deref(), Some("webp"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of(""), None);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    // Every key is prefix/YYYY/MM/<16 lowercase hex>.<ext>
    proptest! {
        #[test]
        fn prop_key_shape(
            prefix in "[a-z0-9_-]{1,12}(/[a-z0-9_-]{1,12}){0,2}",
            stem in "[a-zA-Z0-9_-]{1,20}",
            ext in "[a-zA-Z]{1,5}",
        ) {
            let now = Utc::now();
            let key = generate_key_at(&format!("/{prefix}/"), &format!("{stem}.{ext}"), now);

            let expected_head = format!("{prefix}/{}/", now.format("%Y/%m"));
            prop_assert!(key.starts_with(&expected_head));

            let tail = &key[expected_head.len()..];
            let (token, key_ext) = tail.split_once('.').expect("extension present");
            prop_assert_eq!(token.len(), 16);
            prop_assert!(token.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
            prop_assert_eq!(key_ext, ext.to_ascii_lowercase());
        }
    }
}
