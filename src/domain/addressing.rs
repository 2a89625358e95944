//! Reversible mapping between host entity identifiers and resource URIs
//!
//! `light.kitchen` becomes `entity://light/kitchen`. Literal `/` and `%` in an
//! identifier are percent-escaped first so the mapping stays injective.

use thiserror::Error;

pub const RESOURCE_URI_PREFIX: &str = "entity://";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid resource uri {0}")]
    InvalidUri(String),
}

pub fn encode(host_id: &str) -> String {
    let mut uri = String::with_capacity(RESOURCE_URI_PREFIX.len() + host_id.len());
    uri.push_str(RESOURCE_URI_PREFIX);
    for ch in host_id.chars() {
        match ch {
            '%' => uri.push_str("%25"),
            '/' => uri.push_str("%2F"),
            '.' => uri.push('/'),
            other => uri.push(other),
        }
    }
    uri
}

pub fn decode(uri: &str) -> Result<String, AddressError> {
    let invalid = || AddressError::InvalidUri(uri.to_string());
    let path = uri.strip_prefix(RESOURCE_URI_PREFIX).ok_or_else(invalid)?;
    if path.is_empty() {
        return Err(invalid());
    }

    let mut host_id = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '/' => host_id.push('.'),
            '%' => {
                let escape: String = chars.by_ref().take(2).collect();
                match escape.as_str() {
                    "25" => host_id.push('%'),
                    "2F" => host_id.push('/'),
                    _ => return Err(invalid()),
                }
            }
            other => host_id.push(other),
        }
    }
    Ok(host_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_dotted_ids_as_paths() {
        assert_eq!(encode("light.kitchen"), "entity://light/kitchen");
        assert_eq!(
            decode("entity://light/kitchen").expect("valid uri"),
            "light.kitchen"
        );
    }

    #[test]
    fn slashes_and_dots_do_not_collide() {
        assert_ne!(encode("a.b"), encode("a/b"));
        assert_eq!(decode(&encode("a/b")).expect("valid uri"), "a/b");
        assert_eq!(decode(&encode("50%.x")).expect("valid uri"), "50%.x");
    }

    #[test]
    fn rejects_foreign_prefix_and_empty_path() {
        assert_eq!(
            decode("resource://light/kitchen"),
            Err(AddressError::InvalidUri("resource://light/kitchen".to_string()))
        );
        assert!(decode("entity://").is_err());
        assert!(decode("entity://light/%zz").is_err());
        assert!(decode("entity://light/%2").is_err());
    }

    proptest! {
        #[test]
        fn decode_reverses_encode(host_id in "\\PC{1,40}") {
            prop_assert_eq!(decode(&encode(&host_id)).expect("encoded uri decodes"), host_id);
        }

        #[test]
        fn distinct_ids_get_distinct_uris(left in "[a-z./%_]{1,12}", right in "[a-z./%_]{1,12}") {
            prop_assume!(left != right);
            prop_assert_ne!(encode(&left), encode(&right));
        }

        #[test]
        fn unprefixed_strings_are_rejected(value in "\\PC{0,40}") {
            prop_assume!(!value.starts_with(RESOURCE_URI_PREFIX));
            prop_assert!(matches!(decode(&value), Err(AddressError::InvalidUri(_))));
        }
    }
}
