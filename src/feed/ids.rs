use sha2::{Digest, Sha256};

/// Namespace prefix for feed identifiers.
pub const FEED_ID_PREFIX: &str = "feed_";
/// Namespace prefix for derived episode identifiers.
pub const EPISODE_ID_PREFIX: &str = "ep_";

/// Derives the stable identifier of a feed from its source URL.
///
/// The same URL always yields the same id, across runs and processes.
///
/// # Examples
///
/// ```
/// use podshelf::feed::derive_feed_id;
///
/// let a = derive_feed_id("https://example.com/rss");
/// assert_eq!(a, derive_feed_id("https://example.com/rss"));
/// assert!(a.starts_with("feed_"));
/// ```
pub fn derive_feed_id(url: &str) -> String {
    let hash = Sha256::digest(url.as_bytes());
    format!("{}{:x}", FEED_ID_PREFIX, hash)
}

/// Derives an episode identifier for entries that carry no usable native id.
///
/// Inputs are joined with `|` before hashing. Empty title or date is fine.
pub fn derive_episode_id(feed_url: &str, title: &str, pub_date: &str) -> String {
    let input = format!("{}|{}|{}", feed_url, title, pub_date);
    let hash = Sha256::digest(input.as_bytes());
    format!("{}{:x}", EPISODE_ID_PREFIX, hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_feed_id_is_prefixed_hex() {
        let id = derive_feed_id("https://example.com/feed.xml");
        let hex = id.strip_prefix(FEED_ID_PREFIX).unwrap();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_episode_id_tolerates_empty_fields() {
        let id = derive_episode_id("https://example.com/feed.xml", "", "");
        assert!(id.starts_with(EPISODE_ID_PREFIX));
        assert_eq!(id, derive_episode_id("https://example.com/feed.xml", "", ""));
    }

    #[test]
    fn test_episode_id_depends_on_every_field() {
        let base = derive_episode_id("u", "t", "d");
        assert_ne!(base, derive_episode_id("u2", "t", "d"));
        assert_ne!(base, derive_episode_id("u", "t2", "d"));
        assert_ne!(base, derive_episode_id("u", "t", "d2"));
    }

    #[test]
    fn test_namespaces_do_not_overlap() {
        assert_ne!(derive_feed_id("x"), derive_episode_id("x", "", ""));
    }

    proptest! {
        #[test]
        fn feed_id_is_deterministic(url in ".*") {
            prop_assert_eq!(derive_feed_id(&url), derive_feed_id(&url));
        }

        #[test]
        fn distinct_urls_get_distinct_feed_ids(a in "[a-z:/.]{1,40}", b in "[a-z:/.]{1,40}") {
            prop_assume!(a != b);
            prop_assert_ne!(derive_feed_id(&a), derive_feed_id(&b));
        }
    }
}
