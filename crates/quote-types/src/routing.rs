//! Routing discriminators for the cluster's logical channels

/// Prefix of routing keys carried by published quotes
pub const QUOTE_ROUTE_PREFIX: &str = "quotes";

/// Binding pattern of the quote channel
pub const QUOTE_BINDING: &str = "quotes.#";

/// Prefix of directed election routes
pub const ELECTION_ROUTE_PREFIX: &str = "election";

/// Routing key for a quote published for `ticker`
pub fn quote_routing_key(ticker: &str) -> String {
    format!("{}.{}", QUOTE_ROUTE_PREFIX, ticker.trim().to_lowercase())
}

/// Directed route of a node's election mailbox
pub fn election_route(node_id: &str) -> String {
    format!("{}.{}", ELECTION_ROUTE_PREFIX, node_id)
}

/// Topic-style match of a dotted routing key against a binding pattern.
///
/// `*` matches exactly one word, `#` matches zero or more words.
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|skip| matches_words(rest, &key[skip..])),
        Some((&word, rest)) => match key.split_first() {
            Some((&first, key_rest)) if word == "*" || word == first => {
                matches_words(rest, key_rest)
            }
            _ => false,
        },
    }
}
