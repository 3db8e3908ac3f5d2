//! Control plane (§4.I, §10.5): the stats/delay/tag knobs and the optional
//! HTTP surface that reads and mutates them.

pub mod http;
pub mod options;
pub mod stats;

pub use options::Delay;
pub use stats::{ConnectionStats, ConnectionsMap};

/// Minimal shell-style glob: `*` matches any run of characters, everything
/// else must match literally. Good enough for the `match` path segment
/// (§6), which only ever needs to select tags/connections by prefix/suffix.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[u8], text: &[u8]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some(b'*') => {
                inner(&pattern[1..], text)
                    || (!text.is_empty() && inner(pattern, &text[1..]))
            }
            Some(&c) => text.first() == Some(&c) && inner(&pattern[1..], &text[1..]),
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::glob_match;

    #[test]
    fn literal_match() {
        assert!(glob_match("SCADA", "SCADA"));
        assert!(!glob_match("SCADA", "SCADB"));
    }

    #[test]
    fn star_matches_any_run() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("SC*", "SCADA"));
        assert!(glob_match("*ADA", "SCADA"));
        assert!(!glob_match("SC*X", "SCADA"));
    }
}
