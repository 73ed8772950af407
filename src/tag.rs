/*! Request tags.

Every outbound command carries a short tag chosen by the client. The
server echoes it verbatim as the first whitespace-delimited token of
the reply, which is how the [`crate::mux::Mux`] correlates a datagram
back to the call that sent it.
*/
use std::sync::atomic::{AtomicU64, Ordering};

/// A tag chosen by the client and echoed by the server.
///
/// Tags are opaque from the protocol's point of view; this crate
/// happens to generate them as ascending decimal integers, matching
/// the reference implementation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ResponseTag(String);

impl ResponseTag {
    /// Wrap an already-extracted tag string (e.g. parsed off the wire).
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the tag as text, for embedding in an outbound frame.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResponseTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates distinct tags, unique over the lifetime of one [`crate::mux::Mux`].
///
/// Tags are ascending non-negative decimal integers starting from 0,
/// which keeps them short enough to never threaten a UDP datagram's
/// size budget.
#[derive(Debug, Default)]
pub struct TagGenerator {
    next: AtomicU64,
}

impl TagGenerator {
    /// Create a new generator starting at 0.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Allocate the next tag.
    pub fn next_tag(&self) -> ResponseTag {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ResponseTag(n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascending_and_distinct() {
        let g = TagGenerator::new();
        let tags: Vec<_> = (0..5).map(|_| g.next_tag()).collect();
        assert_eq!(
            tags,
            vec!["0", "1", "2", "3", "4"]
                .into_iter()
                .map(ResponseTag::new)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn shared_across_threads_stays_distinct() {
        let g = std::sync::Arc::new(TagGenerator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let g = g.clone();
            handles.push(std::thread::spawn(move || {
                (0..50).map(|_| g.next_tag()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<ResponseTag> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 8 * 50);
    }
}
