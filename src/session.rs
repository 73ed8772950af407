/*! Session key state.

A "read copy, write replace" cell guarded by a mutex: reads never block
for long, and a write fully replaces the value rather than mutating it
in place. This is a direct generalization of the original client's
small `syncVar[T]` helper. The matching cipher cell lives on
[`crate::mux::Mux`] itself (installed via `set_block`), since it's the
frame codec, not the command layer, that reads it.
*/
use std::sync::Mutex;

/// The session key, shared between the command layer's argument
/// builders (which read it) and `AUTH`/`LOGOUT` (which write it).
#[derive(Debug, Default)]
pub struct SessionState {
    key: Mutex<Option<String>>,
}

impl SessionState {
    /// Create empty (no session) state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session key, if `AUTH` has succeeded and `LOGOUT`
    /// hasn't cleared it since.
    pub fn session_key(&self) -> Option<String> {
        self.key.lock().unwrap().clone()
    }

    /// Install a new session key (called by `AUTH` on success).
    pub fn set_session_key(&self, key: String) {
        *self.key.lock().unwrap() = Some(key);
    }

    /// Clear the session key, as `LOGOUT` always does regardless of
    /// the server's response.
    pub fn clear(&self) {
        *self.key.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let s = SessionState::new();
        assert_eq!(s.session_key(), None);
    }

    #[test]
    fn set_then_read_session_key() {
        let s = SessionState::new();
        s.set_session_key("KEY123".to_string());
        assert_eq!(s.session_key(), Some("KEY123".to_string()));
    }

    #[test]
    fn clear_removes_it() {
        let s = SessionState::new();
        s.set_session_key("KEY123".to_string());
        s.clear();
        assert_eq!(s.session_key(), None);
    }
}
