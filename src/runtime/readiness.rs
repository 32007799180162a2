//! Readiness events for one poll round.
//!
//! Raw poll events are translated into tagged [`Readiness`] values and merged
//! so that the listener and each connection are dispatched at most once per
//! round, with the listener first. kqueue can report read and write readiness
//! for the same token as separate events, hence the merge.

use mio::Token;
use std::collections::HashMap;

/// Token reserved for the listening socket.
pub const LISTENER_TOKEN: Token = Token(usize::MAX);

/// What a poll round reported for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The listener has connections waiting.
    Acceptable,
    /// The connection has input (or hung up / errored); its output is
    /// flushed right after the read.
    Readable(usize),
    /// The connection can take more output.
    Writable(usize),
}

impl Readiness {
    /// Translate one poll event.
    ///
    /// Hang-ups and errors count as readable so the next read observes them.
    pub fn from_event(token: Token, readable: bool, writable: bool) -> Option<Self> {
        if token == LISTENER_TOKEN {
            return readable.then_some(Readiness::Acceptable);
        }
        let Token(conn_id) = token;
        if readable {
            Some(Readiness::Readable(conn_id))
        } else if writable {
            Some(Readiness::Writable(conn_id))
        } else {
            None
        }
    }
}

/// Deduplicated readiness for one poll round.
#[derive(Debug, Default)]
pub struct ReadySet {
    acceptable: bool,
    ready: Vec<Readiness>,
    index: HashMap<usize, usize>,
}

impl ReadySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event, merging it with earlier events for the same token.
    pub fn push(&mut self, readiness: Readiness) {
        let conn_id = match readiness {
            Readiness::Acceptable => {
                self.acceptable = true;
                return;
            }
            Readiness::Readable(id) | Readiness::Writable(id) => id,
        };

        match self.index.get(&conn_id) {
            // Readable already implies a write attempt
            Some(&pos) => {
                if matches!(readiness, Readiness::Readable(_)) {
                    self.ready[pos] = readiness;
                }
            }
            None => {
                self.index.insert(conn_id, self.ready.len());
                self.ready.push(readiness);
            }
        }
    }

    /// Dispatch order: listener first, then connections in event order.
    pub fn drain(&mut self) -> impl Iterator<Item = Readiness> + '_ {
        let accept = std::mem::take(&mut self.acceptable).then_some(Readiness::Acceptable);
        self.index.clear();
        accept.into_iter().chain(self.ready.drain(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_event() {
        assert_eq!(
            Readiness::from_event(LISTENER_TOKEN, true, false),
            Some(Readiness::Acceptable)
        );
        assert_eq!(Readiness::from_event(LISTENER_TOKEN, false, true), None);
        assert_eq!(
            Readiness::from_event(Token(3), true, true),
            Some(Readiness::Readable(3))
        );
        assert_eq!(
            Readiness::from_event(Token(3), false, true),
            Some(Readiness::Writable(3))
        );
        assert_eq!(Readiness::from_event(Token(3), false, false), None);
    }

    #[test]
    fn test_merge_same_connection() {
        let mut set = ReadySet::new();
        set.push(Readiness::Writable(1));
        set.push(Readiness::Readable(2));
        set.push(Readiness::Readable(1));
        set.push(Readiness::Writable(2));
        set.push(Readiness::Acceptable);
        set.push(Readiness::Acceptable);

        let order: Vec<_> = set.drain().collect();
        assert_eq!(
            order,
            vec![
                Readiness::Acceptable,
                Readiness::Readable(1),
                Readiness::Readable(2),
            ]
        );
        assert_eq!(set.drain().count(), 0);
    }

    #[test]
    fn test_reuse_after_drain() {
        let mut set = ReadySet::new();
        set.push(Readiness::Readable(7));
        assert_eq!(set.drain().count(), 1);

        set.push(Readiness::Writable(7));
        let order: Vec<_> = set.drain().collect();
        assert_eq!(order, vec![Readiness::Writable(7)]);
    }
}
