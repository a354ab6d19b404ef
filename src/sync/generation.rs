//! # Generation Tokens
//!
//! Per-cycle epoch counter used to discard superseded fetch results.
//!
//! Every fetch is issued with a fresh, strictly increasing token. A
//! completion is accepted only if its token is newer than the last accepted
//! one and not older than the most recent invalidation, so a later-issued
//! fetch always wins regardless of completion order.

use std::fmt;

/// Token attached to one issued fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationToken(u64);

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generation counter for one fetch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    issued: u64,
    applied: u64,
    floor: u64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the token for a new fetch.
    pub fn issue(&mut self) -> GenerationToken {
        self.issued += 1;
        GenerationToken(self.issued)
    }

    /// Mark every token issued so far as stale.
    ///
    /// Used when the parameters of the cycle change (history target id).
    pub fn invalidate(&mut self) {
        self.floor = self.issued + 1;
    }

    /// Whether a completion carrying `token` may still be applied.
    pub fn is_fresh(&self, token: GenerationToken) -> bool {
        token.0 >= self.floor && token.0 > self.applied
    }

    /// Accept a completion, returning `false` if it is superseded.
    ///
    /// Accepting advances the high-water mark, so any older token still in
    /// flight will be rejected.
    pub fn accept(&mut self, token: GenerationToken) -> bool {
        if !self.is_fresh(token) {
            return false;
        }
        self.applied = token.0;
        true
    }
}
