//! Shared wall-clock cutoff for all pipeline roles
//!
//! The deadline is computed once at run start and passed to every role
//! by value. Roles poll it cooperatively at the top of each loop
//! iteration; a role blocked inside a single receive/ack call may
//! overrun the deadline by at most that call's duration.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    cutoff: Instant,
}

impl Deadline {
    /// Cutoff `window` from now; no role may extend or reset it
    pub fn after(window: Duration) -> Self {
        Self {
            cutoff: Instant::now() + window,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.cutoff
    }

    pub fn remaining(&self) -> Duration {
        self.cutoff.saturating_duration_since(Instant::now())
    }
}
