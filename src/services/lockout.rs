use crate::config::auth::AuthConfig;
use crate::models::UserModel;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub lock_duration: chrono::Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_duration: chrono::Duration::minutes(15),
        }
    }
}

impl From<&AuthConfig> for LockoutPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            max_attempts: config.max_login_attempts.max(1),
            lock_duration: config.lock_duration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { until: NaiveDateTime },
}

/// Counter values after a wrong password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub attempts: i32,
    pub lock_until: Option<NaiveDateTime>,
}

impl LockoutPolicy {
    /// Expiry is lazy: a lock whose time has passed is simply ignored.
    pub fn state(&self, user: &UserModel, now: NaiveDateTime) -> LockState {
        match user.lock_until {
            Some(until) if now < until => LockState::Locked { until },
            _ => LockState::Unlocked,
        }
    }

    /// Only valid for an unlocked account. A stale lock restarts the count.
    pub fn register_failure(
        &self,
        attempts: i32,
        lock_until: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> FailureOutcome {
        let previous = match lock_until {
            Some(until) if until <= now => 0,
            _ => attempts.max(0),
        };
        let attempts = previous.saturating_add(1);
        let lock_until = (attempts >= self.threshold()).then(|| now + self.lock_duration);

        FailureOutcome {
            attempts,
            lock_until,
        }
    }

    pub fn attempts_remaining(&self, attempts: i32) -> u32 {
        u32::try_from(self.threshold().saturating_sub(attempts)).unwrap_or(0)
    }

    pub fn threshold(&self) -> i32 {
        i32::try_from(self.max_attempts).unwrap_or(i32::MAX)
    }
}

/// Whole minutes left on a lock, rounded up and never below one.
pub fn minutes_remaining(until: NaiveDateTime, now: NaiveDateTime) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}
