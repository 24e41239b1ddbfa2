use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request quotas applied over a sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub per_ip: u32,
    pub per_user: u32,
    pub window_secs: u64,
}

impl RateLimits {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_ip: 50,
            per_user: 100,
            window_secs: 3600,
        }
    }
}

/// Identity a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatClient {
    pub ip: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ChatClient {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_id: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into()).filter(|id: &String| !id.is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitScope {
    Ip,
    User,
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip => f.write_str("ip"),
            Self::User => f.write_str("user"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub ip_remaining: u32,
    pub user_remaining: Option<u32>,
    pub reset_in_seconds: u64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("rate limit exceeded for {scope}")]
pub struct RateLimitExceeded {
    pub scope: LimitScope,
    pub status: RateLimitStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ClientKey {
    Ip(String),
    User(String),
}

/// In-memory sliding-window limiter keyed by IP and, when known, user id.
#[derive(Debug, Default)]
pub struct RateLimiter {
    limits: RateLimits,
    hits: HashMap<ClientKey, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            hits: HashMap::new(),
            last_sweep: None,
        }
    }

    pub fn check(&mut self, client: &ChatClient) -> Result<RateLimitStatus, RateLimitExceeded> {
        self.check_at(client, Instant::now())
    }

    /// Count a request made at `now`. Rejected requests are not recorded.
    pub fn check_at(
        &mut self,
        client: &ChatClient,
        now: Instant,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        self.sweep_if_due(now);
        let ip_key = ClientKey::Ip(client.ip.clone());
        let user_key = client.user_id.clone().map(ClientKey::User);

        if self.count(&ip_key, now) >= self.limits.per_ip {
            return Err(self.exceeded(LimitScope::Ip, client, now));
        }
        if let Some(user_key) = &user_key {
            if self.count(user_key, now) >= self.limits.per_user {
                return Err(self.exceeded(LimitScope::User, client, now));
            }
        }

        self.hits.entry(ip_key).or_default().push_back(now);
        if let Some(user_key) = user_key {
            self.hits.entry(user_key).or_default().push_back(now);
        }
        Ok(self.remaining_at(client, now))
    }

    pub fn remaining(&mut self, client: &ChatClient) -> RateLimitStatus {
        self.remaining_at(client, Instant::now())
    }

    pub fn remaining_at(&mut self, client: &ChatClient, now: Instant) -> RateLimitStatus {
        let ip_key = ClientKey::Ip(client.ip.clone());
        let ip_used = self.count(&ip_key, now);
        let user_remaining = client.user_id.as_ref().map(|user| {
            let used = self.count(&ClientKey::User(user.clone()), now);
            self.limits.per_user.saturating_sub(used)
        });

        RateLimitStatus {
            ip_remaining: self.limits.per_ip.saturating_sub(ip_used),
            user_remaining,
            reset_in_seconds: self.reset_in(&ip_key, now).as_secs(),
        }
    }

    /// Drop expired hits for every client, forgetting clients with none left.
    pub fn prune(&mut self, now: Instant) {
        let window = self.limits.window();
        self.hits.retain(|_, entries| {
            drop_expired(entries, now, window);
            !entries.is_empty()
        });
        self.last_sweep = Some(now);
    }

    /// Number of clients (IPs and user ids) currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }

    fn sweep_if_due(&mut self, now: Instant) {
        match self.last_sweep {
            None => self.last_sweep = Some(now),
            Some(last) if now.saturating_duration_since(last) >= self.limits.window() => {
                self.prune(now);
            }
            Some(_) => {}
        }
    }

    fn count(&mut self, key: &ClientKey, now: Instant) -> u32 {
        let window = self.limits.window();
        let Some(entries) = self.hits.get_mut(key) else {
            return 0;
        };
        drop_expired(entries, now, window);
        if entries.is_empty() {
            self.hits.remove(key);
            return 0;
        }
        u32::try_from(entries.len()).unwrap_or(u32::MAX)
    }

    /// Time until the oldest counted request leaves the window.
    fn reset_in(&self, key: &ClientKey, now: Instant) -> Duration {
        let window = self.limits.window();
        self.hits
            .get(key)
            .and_then(|entries| entries.front())
            .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
            .unwrap_or(window)
    }

    fn exceeded(&mut self, scope: LimitScope, client: &ChatClient, now: Instant) -> RateLimitExceeded {
        RateLimitExceeded {
            scope,
            status: self.remaining_at(client, now),
        }
    }
}

fn drop_expired(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while entries
        .front()
        .is_some_and(|stamp| now.saturating_duration_since(*stamp) >= window)
    {
        entries.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_ip: u32, per_user: u32) -> RateLimiter {
        RateLimiter::new(RateLimits {
            per_ip,
            per_user,
            window_secs: 3600,
        })
    }

    #[test]
    fn blocks_ip_after_quota() {
        let mut limiter = limiter(2, 10);
        let client = ChatClient::new("10.0.0.1");
        let now = Instant::now();

        assert_eq!(limiter.check_at(&client, now).unwrap().ip_remaining, 1);
        assert_eq!(limiter.check_at(&client, now).unwrap().ip_remaining, 0);
        let err = limiter.check_at(&client, now).unwrap_err();
        assert_eq!(err.scope, LimitScope::Ip);
        assert_eq!(err.status.ip_remaining, 0);

        let other = ChatClient::new("10.0.0.2");
        assert!(limiter.check_at(&other, now).is_ok());
    }

    #[test]
    fn user_quota_applies_across_ips() {
        let mut limiter = limiter(10, 2);
        let now = Instant::now();
        let first = ChatClient::new("1.1.1.1").with_user("alice");
        let second = ChatClient::new("2.2.2.2").with_user("alice");

        limiter.check_at(&first, now).unwrap();
        let status = limiter.check_at(&second, now).unwrap();
        assert_eq!(status.user_remaining, Some(0));
        assert_eq!(status.ip_remaining, 9);

        let err = limiter.check_at(&first, now).unwrap_err();
        assert_eq!(err.scope, LimitScope::User);
    }

    #[test]
    fn rejected_requests_are_not_counted() {
        let mut limiter = limiter(1, 10);
        let client = ChatClient::new("10.0.0.1");
        let start = Instant::now();

        limiter.check_at(&client, start).unwrap();
        for _ in 0..5 {
            assert!(limiter.check_at(&client, start).is_err());
        }

        let later = start + Duration::from_secs(3600);
        assert_eq!(limiter.check_at(&client, later).unwrap().ip_remaining, 0);
    }

    #[test]
    fn window_slides_and_reports_reset() {
        let mut limiter = limiter(2, 10);
        let client = ChatClient::new("10.0.0.1");
        let start = Instant::now();

        limiter.check_at(&client, start).unwrap();
        limiter
            .check_at(&client, start + Duration::from_secs(600))
            .unwrap();

        let status = limiter.remaining_at(&client, start + Duration::from_secs(1200));
        assert_eq!(status.ip_remaining, 0);
        assert_eq!(status.reset_in_seconds, 2400);
        assert_eq!(status.user_remaining, None);

        let status = limiter.remaining_at(&client, start + Duration::from_secs(3600));
        assert_eq!(status.ip_remaining, 1);
        assert_eq!(status.reset_in_seconds, 600);
    }

    #[test]
    fn unknown_client_has_full_quota() {
        let mut limiter = RateLimiter::new(RateLimits::default());
        let status = limiter.remaining(&ChatClient::new("9.9.9.9").with_user("bob"));
        assert_eq!(
            status,
            RateLimitStatus {
                ip_remaining: 50,
                user_remaining: Some(100),
                reset_in_seconds: 3600,
            }
        );
    }

    #[test]
    fn clients_that_never_return_are_swept() {
        let mut limiter = limiter(5, 5);
        let start = Instant::now();
        for i in 0..3 {
            let client = ChatClient::new(format!("10.0.0.{i}")).with_user(format!("user-{i}"));
            limiter.check_at(&client, start).unwrap();
        }
        assert_eq!(limiter.tracked_clients(), 6);

        limiter
            .check_at(&ChatClient::new("10.0.0.1"), start + Duration::from_secs(1800))
            .unwrap();
        assert_eq!(limiter.tracked_clients(), 6);

        let later = start + Duration::from_secs(3600);
        limiter.check_at(&ChatClient::new("10.9.9.9"), later).unwrap();
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn prune_keeps_hits_still_inside_the_window() {
        let mut limiter = limiter(5, 5);
        let start = Instant::now();
        limiter.check_at(&ChatClient::new("10.0.0.1"), start).unwrap();
        limiter
            .check_at(&ChatClient::new("10.0.0.2"), start + Duration::from_secs(3000))
            .unwrap();

        limiter.prune(start + Duration::from_secs(3600));
        assert_eq!(limiter.tracked_clients(), 1);
        let status = limiter.remaining_at(&ChatClient::new("10.0.0.2"), start + Duration::from_secs(3600));
        assert_eq!(status.ip_remaining, 4);
    }

    #[test]
    fn empty_user_id_is_ignored() {
        assert_eq!(ChatClient::new("1.2.3.4").with_user("").user_id, None);
    }
}
