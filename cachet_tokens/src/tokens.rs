use cachet_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Serialize};

use super::AccessTokenRef;

/// A token as returned by the authority with some additional lifetime information
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenWithLifetime {
    access_token: Box<AccessTokenRef>,
    lifetime: DurationSecs,
    issued: UnixTime,
    stale: UnixTime,
    expiry: UnixTime,
}

impl TokenWithLifetime {
    pub(crate) fn clone_it(&self) -> Self {
        Self {
            access_token: self.access_token.to_owned().into_boxed_ref(),
            lifetime: self.lifetime,
            issued: self.issued,
            stale: self.stale,
            expiry: self.expiry,
        }
    }
}

/// A token's lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token is fresh and valid
    Fresh,
    /// The token is valid, but should be refreshed
    Stale,
    /// The token is no longer valid
    Expired,
}

impl TokenWithLifetime {
    /// Gets the current access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the token's lifetime
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.lifetime
    }

    /// Gets the time that the token was issued
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the time that the token will become stale
    #[inline]
    pub fn stale(&self) -> UnixTime {
        self.stale
    }

    /// Gets the time that the token will expire
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// Gets the interval during which the token should be considered fresh
    #[inline]
    pub fn fresh_interval(&self) -> std::ops::Range<UnixTime> {
        self.issued..self.stale
    }

    /// Gets the interval during which the token is valid
    #[inline]
    pub fn valid_interval(&self) -> std::ops::Range<UnixTime> {
        self.issued..self.expiry
    }

    /// Gets the token's current lifetime status
    #[inline]
    pub fn token_status(&self) -> TokenStatus {
        self.token_status_with_clock(&System)
    }

    /// Gets the token's lifetime status based on the current time
    /// as reported by the provided clock
    #[inline]
    pub fn token_status_with_clock<C: Clock>(&self, clock: &C) -> TokenStatus {
        self.token_status_at(clock.now())
    }

    /// Gets the token's lifetime status as of the provided time
    #[inline]
    pub fn token_status_at(&self, time: UnixTime) -> TokenStatus {
        if time < self.stale {
            TokenStatus::Fresh
        } else if time < self.expiry {
            TokenStatus::Stale
        } else {
            TokenStatus::Expired
        }
    }

    /// Gets a duration for how much longer the token will be fresh
    #[inline]
    pub fn until_stale(&self) -> DurationSecs {
        self.until_stale_with_clock(&System)
    }

    /// Gets a duration for how much longer the token will be fresh based on the current time
    /// as reported by the provided clock
    #[inline]
    pub fn until_stale_with_clock<C: Clock>(&self, clock: &C) -> DurationSecs {
        self.until_stale_at(clock.now())
    }

    /// Gets a duration for how much longer the token would be fresh as of the
    /// provided time
    #[inline]
    pub fn until_stale_at(&self, time: UnixTime) -> DurationSecs {
        if time < self.stale {
            self.stale - time
        } else {
            DurationSecs(0)
        }
    }

    /// Gets a duration for how much longer the token will be valid
    #[inline]
    pub fn until_expired(&self) -> DurationSecs {
        self.until_expired_with_clock(&System)
    }

    /// Gets a duration for how much longer the token will be valid based on the current time
    /// as reported by the provided clock
    #[inline]
    pub fn until_expired_with_clock<C: Clock>(&self, clock: &C) -> DurationSecs {
        self.until_expired_at(clock.now())
    }

    /// Gets a duration for how much longer the token would be valid as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        if time < self.expiry {
            self.expiry - time
        } else {
            DurationSecs(0)
        }
    }
}

/// Configuration for determining how long a token should be considered fresh
///
/// A token is treated as stale, and so due for proactive renewal, once it is
/// within the refresh buffer of its expiry. A token whose whole lifetime fits
/// inside the buffer is stale from the moment it is issued.
#[derive(Clone, Debug)]
pub struct TokenLifetimeConfig<C = System> {
    refresh_buffer: DurationSecs,
    clock: C,
}

impl Default for TokenLifetimeConfig {
    /// Default lifetime configuration
    ///
    /// Uses a refresh buffer of 30 seconds and the system clock.
    fn default() -> Self {
        Self {
            refresh_buffer: DurationSecs(30),
            clock: System,
        }
    }
}

impl TokenLifetimeConfig {
    /// Constructs a new lifetime configuration with the given refresh buffer
    pub fn new(refresh_buffer: DurationSecs) -> Self {
        Self {
            refresh_buffer,
            clock: System,
        }
    }
}

impl<C> TokenLifetimeConfig<C> {
    /// Replaces the clock used to stamp token issuance times
    pub fn with_clock<C2>(self, clock: C2) -> TokenLifetimeConfig<C2> {
        TokenLifetimeConfig {
            refresh_buffer: self.refresh_buffer,
            clock,
        }
    }

    fn time_to_stale(&self, issued: UnixTime, valid_duration: DurationSecs) -> UnixTime {
        (issued + valid_duration)
            .saturating_sub(self.refresh_buffer)
            .max(issued)
    }
}

impl<C: Clock> TokenLifetimeConfig<C> {
    /// Given an access token and its valid duration, constructs a token with
    /// a lifetime
    pub fn create_token<A>(&self, access_token: A, valid_duration: DurationSecs) -> TokenWithLifetime
    where
        A: AsRef<AccessTokenRef>,
    {
        let issued = self.clock.now();
        TokenWithLifetime {
            access_token: access_token.as_ref().to_owned().into_boxed_ref(),
            lifetime: valid_duration,
            issued,
            stale: self.time_to_stale(issued, valid_duration),
            expiry: issued + valid_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use cachet_clock::TestClock;

    use crate::AccessToken;

    use super::*;

    #[test]
    fn status_transitions_across_the_refresh_buffer() {
        let config = TokenLifetimeConfig::default().with_clock(TestClock::new(UnixTime(1000)));
        let token = config.create_token(AccessToken::from_static("opaque"), DurationSecs(300));

        assert_eq!(token.issued(), UnixTime(1000));
        assert_eq!(token.stale(), UnixTime(1270));
        assert_eq!(token.expiry(), UnixTime(1300));

        assert_eq!(token.token_status_at(UnixTime(1269)), TokenStatus::Fresh);
        assert_eq!(token.token_status_at(UnixTime(1270)), TokenStatus::Stale);
        assert_eq!(token.token_status_at(UnixTime(1299)), TokenStatus::Stale);
        assert_eq!(token.token_status_at(UnixTime(1300)), TokenStatus::Expired);
    }

    #[test]
    fn short_lived_token_is_stale_immediately() {
        let config = TokenLifetimeConfig::default().with_clock(TestClock::new(UnixTime(1000)));
        let token = config.create_token(AccessToken::from_static("opaque"), DurationSecs(10));

        assert_eq!(token.stale(), token.issued());
        assert_eq!(token.token_status_at(UnixTime(1000)), TokenStatus::Stale);
    }

    #[test]
    fn remaining_durations_saturate_at_zero() {
        let config = TokenLifetimeConfig::default().with_clock(TestClock::new(UnixTime(1000)));
        let token = config.create_token(AccessToken::from_static("opaque"), DurationSecs(300));

        assert_eq!(token.until_stale_at(UnixTime(1200)), DurationSecs(70));
        assert_eq!(token.until_stale_at(UnixTime(1280)), DurationSecs(0));
        assert_eq!(token.until_expired_at(UnixTime(1280)), DurationSecs(20));
        assert_eq!(token.until_expired_at(UnixTime(1400)), DurationSecs(0));
    }
}
