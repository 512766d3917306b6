use std::time::Duration;

use {
    courier_client::ReconnectPlan, courier_config::ReconnectSettings,
    courier_protocol::close_codes,
};

/// Decides how to re-establish the session after the socket closes.
///
/// Authorization-expiry closes (4401, 4407) log in again straight away.
/// Anything else reuses the token after an exponential backoff.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_attempts: settings.max_attempts,
        }
    }

    /// Plan for reconnect attempt number `attempt` (starting at 1) after a
    /// close with `code`. `None` means stop trying.
    #[must_use]
    pub fn plan(&self, code: Option<u16>, attempt: u32) -> Option<ReconnectPlan> {
        if let Some(max) = self.max_attempts
            && attempt > max
        {
            return None;
        }

        if close_codes::requires_relogin(code) {
            return Some(ReconnectPlan {
                delay: Duration::ZERO,
                relogin: true,
            });
        }

        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay);
        Some(ReconnectPlan {
            delay,
            relogin: false,
        })
    }
}
