//! Free-tier quotas, trials and referral bonuses
//!
//! All functions take `now` as unix seconds so they stay pure and testable.

use thiserror::Error;

use crate::core::config::limits::{FREE_ANALYSIS_LIMIT, FREE_CHAT_LIMIT, REFERRAL_BONUS_DAYS, TRIAL_DAYS};
use crate::storage::User;

const DAY_SECS: i64 = 24 * 60 * 60;

/// Metered feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Analysis,
    Chat,
}

impl Usage {
    pub fn limit(self) -> i64 {
        match self {
            Usage::Analysis => FREE_ANALYSIS_LIMIT,
            Usage::Chat => FREE_CHAT_LIMIT,
        }
    }

    fn used(self, user: &User) -> i64 {
        match self {
            Usage::Analysis => user.analysis_count,
            Usage::Chat => user.chat_count,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrialError {
    #[error("trial already used")]
    TrialAlreadyUsed,
    #[error("user is already pro")]
    AlreadyPro,
}

/// Paid subscription or a running trial.
pub fn has_pro(user: &User, now: i64) -> bool {
    user.is_pro || in_trial(user, now)
}

pub fn in_trial(user: &User, now: i64) -> bool {
    user.trial_expires > now
}

pub fn can_use(user: &User, usage: Usage, now: i64) -> bool {
    has_pro(user, now) || usage.used(user) < usage.limit()
}

/// Free uses left; never negative.
pub fn remaining(user: &User, usage: Usage) -> i64 {
    (usage.limit() - usage.used(user)).max(0)
}

/// Starts the one-off trial. Returns the new expiry.
pub fn start_trial(user: &mut User, now: i64) -> Result<i64, TrialError> {
    if user.is_pro {
        return Err(TrialError::AlreadyPro);
    }
    if user.trial_used {
        return Err(TrialError::TrialAlreadyUsed);
    }
    user.trial_used = true;
    user.trial_expires = now + TRIAL_DAYS * DAY_SECS;
    Ok(user.trial_expires)
}

/// Adds the referral bonus to the referrer's trial window. A running trial is
/// extended, an expired or absent one starts from `now`.
pub fn apply_referral_bonus(referrer: &mut User, now: i64) -> i64 {
    let base = referrer.trial_expires.max(now);
    referrer.trial_expires = base + REFERRAL_BONUS_DAYS * DAY_SECS;
    referrer.trial_expires
}

/// Whether `referrer` may be credited for the freshly created `newcomer`.
pub fn can_refer(referrer: &User, newcomer: &User, newly_created: bool) -> bool {
    newly_created && newcomer.referred_by == 0 && referrer.id != newcomer.id
}

/// `MC` + base-36 of the user ID.
pub fn referral_code(user_id: i64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

    let mut n = user_id.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    digits.reverse();

    let mut code = String::from("MC");
    code.push_str(&String::from_utf8_lossy(&digits));
    code
}

/// Extracts the code from a `/start ref_<CODE>` payload.
pub fn parse_referral_payload(payload: &str) -> Option<&str> {
    payload
        .trim()
        .strip_prefix("ref_")
        .filter(|code| !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Whole days left in the trial, rounded up.
pub fn trial_days_left(user: &User, now: i64) -> i64 {
    if !in_trial(user, now) {
        return 0;
    }
    (user.trial_expires - now + DAY_SECS - 1) / DAY_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_780_000_000;

    fn user() -> User {
        User {
            id: 1,
            username: None,
            first_name: None,
            gender: None,
            age: None,
            height: None,
            weight: None,
            activity_level: None,
            diet_restrictions: None,
            pregnancy_status: None,
            goal: None,
            is_pro: false,
            tz_offset: 0,
            lang: "en".into(),
            analysis_count: 0,
            chat_count: 0,
            trial_expires: 0,
            referral_code: None,
            referred_by: 0,
            trial_used: false,
            joined_at: String::new(),
            last_active: String::new(),
        }
    }

    #[test]
    fn free_user_is_blocked_at_limit() {
        let mut u = user();
        u.analysis_count = FREE_ANALYSIS_LIMIT - 1;
        assert!(can_use(&u, Usage::Analysis, NOW));
        assert_eq!(remaining(&u, Usage::Analysis), 1);

        u.analysis_count = FREE_ANALYSIS_LIMIT;
        assert!(!can_use(&u, Usage::Analysis, NOW));
        assert_eq!(remaining(&u, Usage::Analysis), 0);
        assert!(can_use(&u, Usage::Chat, NOW));
    }

    #[test]
    fn pro_and_trial_bypass_limits() {
        let mut u = user();
        u.analysis_count = 50;
        u.is_pro = true;
        assert!(can_use(&u, Usage::Analysis, NOW));

        u.is_pro = false;
        u.trial_expires = NOW + 10;
        assert!(can_use(&u, Usage::Analysis, NOW));

        u.trial_expires = NOW;
        assert!(!can_use(&u, Usage::Analysis, NOW));
    }

    #[test]
    fn trial_only_once() {
        let mut u = user();
        let expires = start_trial(&mut u, NOW).unwrap();
        assert_eq!(expires, NOW + TRIAL_DAYS * DAY_SECS);
        assert_eq!(trial_days_left(&u, NOW), TRIAL_DAYS);
        assert_eq!(start_trial(&mut u, NOW), Err(TrialError::TrialAlreadyUsed));

        let mut pro = user();
        pro.is_pro = true;
        assert_eq!(start_trial(&mut pro, NOW), Err(TrialError::AlreadyPro));
    }

    #[test]
    fn referral_bonus_extends_running_trial() {
        let mut u = user();
        u.trial_expires = NOW + DAY_SECS;
        apply_referral_bonus(&mut u, NOW);
        assert_eq!(u.trial_expires, NOW + (1 + REFERRAL_BONUS_DAYS) * DAY_SECS);

        let mut expired = user();
        expired.trial_expires = NOW - 100;
        apply_referral_bonus(&mut expired, NOW);
        assert_eq!(expired.trial_expires, NOW + REFERRAL_BONUS_DAYS * DAY_SECS);
    }

    #[test]
    fn referral_rules() {
        let referrer = user();
        let mut newcomer = user();
        newcomer.id = 2;
        assert!(can_refer(&referrer, &newcomer, true));
        assert!(!can_refer(&referrer, &newcomer, false));
        assert!(!can_refer(&referrer, &referrer, true));
        newcomer.referred_by = 5;
        assert!(!can_refer(&referrer, &newcomer, true));
    }

    #[test]
    fn referral_codes() {
        assert_eq!(referral_code(0), "MC0");
        assert_eq!(referral_code(35), "MCZ");
        assert_eq!(referral_code(36), "MC10");
        assert_eq!(parse_referral_payload("ref_MC10"), Some("MC10"));
        assert_eq!(parse_referral_payload("ref_"), None);
        assert_eq!(parse_referral_payload("hello"), None);
        assert_eq!(parse_referral_payload("ref_a b"), None);
    }
}
