// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-profile token window accounting and the `"auto"` profile
//! selector (C3).

/// Fraction of `hard_cap_tokens` at which a window is considered "near cap".
pub const SOFT_THRESHOLD: f64 = 0.9;
/// Minimum remaining fraction for a profile to still be "chaseable" by
/// the auto-selector.
const CHASEABLE_REMAINING_FRACTION: f64 = 0.05;
/// Anti-flap window: a previously-chosen profile is preferred when the
/// last switch happened more recently than this.
const ANTI_FLAP_MS: u64 = 15 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    Ok,
    Soft,
    Hard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleWindow {
    pub name: String,
    pub hard_cap_tokens: u64,
    pub used_tokens: u64,
    pub window_end_ts: u64,
    pub next_reset_ts: u64,
}

impl ThrottleWindow {
    pub fn remaining_fraction(&self) -> f64 {
        if self.hard_cap_tokens == 0 {
            return 0.0;
        }
        let used = self.used_tokens.min(self.hard_cap_tokens) as f64;
        1.0 - (used / self.hard_cap_tokens as f64)
    }

    fn used_fraction(&self) -> f64 {
        if self.hard_cap_tokens == 0 {
            return 1.0;
        }
        self.used_tokens as f64 / self.hard_cap_tokens as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleSnapshot {
    pub windows: Vec<ThrottleWindow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleDecision {
    pub state: ThrottleState,
    pub resume_at_ts: Option<u64>,
    pub snapshot: ThrottleSnapshot,
}

/// Evaluate a profile's windows against `now` to decide its throttle state.
pub fn get_throttle_decision(windows: Vec<ThrottleWindow>) -> ThrottleDecision {
    let hard = windows.iter().find(|w| w.used_tokens >= w.hard_cap_tokens);
    if let Some(w) = hard {
        return ThrottleDecision {
            state: ThrottleState::Hard,
            resume_at_ts: Some(w.next_reset_ts),
            snapshot: ThrottleSnapshot { windows },
        };
    }

    let soft = windows.iter().find(|w| w.used_fraction() >= SOFT_THRESHOLD);
    if let Some(w) = soft {
        return ThrottleDecision {
            state: ThrottleState::Soft,
            resume_at_ts: Some(w.next_reset_ts),
            snapshot: ThrottleSnapshot { windows },
        };
    }

    ThrottleDecision { state: ThrottleState::Ok, resume_at_ts: None, snapshot: ThrottleSnapshot { windows } }
}

/// One named profile's evaluated decision, as fed to the auto-selector.
pub struct ProfileCandidate {
    pub name: String,
    pub decision: ThrottleDecision,
}

fn window<'a>(decision: &'a ThrottleDecision, name: &str) -> Option<&'a ThrottleWindow> {
    decision.snapshot.windows.iter().find(|w| w.name == name)
}

/// Select a profile for the `"auto"` request: among non-hard profiles,
/// prefer the soonest weekly reset among those still chaseable, tie-break
/// by greater weekly remaining, then anti-flap toward the previous pick.
pub fn select_auto_profile(
    candidates: Vec<ProfileCandidate>,
    previous_profile: Option<&str>,
    last_switch_age_ms: Option<u64>,
) -> Option<String> {
    let mut chaseable: Vec<ProfileCandidate> = candidates
        .into_iter()
        .filter(|c| c.decision.state != ThrottleState::Hard)
        .filter(|c| {
            let weekly_ok = window(&c.decision, "weekly")
                .map(|w| w.remaining_fraction() >= CHASEABLE_REMAINING_FRACTION)
                .unwrap_or(true);
            let rolling_ok = window(&c.decision, "rolling-5h")
                .map(|w| w.remaining_fraction() > 0.0)
                .unwrap_or(true);
            weekly_ok && rolling_ok
        })
        .collect();

    if chaseable.is_empty() {
        return None;
    }

    if let (Some(prev), Some(age)) = (previous_profile, last_switch_age_ms) {
        if age < ANTI_FLAP_MS && chaseable.iter().any(|c| c.name == prev) {
            return Some(prev.to_string());
        }
    }

    chaseable.sort_by(|a, b| {
        let a_weekly = window(&a.decision, "weekly");
        let b_weekly = window(&b.decision, "weekly");
        let reset_cmp = match (a_weekly, b_weekly) {
            (Some(a), Some(b)) => a.next_reset_ts.cmp(&b.next_reset_ts),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        reset_cmp.then_with(|| {
            let a_rem = a_weekly.map(|w| w.remaining_fraction()).unwrap_or(0.0);
            let b_rem = b_weekly.map(|w| w.remaining_fraction()).unwrap_or(0.0);
            b_rem.partial_cmp(&a_rem).unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    chaseable.into_iter().next().map(|c| c.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(name: &str, used: u64, cap: u64, reset: u64) -> ThrottleWindow {
        ThrottleWindow { name: name.to_string(), hard_cap_tokens: cap, used_tokens: used, window_end_ts: reset, next_reset_ts: reset }
    }

    #[test]
    fn hard_when_any_window_at_cap() {
        let decision = get_throttle_decision(vec![window("weekly", 100, 100, 5_000)]);
        assert_eq!(decision.state, ThrottleState::Hard);
        assert_eq!(decision.resume_at_ts, Some(5_000));
    }

    #[test]
    fn soft_when_near_cap() {
        let decision = get_throttle_decision(vec![window("weekly", 95, 100, 5_000)]);
        assert_eq!(decision.state, ThrottleState::Soft);
    }

    #[test]
    fn ok_when_well_under_cap() {
        let decision = get_throttle_decision(vec![window("weekly", 10, 100, 5_000)]);
        assert_eq!(decision.state, ThrottleState::Ok);
        assert!(decision.resume_at_ts.is_none());
    }

    fn candidate(name: &str, weekly_used: u64, weekly_cap: u64, reset: u64) -> ProfileCandidate {
        ProfileCandidate {
            name: name.to_string(),
            decision: get_throttle_decision(vec![window("weekly", weekly_used, weekly_cap, reset)]),
        }
    }

    #[test]
    fn auto_selector_drops_hard_profiles() {
        let candidates = vec![candidate("fast", 100, 100, 1_000), candidate("slow", 10, 100, 2_000)];
        assert_eq!(select_auto_profile(candidates, None, None), Some("slow".to_string()));
    }

    #[test]
    fn auto_selector_prefers_soonest_weekly_reset() {
        let candidates = vec![candidate("a", 10, 100, 5_000), candidate("b", 10, 100, 1_000)];
        assert_eq!(select_auto_profile(candidates, None, None), Some("b".to_string()));
    }

    #[test]
    fn auto_selector_skips_non_chaseable_profiles() {
        let candidates = vec![candidate("nearly-exhausted", 96, 100, 1_000), candidate("healthy", 50, 100, 5_000)];
        assert_eq!(select_auto_profile(candidates, None, None), Some("healthy".to_string()));
    }

    #[test]
    fn auto_selector_anti_flaps_toward_previous_pick() {
        let candidates = vec![candidate("a", 10, 100, 5_000), candidate("b", 10, 100, 1_000)];
        let chosen = select_auto_profile(candidates, Some("a"), Some(60_000));
        assert_eq!(chosen, Some("a".to_string()));
    }

    #[test]
    fn auto_selector_ignores_anti_flap_after_window_expires() {
        let candidates = vec![candidate("a", 10, 100, 5_000), candidate("b", 10, 100, 1_000)];
        let chosen = select_auto_profile(candidates, Some("a"), Some(16 * 60 * 1000));
        assert_eq!(chosen, Some("b".to_string()));
    }

    #[test]
    fn auto_selector_returns_none_when_all_unchaseable() {
        let candidates = vec![candidate("a", 96, 100, 1_000)];
        assert_eq!(select_auto_profile(candidates, None, None), None);
    }
}
