//! Health profile rendering

use crate::core::config;
use crate::core::paywall::{self, Usage};
use crate::storage::User;

const NOT_PREGNANT: &str = "not pregnant";

/// Suffix appended to model prompts describing the patient.
///
/// Empty when neither sex nor age is known.
pub fn profile_context(user: &User) -> String {
    if user.gender.is_none() && user.age.is_none() {
        return String::new();
    }

    let age = user.age.map(|a| a.to_string());
    let mut s = format!(
        "\nPatient: {}, {} years",
        user.gender.as_deref().unwrap_or("?"),
        age.as_deref().unwrap_or("?")
    );

    if let Some(status) = user.pregnancy_status.as_deref().filter(|s| *s != NOT_PREGNANT) {
        s.push_str(", ");
        s.push_str(status);
    }
    if let Some(height) = user.height {
        s.push_str(&format!(", {} cm", height));
    }
    if let Some(weight) = user.weight {
        s.push_str(&format!(", {} kg", weight));
    }
    if let Some(activity) = &user.activity_level {
        s.push_str(&format!(", activity: {}", activity));
    }
    if let Some(diet) = &user.diet_restrictions {
        s.push_str(&format!(", diet: {}", diet));
    }
    if let Some(goal) = &user.goal {
        s.push_str(&format!(". Goal: {}", goal));
    }
    s.push('.');
    s
}

fn usage_line(label: &str, used: i64, usage: Usage, pro: bool) -> String {
    if pro {
        format!("{}: {}/∞", label, used)
    } else {
        format!("{}: {}/{}", label, used, usage.limit())
    }
}

/// Markdown profile card for "👤 My Profile" and `/profile`.
pub fn format_profile(user: &User, now: i64) -> String {
    let not_set = "Not set";
    let pro = paywall::has_pro(user, now);

    let mut lines = vec![
        "👤 *Your Profile*".to_string(),
        format!("Sex: {}", user.gender.as_deref().unwrap_or(not_set)),
    ];
    if let Some(status) = user.pregnancy_status.as_deref().filter(|s| *s != NOT_PREGNANT) {
        lines.push(format!("Status: {}", status));
    }
    lines.push(format!(
        "Age: {}",
        user.age.map(|a| a.to_string()).unwrap_or_else(|| not_set.to_string())
    ));
    lines.push(format!(
        "Height: {}",
        user.height.map(|h| format!("{} cm", h)).unwrap_or_else(|| not_set.to_string())
    ));
    lines.push(format!(
        "Weight: {}",
        user.weight.map(|w| format!("{} kg", w)).unwrap_or_else(|| not_set.to_string())
    ));
    lines.push(format!("Activity: {}", user.activity_level.as_deref().unwrap_or(not_set)));
    lines.push(format!("Diet: {}", user.diet_restrictions.as_deref().unwrap_or(not_set)));
    lines.push(format!("Goal: {}", user.goal.as_deref().unwrap_or(not_set)));

    lines.push("\n📊 *Usage*".to_string());
    lines.push(usage_line("Analyses", user.analysis_count, Usage::Analysis, pro));
    lines.push(usage_line("Chats", user.chat_count, Usage::Chat, pro));

    if user.is_pro {
        lines.push("\n⭐ *Pro Member*".to_string());
    } else if paywall::in_trial(user, now) {
        lines.push(format!(
            "\n🎁 *Trial active* ({} day(s) left)\n[Upgrade to Pro]({})",
            paywall::trial_days_left(user, now),
            config::CHECKOUT_URL.as_str()
        ));
    } else {
        lines.push(format!("\n[Upgrade to Pro]({})", config::CHECKOUT_URL.as_str()));
    }

    lines.join("\n")
}
