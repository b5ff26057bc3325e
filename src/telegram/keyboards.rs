//! Reply and inline keyboards

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

/// Buttons of the persistent reply keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuButton {
    AnalyzeBloodTest,
    MealPlan,
    Supplements,
    TrackSymptoms,
    InterpretDocument,
    HealthChat,
    FoodDiary,
    Detox,
    Profile,
    Upgrade,
}

impl MenuButton {
    pub const ALL: [MenuButton; 10] = [
        MenuButton::AnalyzeBloodTest,
        MenuButton::MealPlan,
        MenuButton::Supplements,
        MenuButton::TrackSymptoms,
        MenuButton::InterpretDocument,
        MenuButton::HealthChat,
        MenuButton::FoodDiary,
        MenuButton::Detox,
        MenuButton::Profile,
        MenuButton::Upgrade,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuButton::AnalyzeBloodTest => "🔬 Analyze Blood Test",
            MenuButton::MealPlan => "🥗 Meal Plan",
            MenuButton::Supplements => "💊 Supplement Protocol",
            MenuButton::TrackSymptoms => "📋 Track Symptoms",
            MenuButton::InterpretDocument => "📄 Interpret Document",
            MenuButton::HealthChat => "💬 Health Chat",
            MenuButton::FoodDiary => "📒 Food Diary",
            MenuButton::Detox => "🌿 7-Day Detox",
            MenuButton::Profile => "👤 My Profile",
            MenuButton::Upgrade => "⭐ Upgrade to Pro",
        }
    }

    pub fn from_text(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|button| button.label() == text)
    }
}

/// Two buttons per row, in `MenuButton::ALL` order.
pub fn main_menu() -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = MenuButton::ALL
        .chunks(2)
        .map(|pair| pair.iter().map(|b| KeyboardButton::new(b.label())).collect())
        .collect();
    KeyboardMarkup::new(rows).resize_keyboard()
}

fn single_column(buttons: &[(&str, &str)]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        buttons
            .iter()
            .map(|(text, data)| vec![InlineKeyboardButton::callback(*text, *data)]),
    )
}

pub fn gender() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("♂️ Male", "gender_male"),
        InlineKeyboardButton::callback("♀️ Female", "gender_female"),
    ]])
}

pub fn pregnancy() -> InlineKeyboardMarkup {
    single_column(&[
        ("🤰 Pregnant", "preg_yes"),
        ("🤱 Breastfeeding", "preg_bf"),
        ("❌ No", "preg_no"),
    ])
}

pub fn activity() -> InlineKeyboardMarkup {
    single_column(&[
        ("🛋 Sedentary", "act_sedentary"),
        ("🚶 Lightly active", "act_light"),
        ("🏃 Moderately active", "act_moderate"),
        ("🏋️ Very active", "act_active"),
    ])
}

pub fn diet() -> InlineKeyboardMarkup {
    single_column(&[
        ("🍽 No restrictions", "diet_none"),
        ("🥦 Vegetarian", "diet_vegetarian"),
        ("🌱 Vegan", "diet_vegan"),
        ("🥩 Keto / low-carb", "diet_keto"),
        ("🌾 Gluten-free", "diet_glutenfree"),
    ])
}

pub fn goal() -> InlineKeyboardMarkup {
    single_column(&[
        ("⚡ Energy & Performance", "goal_energy"),
        ("🧬 Longevity & Anti-aging", "goal_longevity"),
        ("⚖️ Weight Optimization", "goal_weight"),
        ("💚 General Health", "goal_general"),
    ])
}

pub fn detox_start() -> InlineKeyboardMarkup {
    single_column(&[("🌿 Start the 7-Day Detox", "detox_start")])
}

pub fn detox_restart() -> InlineKeyboardMarkup {
    single_column(&[("🔁 Start again", "detox_restart")])
}

pub fn detox_day(day: u8) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            format!("✅ Day {} done", day),
            format!("detox_done_{}", day),
        )],
        vec![InlineKeyboardButton::callback("💡 Coach tip", format!("detox_tip_{}", day))],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_labels_round_trip() {
        for button in MenuButton::ALL {
            assert_eq!(MenuButton::from_text(button.label()), Some(button));
        }
        assert_eq!(MenuButton::from_text("hello"), None);
    }

    #[test]
    fn main_menu_has_five_rows() {
        assert_eq!(main_menu().keyboard.len(), 5);
    }
}
