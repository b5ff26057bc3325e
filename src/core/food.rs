//! Food diary estimates and daily totals

use serde::{Deserialize, Serialize};

/// Nutrition estimate for one diary entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodEstimate {
    pub description: String,
    pub calories: i64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Sum of a day's entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTotals {
    pub entries: usize,
    pub calories: i64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl DailyTotals {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a FoodEstimate>) -> Self {
        entries.into_iter().fold(Self::default(), |mut acc, e| {
            acc.entries += 1;
            acc.calories += e.calories;
            acc.protein += e.protein;
            acc.carbs += e.carbs;
            acc.fat += e.fat;
            acc
        })
    }
}

/// Extracts the estimate from a model reply.
///
/// The model is asked for a bare JSON object but sometimes wraps it in a
/// code fence or adds a sentence around it, so the outermost `{...}` is used.
/// Negative numbers are clamped to zero.
pub fn parse_food_estimate(reply: &str) -> Option<FoodEstimate> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end <= start {
        return None;
    }

    let raw: RawEstimate = serde_json::from_str(&reply[start..=end]).ok()?;
    let description = raw.description.trim().to_string();
    if description.is_empty() {
        return None;
    }
    Some(FoodEstimate {
        description,
        calories: raw.calories.max(0.0).round() as i64,
        protein: raw.protein.max(0.0),
        carbs: raw.carbs.max(0.0),
        fat: raw.fat.max(0.0),
    })
}

/// Wire shape of the reply; models emit `"calories": 312.5` as often as `312`.
#[derive(Deserialize)]
struct RawEstimate {
    description: String,
    #[serde(default)]
    calories: f64,
    #[serde(default)]
    protein: f64,
    #[serde(default)]
    carbs: f64,
    #[serde(default)]
    fat: f64,
}

pub fn format_entry(estimate: &FoodEstimate) -> String {
    format!(
        "🍽 {}\n🔥 {} kcal · P {:.0} g · C {:.0} g · F {:.0} g",
        estimate.description, estimate.calories, estimate.protein, estimate.carbs, estimate.fat
    )
}

pub fn format_totals(totals: &DailyTotals) -> String {
    if totals.entries == 0 {
        return "📒 Nothing logged today yet.".to_string();
    }
    format!(
        "📒 Today: {} entr{}\n🔥 {} kcal\n🥩 Protein: {:.0} g\n🍞 Carbs: {:.0} g\n🥑 Fat: {:.0} g",
        totals.entries,
        if totals.entries == 1 { "y" } else { "ies" },
        totals.calories,
        totals.protein,
        totals.carbs,
        totals.fat
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let reply = r#"{"description":"Oatmeal with berries","calories":320,"protein":11,"carbs":54,"fat":7.5}"#;
        let estimate = parse_food_estimate(reply).unwrap();
        assert_eq!(estimate.description, "Oatmeal with berries");
        assert_eq!(estimate.calories, 320);
        assert_eq!(estimate.fat, 7.5);
    }

    #[test]
    fn parses_fenced_json_with_prose() {
        let reply = "Here you go:\n```json\n{\"description\": \"2 eggs\", \"calories\": 156, \"protein\": 12.6, \"carbs\": 1.1, \"fat\": 10.6}\n```\nEnjoy!";
        let estimate = parse_food_estimate(reply).unwrap();
        assert_eq!(estimate.description, "2 eggs");
        assert_eq!(estimate.calories, 156);
    }

    #[test]
    fn fractional_calories_are_rounded() {
        let estimate = parse_food_estimate(r#"{"description":"banana","calories":104.6,"carbs":27}"#).unwrap();
        assert_eq!(estimate.calories, 105);
        assert_eq!(estimate.carbs, 27.0);
    }

    #[test]
    fn missing_macros_default_to_zero_and_negatives_clamp() {
        let estimate = parse_food_estimate(r#"{"description":"black coffee","calories":-5}"#).unwrap();
        assert_eq!(estimate.calories, 0);
        assert_eq!(estimate.protein, 0.0);
    }

    #[test]
    fn rejects_replies_without_an_object() {
        assert!(parse_food_estimate("I can't estimate that").is_none());
        assert!(parse_food_estimate("} nope {").is_none());
        assert!(parse_food_estimate(r#"{"description":"  ","calories":10}"#).is_none());
    }

    #[test]
    fn totals_sum_entries() {
        let entries = [
            FoodEstimate {
                description: "a".into(),
                calories: 100,
                protein: 5.0,
                carbs: 10.0,
                fat: 2.0,
            },
            FoodEstimate {
                description: "b".into(),
                calories: 250,
                protein: 20.0,
                carbs: 0.0,
                fat: 15.0,
            },
        ];
        let totals = DailyTotals::from_entries(&entries);
        assert_eq!(totals.entries, 2);
        assert_eq!(totals.calories, 350);
        assert_eq!(totals.protein, 25.0);
        assert!(format_totals(&totals).contains("2 entries"));
    }

    #[test]
    fn empty_day_has_friendly_text() {
        assert!(format_totals(&DailyTotals::default()).contains("Nothing logged"));
    }
}
