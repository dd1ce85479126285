//! Financial profile intake
//!
//! The profile is filled in field by field, then flattened into a plain-text
//! summary. Only the summary travels on to the advisor; the structured
//! profile is uploaded once to the profile store and otherwise discarded.

use reqwest::Client;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{TransportError, ValidationError};
use crate::http::{ensure_success, join_url};

pub const EXPENSE_CATEGORIES: [&str; 5] =
    ["rent", "groceries", "utilities", "entertainment", "miscellaneous"];

pub const INVESTMENT_OPTIONS: [&str; 7] = [
    "Stocks",
    "Real Estate",
    "Gold",
    "Mutual Funds",
    "Crypto",
    "Fixed Deposits",
    "Bonds",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RiskTolerance {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTolerance::Low => "Low",
            RiskTolerance::Medium => "Medium",
            RiskTolerance::High => "High",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            RiskTolerance::Low => RiskTolerance::Medium,
            RiskTolerance::Medium => RiskTolerance::High,
            RiskTolerance::High => RiskTolerance::Low,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            RiskTolerance::Low => RiskTolerance::High,
            RiskTolerance::Medium => RiskTolerance::Low,
            RiskTolerance::High => RiskTolerance::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifeGoal {
    pub name: String,
    #[serde(rename = "timeline")]
    pub timeline_years: u32,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    pub amount: f64,
    pub interest_rate: f64,
    #[serde(rename = "tenure")]
    pub tenure_years: u32,
}

/// Expense amounts by category, kept in entry order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expenses(Vec<(String, f64)>);

impl Expenses {
    /// The standard categories, all zero
    pub fn standard() -> Self {
        Self(
            EXPENSE_CATEGORIES
                .iter()
                .map(|c| (c.to_string(), 0.0))
                .collect(),
        )
    }

    pub fn set(&mut self, category: &str, amount: f64) {
        match self.0.iter_mut().find(|(c, _)| c == category) {
            Some(entry) => entry.1 = amount,
            None => self.0.push((category.to_string(), amount)),
        }
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.iter().find(|(c, _)| c == category).map(|(_, a)| *a)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(c, a)| (c.as_str(), *a))
    }
}

impl Serialize for Expenses {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, amount) in &self.0 {
            map.serialize_entry(category, amount)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub monthly_salary: f64,
    pub expenses: Expenses,
    pub life_goals: Vec<LifeGoal>,
    pub risk_tolerance: RiskTolerance,
    pub investment_preferences: Vec<String>,
    pub debt: Debt,
}

impl Default for FinancialProfile {
    fn default() -> Self {
        Self {
            monthly_salary: 0.0,
            expenses: Expenses::standard(),
            life_goals: Vec::new(),
            risk_tolerance: RiskTolerance::default(),
            investment_preferences: Vec::new(),
            debt: Debt::default(),
        }
    }
}

impl FinancialProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a goal; all three parts are required.
    pub fn add_goal(
        &mut self,
        name: &str,
        timeline_years: u32,
        cost: f64,
    ) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() || timeline_years == 0 || cost <= 0.0 {
            return Err(ValidationError::IncompleteGoal);
        }
        self.life_goals.push(LifeGoal {
            name: name.to_string(),
            timeline_years,
            cost,
        });
        Ok(())
    }

    pub fn remove_goal(&mut self, index: usize) -> Option<LifeGoal> {
        (index < self.life_goals.len()).then(|| self.life_goals.remove(index))
    }

    /// Add the preference if absent, remove it if present. Returns whether
    /// it is now selected.
    pub fn toggle_preference(&mut self, preference: &str) -> bool {
        if let Some(pos) = self
            .investment_preferences
            .iter()
            .position(|p| p == preference)
        {
            self.investment_preferences.remove(pos);
            false
        } else {
            self.investment_preferences.push(preference.to_string());
            true
        }
    }

    pub fn has_preference(&self, preference: &str) -> bool {
        self.investment_preferences.iter().any(|p| p == preference)
    }

    /// Flatten the profile into the text the advisor backend receives.
    pub fn summary(&self) -> String {
        let expenses = self
            .expenses
            .iter()
            .map(|(category, amount)| format!("{}: ₹{}", category, amount))
            .collect::<Vec<_>>()
            .join(", ");

        let goals = self
            .life_goals
            .iter()
            .map(|goal| {
                format!(
                    "{} (Timeline: {} years, Cost: ₹{})",
                    goal.name, goal.timeline_years, goal.cost
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        [
            format!("My monthly salary is ₹{}.", self.monthly_salary),
            format!("My monthly expenses are: {}.", expenses),
            format!("My life goals are: {}.", goals),
            format!("My risk tolerance is {}.", self.risk_tolerance.as_str()),
            format!(
                "My investment preferences are: {}.",
                self.investment_preferences.join(", ")
            ),
            format!(
                "My debt details are: Amount: ₹{}, Interest Rate: {}%, Tenure: {} years.",
                self.debt.amount, self.debt.interest_rate, self.debt.tenure_years
            ),
        ]
        .join("\n")
    }
}

/// Parse a money or rate field. Blank means zero.
pub fn parse_amount(field: &str, input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    match trimmed.replace(',', "").parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(ValidationError::InvalidNumber {
            field: field.to_string(),
            value: input.to_string(),
        }),
    }
}

/// Parse a whole number of years. Blank means zero.
pub fn parse_years(field: &str, input: &str) -> Result<u32, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidNumber {
            field: field.to_string(),
            value: input.to_string(),
        })
}

#[derive(Serialize)]
struct ProfileUpdate<'a> {
    body: &'a FinancialProfile,
}

/// Uploads the structured profile to the profile store
#[derive(Clone)]
pub struct ProfileSync {
    client: Client,
    base_url: String,
}

impl ProfileSync {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    pub async fn upload(&self, profile: &FinancialProfile) -> Result<(), TransportError> {
        let url = join_url(&self.base_url, "db/update");
        let response = self
            .client
            .post(&url)
            .json(&ProfileUpdate { body: profile })
            .send()
            .await?;
        ensure_success(response, "profile update").await?;
        Ok(())
    }

    /// Fire-and-forget upload; failures are only logged.
    pub fn upload_in_background(&self, profile: FinancialProfile) -> JoinHandle<()> {
        let sync = self.clone();
        tokio::spawn(async move {
            match sync.upload(&profile).await {
                Ok(()) => info!("Financial profile uploaded"),
                Err(e) => warn!("Failed to upload financial profile: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_matches_reference_scenario() {
        let mut profile = FinancialProfile {
            monthly_salary: 50000.0,
            expenses: Expenses::default(),
            ..FinancialProfile::default()
        };
        profile.add_goal("House", 5, 2_000_000.0).unwrap();

        let summary = profile.summary();

        assert!(summary.contains("My monthly salary is ₹50000."));
        assert!(summary.contains("House (Timeline: 5 years, Cost: ₹2000000)"));
        assert!(summary.contains("My monthly expenses are: ."));
        assert!(summary.contains("My risk tolerance is Medium."));
    }

    #[test]
    fn test_summary_lists_expenses_in_entry_order() {
        let mut profile = FinancialProfile::new();
        profile.expenses.set("rent", 15000.0);
        profile.expenses.set("groceries", 6000.5);
        profile.toggle_preference("Gold");
        profile.toggle_preference("Stocks");
        profile.debt = Debt {
            amount: 300000.0,
            interest_rate: 8.5,
            tenure_years: 3,
        };

        let lines: Vec<String> = profile.summary().lines().map(String::from).collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[1],
            "My monthly expenses are: rent: ₹15000, groceries: ₹6000.5, utilities: ₹0, \
             entertainment: ₹0, miscellaneous: ₹0."
        );
        assert_eq!(lines[4], "My investment preferences are: Gold, Stocks.");
        assert_eq!(
            lines[5],
            "My debt details are: Amount: ₹300000, Interest Rate: 8.5%, Tenure: 3 years."
        );
    }

    #[test]
    fn test_incomplete_goal_rejected() {
        let mut profile = FinancialProfile::new();
        assert_eq!(
            profile.add_goal("", 5, 100.0),
            Err(ValidationError::IncompleteGoal)
        );
        assert_eq!(
            profile.add_goal("Car", 0, 100.0),
            Err(ValidationError::IncompleteGoal)
        );
        assert_eq!(
            profile.add_goal("Car", 3, 0.0),
            Err(ValidationError::IncompleteGoal)
        );
        assert!(profile.life_goals.is_empty());
    }

    #[test]
    fn test_toggle_preference_keeps_uniqueness() {
        let mut profile = FinancialProfile::new();
        assert!(profile.toggle_preference("Crypto"));
        assert!(profile.has_preference("Crypto"));
        assert!(!profile.toggle_preference("Crypto"));
        assert!(profile.investment_preferences.is_empty());
    }

    #[test]
    fn test_remove_goal_out_of_range() {
        let mut profile = FinancialProfile::new();
        profile.add_goal("Trip", 1, 50000.0).unwrap();
        assert!(profile.remove_goal(3).is_none());
        assert_eq!(profile.remove_goal(0).map(|g| g.name), Some("Trip".to_string()));
    }

    #[test]
    fn test_wire_format_uses_form_field_names() {
        let mut profile = FinancialProfile::new();
        profile.add_goal("House", 5, 2_000_000.0).unwrap();
        let body = serde_json::to_value(ProfileUpdate { body: &profile }).unwrap();

        assert_eq!(body["body"]["monthlySalary"], 0.0);
        assert_eq!(body["body"]["riskTolerance"], "Medium");
        assert_eq!(body["body"]["lifeGoals"][0]["timeline"], 5);
        assert_eq!(body["body"]["debt"]["tenure"], 0);
        assert_eq!(body["body"]["debt"]["interestRate"], 0.0);
        let categories: Vec<&String> = body["body"]["expenses"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(
            categories,
            ["rent", "groceries", "utilities", "entertainment", "miscellaneous"]
        );
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("salary", ""), Ok(0.0));
        assert_eq!(parse_amount("salary", "50,000"), Ok(50000.0));
        assert!(parse_amount("salary", "-5").is_err());
        assert!(parse_amount("salary", "lots").is_err());
        assert_eq!(parse_years("tenure", " 7 "), Ok(7));
        assert!(parse_years("tenure", "2.5").is_err());
    }
}
