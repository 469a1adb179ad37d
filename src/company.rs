//! Company profile exchanged by `classify`, `crawl`, and the public API.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    /// ISO 3166-1 alpha-2.
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

/// Everything known about a company. Every field is optional; `scopes`
/// holds NACE class codes once the classifier has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub website: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub industries: Option<Vec<String>>,
    pub address: Option<Address>,
    pub principal_person: Option<String>,
    pub principal_designation: Option<String>,
    pub objectives: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub number_of_employees: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub country: Option<String>,
}

impl CompanyProfile {
    pub fn industry_list(&self) -> &[String] {
        self.industries.as_deref().unwrap_or_default()
    }
}

// Models answer "50-100" as often as 75.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
