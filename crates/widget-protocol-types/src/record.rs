//! Persisted widget record.

use crate::Message;
use serde::{Deserialize, Serialize};

/// Which input the widget collects while unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStep {
    /// Waiting for a country to be picked.
    #[default]
    Country,
    /// Country chosen, waiting for the local number.
    Phone,
}

/// Session continuity record, written on every state change.
///
/// Field names match the JSON shape `{isAuthenticated, phoneNumber,
/// selectedCountryCode, authStep, messages}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetRecord {
    pub is_authenticated: bool,
    pub phone_number: String,
    pub selected_country_code: String,
    pub auth_step: AuthStep,
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_camel_case_keys() {
        let record = WidgetRecord {
            is_authenticated: true,
            phone_number: "+15551234567".to_string(),
            selected_country_code: "+1".to_string(),
            auth_step: AuthStep::Phone,
            messages: vec![Message::bot("Welcome! Please select your country code:")],
        };

        let value: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["isAuthenticated"], true);
        assert_eq!(value["phoneNumber"], "+15551234567");
        assert_eq!(value["selectedCountryCode"], "+1");
        assert_eq!(value["authStep"], "phone");
        assert_eq!(value["messages"][0]["sender"], "bot");
    }

    #[test]
    fn record_tolerates_missing_fields() {
        let record: WidgetRecord = serde_json::from_str(r#"{"isAuthenticated": false}"#).unwrap();
        assert_eq!(record, WidgetRecord::default());
        assert_eq!(record.auth_step, AuthStep::Country);
    }
}
