//! Structured findings extracted from scanner output

use serde::{Deserialize, Serialize};

/// One detected condition.
///
/// `category` is serialized as `type` to match the vocabulary scanners use
/// in their own reports ("boolean-based blind", "DBMS", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// Deduplication key of a finding.
///
/// Parameterised findings are keyed by `(parameter, category)`. Findings with
/// no parameter also carry their detail, so distinct facts of the same
/// category survive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FindingKey {
    parameter: Option<String>,
    category: String,
    detail: Option<String>,
}

impl Finding {
    /// A finding from a structured injection block
    pub fn injection(
        parameter: impl Into<String>,
        category: impl Into<String>,
        title: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            parameter: Some(parameter.into()),
            category: category.into(),
            detail: title.clone(),
            title: Some(title),
            payload: Some(payload.into()),
        }
    }

    /// A finding attached to a parameter without title or payload
    pub fn for_parameter(
        parameter: impl Into<String>,
        category: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            parameter: Some(parameter.into()),
            category: category.into(),
            title: None,
            payload: None,
            detail: detail.into(),
        }
    }

    /// A finding that is not tied to any parameter
    pub fn fact(category: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            parameter: None,
            category: category.into(),
            title: None,
            payload: None,
            detail: detail.into(),
        }
    }

    /// Key used to drop repeated reports of the same condition
    pub fn key(&self) -> FindingKey {
        FindingKey {
            parameter: self.parameter.clone(),
            category: self.category.clone(),
            detail: self.parameter.is_none().then(|| self.detail.clone()),
        }
    }
}
