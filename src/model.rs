use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a price crossing, relative to the target price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCondition {
    Above,
    Below,
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
        }
    }
}

/// One user-defined threshold rule.
///
/// Field names in the persisted JSON document are camelCase (`targetPrice`,
/// `isActive`, ...); timestamps are RFC 3339 strings on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceAlert {
    pub id: String,
    pub symbol: String,
    pub target_price: f64,
    pub condition: AlertCondition,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
}

impl PriceAlert {
    /// Whether this alert is eligible for evaluation.
    pub fn is_armable(&self) -> bool {
        self.is_active && !self.triggered
    }

    /// Whether `price` satisfies the rule's directional inequality.
    ///
    /// Comparisons are inclusive: a sample that lands exactly on the target
    /// counts as a crossing.
    pub fn crossed(&self, price: f64) -> bool {
        match self.condition {
            AlertCondition::Above => price >= self.target_price,
            AlertCondition::Below => price <= self.target_price,
        }
    }
}
