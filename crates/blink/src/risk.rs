//! Risk banding of a completed blink session
//!
//! Fixed thresholds, deliberately uncalibrated to patient demographics.

use serde::{Deserialize, Serialize};

/// Ordinal risk band for a final blink count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Normal,
    SlightChange,
    HighChance,
}

impl RiskLevel {
    /// Band for a session's final blink total
    pub fn from_blink_count(count: u32) -> Self {
        if count >= 8 {
            RiskLevel::Normal
        } else if count >= 5 {
            RiskLevel::SlightChange
        } else {
            RiskLevel::HighChance
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "NORMAL",
            RiskLevel::SlightChange => "SLIGHT CHANGE",
            RiskLevel::HighChance => "HIGH CHANCE",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "Low risk",
            RiskLevel::SlightChange => "Moderate risk - Consider monitoring",
            RiskLevel::HighChance => "Higher risk - Recommend consultation",
        }
    }
}

/// Final verdict returned when a session is stopped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub blink_count: u32,
    pub risk_level: String,
    pub risk_message: String,
    pub completed: bool,
}

impl RiskVerdict {
    pub fn from_blink_count(count: u32) -> Self {
        let level = RiskLevel::from_blink_count(count);
        Self {
            blink_count: count,
            risk_level: level.as_str().to_string(),
            risk_message: level.message().to_string(),
            completed: true,
        }
    }
}
