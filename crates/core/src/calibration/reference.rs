//! Known reference objects and their standard dimensions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel `reference_object` value selecting an explicit width/height pair.
pub const CUSTOM_REFERENCE: &str = "custom";

/// A reference object with published dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceObject {
    #[serde(rename = "a4_paper")]
    A4Paper,
    #[serde(rename = "letter_paper")]
    LetterPaper,
    #[serde(rename = "credit_card")]
    CreditCard,
    #[serde(rename = "dollar_bill")]
    DollarBill,
    #[serde(rename = "euro_bill")]
    EuroBill,
    #[serde(rename = "30cm_ruler")]
    Ruler30Cm,
}

impl ReferenceObject {
    pub const ALL: [ReferenceObject; 6] = [
        Self::A4Paper,
        Self::LetterPaper,
        Self::CreditCard,
        Self::DollarBill,
        Self::EuroBill,
        Self::Ruler30Cm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A4Paper => "a4_paper",
            Self::LetterPaper => "letter_paper",
            Self::CreditCard => "credit_card",
            Self::DollarBill => "dollar_bill",
            Self::EuroBill => "euro_bill",
            Self::Ruler30Cm => "30cm_ruler",
        }
    }

    /// `(width, height)` in centimeters.
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            Self::A4Paper => (21.0, 29.7),
            Self::LetterPaper => (21.59, 27.94),
            Self::CreditCard => (8.56, 5.4),
            Self::DollarBill => (15.6, 6.6),
            Self::EuroBill => (12.0, 6.2),
            Self::Ruler30Cm => (30.0, 3.0),
        }
    }
}

impl fmt::Display for ReferenceObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceObject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|obj| obj.as_str() == s)
            .ok_or_else(|| format!("Unknown reference object '{s}'"))
    }
}

/// What the request asked for in `reference_object`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceChoice {
    Known(ReferenceObject),
    Custom,
}

impl FromStr for ReferenceChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == CUSTOM_REFERENCE {
            return Ok(Self::Custom);
        }
        s.parse().map(Self::Known)
    }
}

/// Comma-separated list of accepted `reference_object` values, for messages.
pub fn accepted_reference_values() -> String {
    ReferenceObject::ALL
        .iter()
        .map(|obj| obj.as_str())
        .chain(std::iter::once(CUSTOM_REFERENCE))
        .collect::<Vec<_>>()
        .join(", ")
}
