//! Diagnostic labels and the free-text decision rule.
//!
//! A model response is mapped onto a label by checking a fixed, ordered list of
//! substring tokens. The first token in priority order that occurs anywhere in
//! the response wins, regardless of where it appears in the text. Responses
//! frequently mention a label they are ruling out, so the order is part of the
//! decision rule and must not be changed.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::SchemaMode;

/// Diagnostic category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "MCI")]
    Mci,
    #[serde(rename = "NC")]
    Nc,
    #[serde(rename = "DM")]
    Dm,
    #[serde(rename = "CI")]
    Ci,
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mci => "MCI",
            Self::Nc => "NC",
            Self::Dm => "DM",
            Self::Ci => "CI",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a ground-truth label. `Unknown` is only ever a prediction.
    pub fn parse_reference(s: &str) -> Option<Self> {
        match s.trim() {
            "MCI" => Some(Self::Mci),
            "NC" => Some(Self::Nc),
            "DM" => Some(Self::Dm),
            "CI" => Some(Self::Ci),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the decoder's rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecodeRule {
    token: &'static str,
    label: Label,
}

const TWO_CLASS_RULES: &[DecodeRule] = &[
    DecodeRule { token: "MCI", label: Label::Mci },
    DecodeRule { token: "NC", label: Label::Nc },
];

const EXTENDED_RULES: &[DecodeRule] = &[
    DecodeRule { token: "MCI", label: Label::Mci },
    DecodeRule { token: "NC", label: Label::Nc },
    DecodeRule { token: "DM", label: Label::Dm },
    DecodeRule { token: "CI", label: Label::Ci },
];

/// Maps a raw response onto a [`Label`]
#[derive(Debug, Clone, Copy)]
pub struct LabelDecoder {
    rules: &'static [DecodeRule],
}

impl LabelDecoder {
    /// Decoder for the given schema: the MCI/NC run checks only its two tokens,
    /// every other schema uses the extended table.
    pub fn for_schema(mode: SchemaMode) -> Self {
        match mode {
            SchemaMode::TwoClassMciNc => Self {
                rules: TWO_CLASS_RULES,
            },
            _ => Self {
                rules: EXTENDED_RULES,
            },
        }
    }

    /// Case-sensitive; first rule in table order wins.
    pub fn decode(&self, response: &str) -> Label {
        self.rules
            .iter()
            .find(|rule| response.contains(rule.token))
            .map(|rule| rule.label)
            .unwrap_or(Label::Unknown)
    }
}
