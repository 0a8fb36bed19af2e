//! Shared primitive types used across the pipeline.

use serde::{Deserialize, Serialize};

/// Stable identifier of an insurance contract.
pub type ContractId = String;

/// Stable identifier of a client.
pub type ClientId = String;

/// Binary churn label: 1 = cancelled, 0 = not cancelled.
pub type Label = u8;

/// Which contracts a pipeline run pulls from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
    /// Every contract regardless of status (training).
    All,
    /// Only contracts still in force (inference).
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Cancelled,
    Ended,
}

impl ContractStatus {
    /// Parse the status text stored in the source.
    /// Accepts the Portuguese labels the source writes and their English forms.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Ativo" | "Active" => Some(Self::Active),
            "Cancelado" | "Cancelled" | "Canceled" => Some(Self::Cancelled),
            "Encerrado" | "Ended" => Some(Self::Ended),
            _ => None,
        }
    }

    /// The label as written in the source.
    pub fn as_source_str(&self) -> &'static str {
        match self {
            Self::Active    => "Ativo",
            Self::Cancelled => "Cancelado",
            Self::Ended     => "Encerrado",
        }
    }

    pub fn label(&self) -> Label {
        match self {
            Self::Cancelled => 1,
            Self::Active | Self::Ended => 0,
        }
    }
}
