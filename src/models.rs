//! Core data models for the chat cascade

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ErrorClass;

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

//
// ================= Personas =================
//

/// Behavioral profile shaping the system prompt and provider preselection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Banking specialist: accounts, fees, cards, transfers
    Pepper,
    /// Budget coach
    Penny,
    /// Savings and investing guide
    Sprout,
    /// Financial educator
    Sage,
    /// Crypto and payments assistant
    Bitsy,
    /// Income-growth specialist
    Hustle,
}

impl Persona {
    pub const ALL: [Persona; 6] = [
        Persona::Pepper,
        Persona::Penny,
        Persona::Sprout,
        Persona::Sage,
        Persona::Bitsy,
        Persona::Hustle,
    ];

    /// Lenient lookup; unknown keys are treated as "no persona".
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "pepper" => Some(Persona::Pepper),
            "penny" => Some(Persona::Penny),
            "sprout" => Some(Persona::Sprout),
            "sage" => Some(Persona::Sage),
            "bitsy" => Some(Persona::Bitsy),
            "hustle" => Some(Persona::Hustle),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Persona::Pepper => "pepper",
            Persona::Penny => "penny",
            Persona::Sprout => "sprout",
            Persona::Sage => "sage",
            Persona::Bitsy => "bitsy",
            Persona::Hustle => "hustle",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Persona::Pepper => "Pepper (banking specialist)",
            Persona::Penny => "Penny (budget coach)",
            Persona::Sprout => "Sprout (savings & investing guide)",
            Persona::Sage => "Sage (financial educator)",
            Persona::Bitsy => "Bitsy (crypto & payments assistant)",
            Persona::Hustle => "Hustle (income-growth specialist)",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Context =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub description: String,
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalProgress {
    pub name: String,
    pub current: f64,
    pub target: f64,
}

impl GoalProgress {
    pub fn percent(&self) -> f64 {
        if self.target <= 0.0 {
            return 0.0;
        }
        (self.current / self.target * 100.0).clamp(0.0, 100.0)
    }
}

/// Per-call context supplied by the caller; the engine keeps no copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub recent_expenses: Vec<Expense>,
    #[serde(default)]
    pub goals: Vec<GoalProgress>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub data_sharing_consent: Option<bool>,
}

impl ChatContext {
    pub fn has_financial_snapshot(&self) -> bool {
        self.balance.is_some() || !self.recent_expenses.is_empty() || !self.goals.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub persona: Option<Persona>,
    pub temperature: Option<f32>,
    /// Aborts the whole cascade once elapsed; per-provider timeouts still apply.
    pub deadline: Option<Duration>,
}

impl SendOptions {
    pub fn with_persona(persona: Persona) -> Self {
        Self {
            persona: Some(persona),
            ..Default::default()
        }
    }
}

//
// ================= Normalized Response =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateBudget,
    SetGoal,
    TrackExpense,
    LearnMore,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionHint {
    #[serde(rename = "type")]
    pub action: ActionType,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub request_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub attempted_providers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
}

/// The single response contract returned for every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResponse {
    pub message: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_hint: Option<ActionHint>,
    pub provider_label: String,
    pub confidence: f32,
    pub metadata: ResponseMetadata,
}

impl NormalizedResponse {
    pub fn is_success(&self) -> bool {
        self.metadata.provider.is_some()
    }
}
