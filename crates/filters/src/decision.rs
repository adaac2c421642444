//! Decision and assessment types shared by every filter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use rapidsift_core::Document;

/// Outcome variant of a filter evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterResult {
    Keep,
    Reject,
    /// Keep, but with modified content
    Sanitize,
    /// Neutral: the filter could not evaluate the document
    #[default]
    Unknown,
}

/// Closed set of rejection/action reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    TooShort,
    TooLong,
    Gibberish,
    HighRepetition,
    Boilerplate,
    PoorFormatting,
    SuspiciousUrl,
    BlockedDomain,
    ToxicityHigh,
    HateSpeech,
    NsfwContent,
    PiiDetected,
    PrivacyViolation,
    Contamination,
    LicenseInvalid,
    MachineGenerated,
    Custom,
}

impl RejectReason {
    /// Stable string form used in statistics exports
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TooShort => "too_short",
            RejectReason::TooLong => "too_long",
            RejectReason::Gibberish => "gibberish",
            RejectReason::HighRepetition => "high_repetition",
            RejectReason::Boilerplate => "boilerplate",
            RejectReason::PoorFormatting => "poor_formatting",
            RejectReason::SuspiciousUrl => "suspicious_url",
            RejectReason::BlockedDomain => "blocked_domain",
            RejectReason::ToxicityHigh => "toxicity_high",
            RejectReason::HateSpeech => "hate_speech",
            RejectReason::NsfwContent => "nsfw_content",
            RejectReason::PiiDetected => "pii_detected",
            RejectReason::PrivacyViolation => "privacy_violation",
            RejectReason::Contamination => "contamination",
            RejectReason::LicenseInvalid => "license_invalid",
            RejectReason::MachineGenerated => "machine_generated",
            RejectReason::Custom => "custom",
        }
    }
}

/// Toxicity categories scored by the toxicity filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToxicityCategory {
    HateSpeech,
    Harassment,
    Profanity,
    Violence,
    NsfwSexual,
    NsfwGore,
    Threat,
    Spam,
}

impl ToxicityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToxicityCategory::HateSpeech => "hate_speech",
            ToxicityCategory::Harassment => "harassment",
            ToxicityCategory::Profanity => "profanity",
            ToxicityCategory::Violence => "violence",
            ToxicityCategory::NsfwSexual => "nsfw_sexual",
            ToxicityCategory::NsfwGore => "nsfw_gore",
            ToxicityCategory::Threat => "threat",
            ToxicityCategory::Spam => "spam",
        }
    }
}

/// PII kinds detected by the PII filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Email,
    Phone,
    Ssn,
    CreditCard,
    IpAddress,
    PhysicalAddress,
    PersonName,
    Custom,
}

impl PiiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiType::Email => "email",
            PiiType::Phone => "phone",
            PiiType::Ssn => "ssn",
            PiiType::CreditCard => "credit_card",
            PiiType::IpAddress => "ip_address",
            PiiType::PhysicalAddress => "physical_address",
            PiiType::PersonName => "person_name",
            PiiType::Custom => "custom",
        }
    }

    /// Placeholder inserted when sanitizing
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiType::Email => "[EMAIL]",
            PiiType::Phone => "[PHONE]",
            PiiType::Ssn => "[SSN]",
            PiiType::CreditCard => "[CREDIT_CARD]",
            PiiType::IpAddress => "[IP_ADDRESS]",
            PiiType::PhysicalAddress => "[ADDRESS]",
            PiiType::PersonName => "[PERSON]",
            PiiType::Custom => "[REDACTED]",
        }
    }
}

/// Output of one filter for one document
#[derive(Debug, Clone, Default)]
pub struct FilterDecision {
    pub result: FilterResult,
    pub reason: Option<RejectReason>,
    /// Confidence in the decision, in [0, 1]
    pub confidence: f64,
    pub details: String,
    /// Named numeric features computed during evaluation
    pub metrics: HashMap<String, f64>,
    pub toxicity_categories: Vec<ToxicityCategory>,
    pub pii_types: Vec<PiiType>,
    /// Cleaned text for `Sanitize` results
    pub sanitized_text: Option<String>,
    /// Human-readable descriptors of removed content
    pub removed_elements: Vec<String>,
}

impl FilterDecision {
    pub fn keep(confidence: f64, details: impl Into<String>) -> Self {
        Self {
            result: FilterResult::Keep,
            confidence: confidence.clamp(0.0, 1.0),
            details: details.into(),
            ..Default::default()
        }
    }

    pub fn reject(reason: RejectReason, confidence: f64, details: impl Into<String>) -> Self {
        Self {
            result: FilterResult::Reject,
            reason: Some(reason),
            confidence: confidence.clamp(0.0, 1.0),
            details: details.into(),
            ..Default::default()
        }
    }

    pub fn sanitize(
        sanitized_text: String,
        removed_elements: Vec<String>,
        confidence: f64,
        details: impl Into<String>,
    ) -> Self {
        Self {
            result: FilterResult::Sanitize,
            confidence: confidence.clamp(0.0, 1.0),
            details: details.into(),
            sanitized_text: Some(sanitized_text),
            removed_elements,
            ..Default::default()
        }
    }

    /// Neutral decision mapped from a non-fatal filter error
    pub fn unknown(details: impl Into<String>) -> Self {
        Self {
            result: FilterResult::Unknown,
            confidence: 0.0,
            details: details.into(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn is_reject(&self) -> bool {
        self.result == FilterResult::Reject
    }
}

/// Aggregate output of the orchestrator for one document
#[derive(Debug, Clone)]
pub struct Assessment {
    pub document: Document,
    /// Per-filter decisions in evaluation order, tagged with the filter name
    pub decisions: Vec<(String, FilterDecision)>,
    pub final_result: FilterResult,
    /// Overall quality/safety score in [0, 1]
    pub overall_score: f64,
    /// Final sanitized text when any filter sanitized
    pub final_sanitized_text: Option<String>,
    pub feature_scores: HashMap<String, f64>,
}

impl Assessment {
    /// The text that should be emitted for this document
    pub fn output_text(&self) -> &str {
        self.final_sanitized_text
            .as_deref()
            .unwrap_or(&self.document.text)
    }

    /// First rejection reason, when rejected
    pub fn rejection_reason(&self) -> Option<RejectReason> {
        self.decisions
            .iter()
            .find(|(_, d)| d.is_reject())
            .and_then(|(_, d)| d.reason)
    }
}
