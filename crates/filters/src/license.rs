//! License and copyright compliance filtering
//!
//! Detects license declarations, copyright notices, and paywalls, and
//! honors publisher opt-out and per-document removal requests. Opt-outs
//! reject unconditionally regardless of any other signal.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::Document;

/// License families detectable from text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    Unknown,
    PublicDomain,
    Cc0,
    CcBy,
    CcBySa,
    CcByNc,
    CcByNd,
    Mit,
    Apache2,
    GplV2,
    GplV3,
    Bsd2Clause,
    Bsd3Clause,
}

impl LicenseType {
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            LicenseType::PublicDomain
                | LicenseType::Cc0
                | LicenseType::CcBy
                | LicenseType::CcBySa
                | LicenseType::Mit
                | LicenseType::Apache2
                | LicenseType::Bsd2Clause
                | LicenseType::Bsd3Clause
        )
    }
}

const PAYWALL_KEYWORDS: &[&str] = &["subscribe", "paywall", "premium content", "members only"];

const COPYRIGHT_MARKERS: &[&str] = &["copyright", "\u{a9}", "(c)", "all rights reserved"];

/// Configuration for the license filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseFilterConfig {
    /// When non-empty, only these domains are admitted
    pub allowed_domains: HashSet<String>,
    pub blocked_domains: HashSet<String>,
    pub paywalled_domains: HashSet<String>,
    pub allowed_licenses: HashSet<LicenseType>,
    /// Reject unknown licenses and low-confidence assessments
    pub strict_mode: bool,
    pub confidence_threshold: f64,
}

impl Default for LicenseFilterConfig {
    fn default() -> Self {
        let allowed_licenses = [
            LicenseType::PublicDomain,
            LicenseType::Cc0,
            LicenseType::CcBy,
            LicenseType::CcBySa,
            LicenseType::Mit,
            LicenseType::Apache2,
            LicenseType::Bsd2Clause,
            LicenseType::Bsd3Clause,
        ]
        .into_iter()
        .collect();
        Self {
            allowed_domains: HashSet::new(),
            blocked_domains: HashSet::new(),
            paywalled_domains: HashSet::new(),
            allowed_licenses,
            strict_mode: false,
            confidence_threshold: 0.7,
        }
    }
}

/// Copyright assessment for one document
#[derive(Debug, Clone)]
pub struct CopyrightAssessment {
    pub detected_license: LicenseType,
    pub has_copyright_notice: bool,
    pub is_paywalled: bool,
    pub is_from_allowed_domain: bool,
    pub compliance_confidence: f64,
}

/// License compliance filter
#[derive(Debug, Default)]
pub struct LicenseFilter {
    config: LicenseFilterConfig,
    /// domain -> reason
    opted_out_domains: HashMap<String, String>,
    /// document ids with removal requests
    removal_requests: HashSet<String>,
}

impl LicenseFilter {
    pub fn new(config: LicenseFilterConfig) -> Self {
        Self {
            config,
            opted_out_domains: HashMap::new(),
            removal_requests: HashSet::new(),
        }
    }

    pub fn add_opt_out(&mut self, domain: impl Into<String>, reason: impl Into<String>) {
        self.opted_out_domains.insert(domain.into(), reason.into());
    }

    pub fn add_removal_request(&mut self, document_id: impl Into<String>) {
        self.removal_requests.insert(document_id.into());
    }

    /// Load opt-outs from `domain` or `domain<TAB>reason` lines.
    pub fn load_opt_out_lines<'a>(&mut self, lines: impl Iterator<Item = &'a str>) {
        for line in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('\t') {
                Some((domain, reason)) => self.add_opt_out(domain.trim(), reason.trim()),
                None => self.add_opt_out(line, "publisher opt-out"),
            }
        }
    }

    /// Keyword-based license detection over lowercased text.
    pub fn detect_license(text: &str) -> LicenseType {
        let lower = text.to_lowercase();

        if lower.contains("cc0") {
            return LicenseType::Cc0;
        }
        if lower.contains("public domain") {
            return LicenseType::PublicDomain;
        }
        if lower.contains("creative commons") || lower.contains("cc by") {
            if lower.contains("by-sa") || lower.contains("by sa") || lower.contains("sharealike") {
                return LicenseType::CcBySa;
            }
            if lower.contains("by-nc") || lower.contains("noncommercial") {
                return LicenseType::CcByNc;
            }
            if lower.contains("by-nd") || lower.contains("noderiv") {
                return LicenseType::CcByNd;
            }
            return LicenseType::CcBy;
        }
        if lower.contains("mit license") {
            return LicenseType::Mit;
        }
        if lower.contains("apache license") {
            return LicenseType::Apache2;
        }
        if lower.contains("gpl") {
            if lower.contains("gplv3") || lower.contains("gpl-3") || lower.contains("version 3") {
                return LicenseType::GplV3;
            }
            return LicenseType::GplV2;
        }
        if lower.contains("bsd") {
            if lower.contains("3-clause") || lower.contains("three clause") {
                return LicenseType::Bsd3Clause;
            }
            return LicenseType::Bsd2Clause;
        }
        LicenseType::Unknown
    }

    pub fn has_copyright_notice(text: &str) -> bool {
        let lower = text.to_lowercase();
        COPYRIGHT_MARKERS.iter().any(|m| lower.contains(m))
    }

    fn is_paywalled(&self, doc: &Document, domain: Option<&str>) -> bool {
        if let Some(domain) = domain {
            if self.config.paywalled_domains.contains(domain) {
                return true;
            }
        }
        let lower = doc.text.to_lowercase();
        PAYWALL_KEYWORDS.iter().any(|k| lower.contains(k))
    }

    /// Full copyright assessment for a document.
    pub fn assess(&self, doc: &Document) -> CopyrightAssessment {
        let domain = doc.effective_domain();
        let detected_license = Self::detect_license(&doc.text);
        let has_copyright_notice = Self::has_copyright_notice(&doc.text);
        let is_paywalled = self.is_paywalled(doc, domain.as_deref());
        let is_from_allowed_domain = domain
            .as_deref()
            .map(|d| self.config.allowed_domains.contains(d))
            .unwrap_or(false);

        let mut confidence: f64 = 0.5;
        if detected_license != LicenseType::Unknown {
            confidence += 0.3;
        }
        if is_from_allowed_domain {
            confidence += 0.2;
        }
        if has_copyright_notice && detected_license == LicenseType::Unknown {
            confidence -= 0.3;
        }
        if is_paywalled {
            confidence -= 0.4;
        }

        CopyrightAssessment {
            detected_license,
            has_copyright_notice,
            is_paywalled,
            is_from_allowed_domain,
            compliance_confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

impl Filter for LicenseFilter {
    fn name(&self) -> &str {
        "license"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        self.config = config.license.clone();
        self.config.strict_mode = self.config.strict_mode || config.strict_mode;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let domain = doc.effective_domain();

        if let Some(domain) = domain.as_deref() {
            if let Some(reason) = self.opted_out_domains.get(domain) {
                return FilterDecision::reject(
                    RejectReason::LicenseInvalid,
                    1.0,
                    format!("domain {domain} opted out: {reason}"),
                );
            }
        }
        if self.removal_requests.contains(&doc.id) {
            return FilterDecision::reject(
                RejectReason::LicenseInvalid,
                1.0,
                format!("removal requested for document {}", doc.id),
            );
        }

        let assessment = self.assess(doc);

        if !self.config.allowed_domains.is_empty() && !assessment.is_from_allowed_domain {
            return FilterDecision::reject(
                RejectReason::LicenseInvalid,
                0.8,
                "domain not on the allowlist",
            );
        }
        if let Some(domain) = domain.as_deref() {
            if self.config.blocked_domains.contains(domain) {
                return FilterDecision::reject(
                    RejectReason::BlockedDomain,
                    0.95,
                    format!("domain {domain} is blocked"),
                );
            }
        }
        if assessment.is_paywalled {
            return FilterDecision::reject(
                RejectReason::LicenseInvalid,
                0.85,
                "paywalled content",
            );
        }

        let license_allowed = self.config.allowed_licenses.contains(&assessment.detected_license);
        if !license_allowed && (self.config.strict_mode || assessment.has_copyright_notice) {
            return FilterDecision::reject(
                RejectReason::LicenseInvalid,
                0.8,
                format!("license {:?} not in the allowed set", assessment.detected_license),
            );
        }
        if self.config.strict_mode
            && assessment.compliance_confidence < self.config.confidence_threshold
        {
            return FilterDecision::reject(
                RejectReason::LicenseInvalid,
                1.0 - assessment.compliance_confidence,
                format!(
                    "compliance confidence {:.2} below threshold",
                    assessment.compliance_confidence
                ),
            );
        }

        FilterDecision::keep(
            assessment.compliance_confidence,
            format!("license {:?}", assessment.detected_license),
        )
        .with_metric("compliance_confidence", assessment.compliance_confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;

    #[test]
    fn test_license_detection() {
        assert_eq!(
            LicenseFilter::detect_license("Released under CC0 into the commons"),
            LicenseType::Cc0
        );
        assert_eq!(
            LicenseFilter::detect_license("This work is in the public domain."),
            LicenseType::PublicDomain
        );
        assert_eq!(
            LicenseFilter::detect_license("Licensed under Creative Commons BY-SA 4.0"),
            LicenseType::CcBySa
        );
        assert_eq!(
            LicenseFilter::detect_license("Shared as CC BY-NC for research"),
            LicenseType::CcByNc
        );
        assert_eq!(
            LicenseFilter::detect_license("Distributed under the MIT License"),
            LicenseType::Mit
        );
        assert_eq!(
            LicenseFilter::detect_license("See the Apache License, Version 2.0"),
            LicenseType::Apache2
        );
        assert_eq!(
            LicenseFilter::detect_license("GPLv3 or later"),
            LicenseType::GplV3
        );
        assert_eq!(
            LicenseFilter::detect_license("Covered by the GPL"),
            LicenseType::GplV2
        );
        assert_eq!(
            LicenseFilter::detect_license("BSD 3-clause licensed"),
            LicenseType::Bsd3Clause
        );
        assert_eq!(
            LicenseFilter::detect_license("No license mentioned here"),
            LicenseType::Unknown
        );
    }

    #[test]
    fn test_copyright_notice_detection() {
        assert!(LicenseFilter::has_copyright_notice("© 2024 Example Corp"));
        assert!(LicenseFilter::has_copyright_notice("Copyright 2020, all rights reserved"));
        assert!(LicenseFilter::has_copyright_notice("(c) The Authors"));
        assert!(!LicenseFilter::has_copyright_notice("plain prose with no notice"));
    }

    #[test]
    fn test_opt_out_rejects_unconditionally() {
        let mut filter = LicenseFilter::new(LicenseFilterConfig::default());
        filter.add_opt_out("publisher.example", "requested 2024-01-15");

        // even a CC0 document from the opted-out domain is rejected
        let doc = Document::with_url("d1", "CC0 public text", "https://publisher.example/a");
        let decision = filter.evaluate(&doc);
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("opted out"));
    }

    #[test]
    fn test_removal_request() {
        let mut filter = LicenseFilter::new(LicenseFilterConfig::default());
        filter.add_removal_request("doc-13");
        let decision = filter.evaluate(&Document::new("doc-13", "any text"));
        assert_eq!(decision.result, FilterResult::Reject);
    }

    #[test]
    fn test_opt_out_list_parsing() {
        let mut filter = LicenseFilter::new(LicenseFilterConfig::default());
        filter.load_opt_out_lines(
            "# comment\nplain.example\ntabbed.example\tGDPR request\n\n".lines(),
        );
        assert!(filter.opted_out_domains.contains_key("plain.example"));
        assert_eq!(
            filter.opted_out_domains.get("tabbed.example").map(String::as_str),
            Some("GDPR request")
        );
    }

    #[test]
    fn test_allowlist_excludes_others() {
        let mut config = LicenseFilterConfig::default();
        config.allowed_domains.insert("trusted.example".to_string());
        let filter = LicenseFilter::new(config);

        let trusted = Document::with_url("a", "open text", "https://trusted.example/x");
        assert_eq!(filter.evaluate(&trusted).result, FilterResult::Keep);

        let other = Document::with_url("b", "open text", "https://other.example/x");
        assert_eq!(filter.evaluate(&other).result, FilterResult::Reject);
    }

    #[test]
    fn test_paywall_rejected() {
        let filter = LicenseFilter::new(LicenseFilterConfig::default());
        let decision = filter.evaluate(&Document::new(
            "x",
            "This premium content is for members only. Subscribe to read more.",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("paywalled"));
    }

    #[test]
    fn test_copyright_without_license_rejected() {
        let filter = LicenseFilter::new(LicenseFilterConfig::default());
        let decision = filter.evaluate(&Document::new(
            "x",
            "© 2024 Closed Corp. All rights reserved. No reuse permitted.",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::LicenseInvalid));
    }

    #[test]
    fn test_open_license_with_notice_kept() {
        let filter = LicenseFilter::new(LicenseFilterConfig::default());
        let decision = filter.evaluate(&Document::new(
            "x",
            "Copyright 2024 The Authors. Distributed under the MIT License.",
        ));
        assert_eq!(decision.result, FilterResult::Keep);
        // explicit license: 0.5 + 0.3
        assert!((decision.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unlicensed_kept_outside_strict() {
        let filter = LicenseFilter::new(LicenseFilterConfig::default());
        let decision = filter.evaluate(&Document::new("x", "ordinary web prose, no notices"));
        assert_eq!(decision.result, FilterResult::Keep);
    }

    #[test]
    fn test_strict_mode_rejects_unknown() {
        let filter = LicenseFilter::new(LicenseFilterConfig {
            strict_mode: true,
            ..Default::default()
        });
        let decision = filter.evaluate(&Document::new("x", "ordinary web prose, no notices"));
        assert_eq!(decision.result, FilterResult::Reject);
    }

    #[test]
    fn test_confidence_arithmetic() {
        let filter = LicenseFilter::new(LicenseFilterConfig::default());

        // paywalled + copyright without license: 0.5 - 0.3 - 0.4 -> clamped 0
        let doc = Document::new(
            "x",
            "© 2024. All rights reserved. Premium content for members only.",
        );
        let assessment = filter.assess(&doc);
        assert_eq!(assessment.compliance_confidence, 0.0);
        assert!(assessment.is_paywalled);
        assert!(assessment.has_copyright_notice);
    }
}
