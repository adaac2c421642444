//! Source metadata filtering: domains, URLs, and provenance signals

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::CurationConfig;
use crate::decision::{FilterDecision, RejectReason};
use crate::{Filter, Result};
use rapidsift_core::text::{extract_domain, extract_tld, is_ip_literal};
use rapidsift_core::Document;

/// TLDs with a concentration of throwaway or malicious registrations
const MALICIOUS_TLDS: &[&str] = &["tk", "ml", "ga", "cf", "click", "download", "review"];

const REPUTABLE_TLDS: &[&str] = &["com", "org", "edu", "gov"];

const URL_SHORTENERS: &[&str] = &[
    "bit.ly", "tinyurl.com", "goo.gl", "t.co", "ow.ly", "is.gd", "buff.ly", "rebrand.ly",
];

const TRACKING_PARAMS: &[&str] = &["utm_", "gclid", "fbclid", "mc_eid", "ref_src"];

/// Configuration for the metadata filter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFilterConfig {
    pub blocked_domains: HashSet<String>,
    pub allowed_domains: HashSet<String>,
    /// URL rejection patterns, compiled at configure time
    pub suspicious_url_patterns: Vec<String>,
    pub spam_keywords: Vec<String>,
    pub block_ip_urls: bool,
    pub check_url_shorteners: bool,
    /// Phrases marking machine translation; soft signal outside strict mode
    pub machine_translation_indicators: Vec<String>,
    /// Phrases marking AI-generated text; soft signal outside strict mode
    pub ai_generation_indicators: Vec<String>,
}

impl Default for MetadataFilterConfig {
    fn default() -> Self {
        Self {
            blocked_domains: HashSet::new(),
            allowed_domains: HashSet::new(),
            suspicious_url_patterns: Vec::new(),
            spam_keywords: Vec::new(),
            block_ip_urls: false,
            check_url_shorteners: true,
            machine_translation_indicators: default_mt_indicators(),
            ai_generation_indicators: default_ai_indicators(),
        }
    }
}

fn default_mt_indicators() -> Vec<String> {
    vec![
        "translated by google".to_string(),
        "machine translated".to_string(),
        "automatic translation".to_string(),
    ]
}

fn default_ai_indicators() -> Vec<String> {
    vec![
        "as an ai language model".to_string(),
        "as a large language model".to_string(),
        "i cannot fulfill that request".to_string(),
    ]
}

/// Rejects documents from blocked or suspicious sources
pub struct MetadataFilter {
    config: MetadataFilterConfig,
    patterns: Vec<Regex>,
    strict: bool,
}

impl MetadataFilter {
    pub fn new(config: MetadataFilterConfig) -> Result<Self> {
        let patterns = config
            .suspicious_url_patterns
            .iter()
            .map(|p| Ok(Regex::new(p)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            patterns,
            strict: false,
        })
    }

    /// Composite suspicion score over structural URL signals, in [0, 1].
    fn suspicion_score(&self, url: &str, domain: &str) -> f64 {
        let mut score: f64 = 0.0;

        // subdomain structure
        let dots = domain.matches('.').count();
        let has_phishing_prefix = ["admin.", "secure.", "login.", "account."]
            .iter()
            .any(|p| domain.starts_with(p));
        if dots > 4 || has_phishing_prefix {
            score += 0.2;
        }

        // path
        let path = url.splitn(4, '/').nth(3).unwrap_or("");
        if path.len() > 200
            || ["/click", "/redirect", "/track", "/ads"]
                .iter()
                .any(|p| url.contains(p))
        {
            score += 0.2;
        }

        // parameters
        let param_count = url.matches('&').count();
        if param_count > 10 || TRACKING_PARAMS.iter().any(|p| url.contains(p)) {
            score += 0.2;
        }

        if domain.matches('-').count() > 3 {
            score += 0.15;
        }
        if domain.len() > 50 {
            score += 0.15;
        }
        if domain.starts_with("xn--") || domain.contains(".xn--") {
            score += 0.3;
        }

        score.min(1.0)
    }

    /// Domain reputation in [0, 1]: neutral 0.5, boosted for mainstream
    /// TLDs, collapsed for throwaway TLDs.
    fn reputation(&self, domain: &str) -> f64 {
        let tld = extract_tld(domain);
        let mut reputation: f64 = 0.5;
        if REPUTABLE_TLDS.contains(&tld.as_str()) {
            reputation *= 1.2;
        }
        if MALICIOUS_TLDS.contains(&tld.as_str()) {
            reputation *= 0.3;
        }
        reputation.clamp(0.0, 1.0)
    }
}

impl Filter for MetadataFilter {
    fn name(&self) -> &str {
        "metadata"
    }

    fn configure(&mut self, config: &CurationConfig) -> Result<()> {
        let mut rebuilt = Self::new(config.metadata.clone())?;
        rebuilt.strict = config.strict_mode;
        *self = rebuilt;
        Ok(())
    }

    fn evaluate(&self, doc: &Document) -> FilterDecision {
        let lower_text = doc.text.to_lowercase();
        let mt_hit = self
            .config
            .machine_translation_indicators
            .iter()
            .any(|m| lower_text.contains(m.as_str()));
        let ai_hit = self
            .config
            .ai_generation_indicators
            .iter()
            .any(|m| lower_text.contains(m.as_str()));

        let Some(url) = doc.url.as_deref() else {
            // provenance checks need a URL; text-level signals still apply
            if self.strict && (mt_hit || ai_hit) {
                return FilterDecision::reject(
                    RejectReason::MachineGenerated,
                    0.7,
                    "machine-generation indicator in text",
                );
            }
            let confidence = if mt_hit || ai_hit { 0.5 } else { 0.8 };
            return FilterDecision::keep(confidence, "no source URL");
        };

        let domain = doc
            .effective_domain()
            .unwrap_or_else(|| extract_domain(url));

        if self.config.blocked_domains.contains(&domain) {
            return FilterDecision::reject(
                RejectReason::BlockedDomain,
                0.95,
                format!("domain {domain} is blocked"),
            );
        }
        if !self.config.allowed_domains.is_empty() && self.config.allowed_domains.contains(&domain)
        {
            return FilterDecision::keep(0.95, format!("domain {domain} is allowlisted"));
        }

        for pattern in &self.patterns {
            if pattern.is_match(url) {
                return FilterDecision::reject(
                    RejectReason::SuspiciousUrl,
                    0.9,
                    format!("url matched pattern {}", pattern.as_str()),
                );
            }
        }

        let lower_url = url.to_lowercase();
        if let Some(keyword) = self
            .config
            .spam_keywords
            .iter()
            .find(|k| lower_url.contains(k.to_lowercase().as_str()))
        {
            return FilterDecision::reject(
                RejectReason::SuspiciousUrl,
                0.85,
                format!("spam keyword '{keyword}' in url"),
            );
        }

        if self.config.block_ip_urls && is_ip_literal(&domain) {
            return FilterDecision::reject(
                RejectReason::SuspiciousUrl,
                0.9,
                format!("ip-literal host {domain}"),
            );
        }

        if self.config.check_url_shorteners && URL_SHORTENERS.contains(&domain.as_str()) {
            return FilterDecision::reject(
                RejectReason::SuspiciousUrl,
                0.85,
                format!("url shortener {domain}"),
            );
        }

        let suspicion = self.suspicion_score(url, &domain);
        if suspicion >= 0.5 {
            return FilterDecision::reject(
                RejectReason::SuspiciousUrl,
                suspicion,
                format!("suspicion score {suspicion:.2}"),
            )
            .with_metric("suspicion_score", suspicion);
        }

        let reputation = self.reputation(&domain);
        if reputation < 0.3 {
            return FilterDecision::reject(
                RejectReason::SuspiciousUrl,
                1.0 - reputation,
                format!("low domain reputation {reputation:.2}"),
            )
            .with_metric("domain_reputation", reputation);
        }

        if self.strict && (mt_hit || ai_hit) {
            return FilterDecision::reject(
                RejectReason::MachineGenerated,
                0.7,
                "machine-generation indicator in text",
            );
        }

        let mut confidence = reputation * (1.0 - suspicion);
        if mt_hit || ai_hit {
            confidence *= 0.7;
        }
        FilterDecision::keep(
            confidence.max(0.3),
            format!("domain {domain} ok (reputation {reputation:.2})"),
        )
        .with_metric("suspicion_score", suspicion)
        .with_metric("domain_reputation", reputation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::FilterResult;

    fn doc_with_url(url: &str) -> Document {
        Document::with_url("x", "Ordinary body text for the metadata filter tests.", url)
    }

    #[test]
    fn test_blocked_domain() {
        let mut config = MetadataFilterConfig::default();
        config.blocked_domains.insert("spam.example".to_string());
        let filter = MetadataFilter::new(config).unwrap();

        let decision = filter.evaluate(&doc_with_url("https://spam.example/page"));
        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::BlockedDomain));
    }

    #[test]
    fn test_allowlisted_domain_kept() {
        let mut config = MetadataFilterConfig::default();
        config.allowed_domains.insert("good.example".to_string());
        // an allowlisted domain skips the pattern checks
        config.suspicious_url_patterns = vec![".*".to_string()];
        let filter = MetadataFilter::new(config).unwrap();

        let decision = filter.evaluate(&doc_with_url("https://good.example/article"));
        assert_eq!(decision.result, FilterResult::Keep);
    }

    #[test]
    fn test_no_url_is_soft_keep() {
        let filter = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        let decision = filter.evaluate(&Document::new("x", "text without provenance"));
        assert_eq!(decision.result, FilterResult::Keep);
    }

    #[test]
    fn test_ip_literal_blocked_when_configured() {
        let config = MetadataFilterConfig {
            block_ip_urls: true,
            ..Default::default()
        };
        let filter = MetadataFilter::new(config).unwrap();
        let decision = filter.evaluate(&doc_with_url("http://192.168.1.50/admin"));
        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::SuspiciousUrl));

        let off = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        assert_eq!(
            off.evaluate(&doc_with_url("http://192.168.1.50/admin")).result,
            FilterResult::Keep
        );
    }

    #[test]
    fn test_url_shortener_rejected() {
        let filter = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        let decision = filter.evaluate(&doc_with_url("https://bit.ly/3xYzAb"));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("shortener"));
    }

    #[test]
    fn test_suspicion_score_accumulates() {
        let filter = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        // punycode + tracking params + redirect path: 0.3 + 0.2 + 0.2
        let decision = filter.evaluate(&doc_with_url(
            "https://xn--bcher-kva.example/redirect?utm_source=mail&gclid=abc",
        ));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.confidence >= 0.5);
    }

    #[test]
    fn test_malicious_tld_low_reputation() {
        let filter = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        let decision = filter.evaluate(&doc_with_url("https://free-stuff.tk/win"));
        assert_eq!(decision.result, FilterResult::Reject);
        assert!(decision.details.contains("reputation"));
    }

    #[test]
    fn test_spam_keyword_in_url() {
        let config = MetadataFilterConfig {
            spam_keywords: vec!["casino".to_string()],
            ..Default::default()
        };
        let filter = MetadataFilter::new(config).unwrap();
        let decision = filter.evaluate(&doc_with_url("https://fun.example/casino-bonus"));
        assert_eq!(decision.result, FilterResult::Reject);
    }

    #[test]
    fn test_machine_generation_soft_outside_strict() {
        let filter = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        let mut doc = doc_with_url("https://blog.example.com/post");
        doc.text = "As an AI language model, I cannot browse the internet.".to_string();

        let decision = filter.evaluate(&doc);
        assert_eq!(decision.result, FilterResult::Keep);
        // soft signal shows up as reduced confidence
        assert!(decision.confidence < 0.5);
    }

    #[test]
    fn test_machine_generation_rejects_in_strict() {
        let mut filter = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        filter.strict = true;
        let mut doc = doc_with_url("https://blog.example.com/post");
        doc.text = "As an AI language model, I cannot browse the internet.".to_string();

        let decision = filter.evaluate(&doc);
        assert_eq!(decision.result, FilterResult::Reject);
        assert_eq!(decision.reason, Some(RejectReason::MachineGenerated));
    }

    #[test]
    fn test_reputable_domain_confident_keep() {
        let filter = MetadataFilter::new(MetadataFilterConfig::default()).unwrap();
        let decision = filter.evaluate(&doc_with_url("https://research.example.edu/paper"));
        assert_eq!(decision.result, FilterResult::Keep);
        assert!(decision.confidence >= 0.5);
    }
}
