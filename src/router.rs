//! Agent router (provider preselection)
//!
//! Maps (persona, message) to a preferred starting provider using static
//! keyword lists, in the same spirit as a lightweight intent classifier.
//! No network calls; never disables a provider.

use crate::models::Persona;
use crate::providers::AvailabilityTracker;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Static keyword lists, zero allocation
const EXPLAIN_KEYWORDS: &[&str] = &["explain", "how", "what", "why", "meaning", "difference"];
const FEE_KEYWORDS: &[&str] = &[
    "fee", "fees", "limit", "limits", "charge", "charges", "compare", "comparison",
    "tariff", "overdraft", "interest rate", "cheapest",
];
const CALC_KEYWORDS: &[&str] = &["calculate", "percent", "percentage", "split", "50/30/20", "how much"];
const INVEST_KEYWORDS: &[&str] = &[
    "invest", "investing", "stock", "stocks", "etf", "fund", "funds", "retirement", "compound", "bond",
];
const SAVE_KEYWORDS: &[&str] = &["save", "saving", "savings", "emergency", "piggy"];
const QUIZ_KEYWORDS: &[&str] = &["quiz", "example", "exercise", "test me"];
const CRYPTO_KEYWORDS: &[&str] = &["bitcoin", "crypto", "wallet", "blockchain", "token", "ethereum", "stablecoin"];
const PAYMENT_KEYWORDS: &[&str] = &["transfer", "payment", "pay", "qr", "instant", "remittance"];
const CAREER_KEYWORDS: &[&str] = &["resume", "cv", "interview", "job", "salary", "raise", "promotion"];
const SIDE_INCOME_KEYWORDS: &[&str] = &["side hustle", "freelance", "business", "sell", "gig"];

/// Swappable preselection rules.
pub trait RoutingStrategy: Send + Sync {
    fn preferred(&self, persona: Option<Persona>, text: &str) -> Option<&'static str>;
}

/// Keyword heuristics per persona domain.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordRouting;

impl RoutingStrategy for KeywordRouting {
    fn preferred(&self, persona: Option<Persona>, text: &str) -> Option<&'static str> {
        let text = text.to_lowercase();

        let choice = match persona? {
            Persona::Pepper => {
                if mentions(&text, FEE_KEYWORDS) {
                    "openai"
                } else if mentions(&text, EXPLAIN_KEYWORDS) {
                    "gemini"
                } else {
                    "groq"
                }
            }
            Persona::Penny => {
                if mentions(&text, CALC_KEYWORDS) {
                    "openai"
                } else {
                    "gemini"
                }
            }
            Persona::Sprout => {
                if mentions(&text, INVEST_KEYWORDS) {
                    "openai"
                } else if mentions(&text, SAVE_KEYWORDS) {
                    "gemini"
                } else {
                    "groq"
                }
            }
            Persona::Sage => {
                if mentions(&text, QUIZ_KEYWORDS) {
                    "groq"
                } else {
                    "gemini"
                }
            }
            Persona::Bitsy => {
                if mentions(&text, CRYPTO_KEYWORDS) {
                    "openai"
                } else if mentions(&text, PAYMENT_KEYWORDS) {
                    "groq"
                } else {
                    "gemini"
                }
            }
            Persona::Hustle => {
                if mentions(&text, CAREER_KEYWORDS) {
                    "openai"
                } else if mentions(&text, SIDE_INCOME_KEYWORDS) {
                    "groq"
                } else {
                    "gemini"
                }
            }
        };

        Some(choice)
    }
}

/// Single words match whole tokens; phrases match as substrings.
fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| {
        if kw.contains(' ') || kw.contains('/') {
            text.contains(kw)
        } else {
            text.split(|c: char| !c.is_alphanumeric())
                .any(|word| word == *kw)
        }
    })
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ChangeReason {
    Preselected { persona: Option<Persona> },
    Succeeded { previous: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderChangeEvent {
    pub provider: String,
    #[serde(flatten)]
    pub reason: ChangeReason,
    pub occurred_at: DateTime<Utc>,
}

impl ProviderChangeEvent {
    pub fn new(provider: impl Into<String>, reason: ChangeReason) -> Self {
        Self {
            provider: provider.into(),
            reason,
            occurred_at: Utc::now(),
        }
    }
}

/// Callback for preferred-provider changes.
pub trait ProviderChangeListener: Send + Sync {
    fn on_provider_change(&self, event: &ProviderChangeEvent);
}

/// Listener that writes every change to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl ProviderChangeListener for TracingListener {
    fn on_provider_change(&self, event: &ProviderChangeEvent) {
        info!(provider = %event.provider, reason = ?event.reason, "Preferred provider changed");
    }
}

pub struct AgentRouter {
    strategy: Arc<dyn RoutingStrategy>,
    listeners: RwLock<Vec<Arc<dyn ProviderChangeListener>>>,
}

impl AgentRouter {
    pub fn new(strategy: Arc<dyn RoutingStrategy>) -> Self {
        Self {
            strategy,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ProviderChangeListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    pub fn notify(&self, event: &ProviderChangeEvent) {
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener.on_provider_change(event);
        }
    }

    /// Propose a starting provider, if the heuristic's pick is currently available.
    pub async fn preselect(
        &self,
        persona: Option<Persona>,
        text: &str,
        tracker: &AvailabilityTracker,
    ) -> Option<String> {
        let preferred = self.strategy.preferred(persona, text)?;

        if !tracker.is_available(preferred).await {
            debug!(provider = preferred, "Preselected provider unavailable");
            return None;
        }

        self.notify(&ProviderChangeEvent::new(
            preferred,
            ChangeReason::Preselected { persona },
        ));

        Some(preferred.to_string())
    }
}

impl Default for AgentRouter {
    fn default() -> Self {
        Self::new(Arc::new(KeywordRouting))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CascadePolicy, StaticCredentials};
    use crate::error::ErrorClass;
    use crate::providers::ProviderRegistry;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProviderChangeEvent>>,
    }

    impl ProviderChangeListener for Recorder {
        fn on_provider_change(&self, event: &ProviderChangeEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn tracker_with(keys: &[&str]) -> AvailabilityTracker {
        let creds = StaticCredentials::new();
        for key in keys {
            creds.set(key, "secret");
        }
        let registry = Arc::new(ProviderRegistry::with_defaults(Arc::new(creds)));
        AvailabilityTracker::new(registry, &CascadePolicy::default())
    }

    #[test]
    fn test_no_persona_no_preference() {
        let routing = KeywordRouting;
        assert_eq!(routing.preferred(None, "help me with my budget"), None);
    }

    #[test]
    fn test_pepper_rules() {
        let routing = KeywordRouting;
        let pepper = Some(Persona::Pepper);
        assert_eq!(routing.preferred(pepper, "what are the fees for this account"), Some("openai"));
        assert_eq!(routing.preferred(pepper, "How does a savings account work?"), Some("gemini"));
        assert_eq!(routing.preferred(pepper, "open an account"), Some("groq"));
    }

    #[test]
    fn test_other_personas() {
        let routing = KeywordRouting;
        assert_eq!(routing.preferred(Some(Persona::Sprout), "Should I buy an ETF?"), Some("openai"));
        assert_eq!(routing.preferred(Some(Persona::Sprout), "emergency savings"), Some("gemini"));
        assert_eq!(routing.preferred(Some(Persona::Bitsy), "is my wallet safe"), Some("openai"));
        assert_eq!(routing.preferred(Some(Persona::Bitsy), "send a payment"), Some("groq"));
        assert_eq!(routing.preferred(Some(Persona::Hustle), "ask for a raise"), Some("openai"));
        assert_eq!(routing.preferred(Some(Persona::Sage), "give me an example"), Some("groq"));
        assert_eq!(routing.preferred(Some(Persona::Penny), "calculate my split"), Some("openai"));
    }

    #[test]
    fn test_word_matching() {
        // "show" must not count as "how"
        assert!(!mentions("show me", EXPLAIN_KEYWORDS));
        assert!(mentions("what's the overdraft?", FEE_KEYWORDS));
        assert!(mentions("try the 50/30/20 rule", CALC_KEYWORDS));
    }

    #[tokio::test]
    async fn test_preselect_available_notifies() {
        let tracker = tracker_with(&["OPENAI_API_KEY"]);
        let router = AgentRouter::default();
        let recorder = Arc::new(Recorder::default());
        router.add_listener(recorder.clone());

        let picked = router
            .preselect(Some(Persona::Pepper), "what are the fees for this account", &tracker)
            .await;
        assert_eq!(picked.as_deref(), Some("openai"));

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].provider, "openai");
        assert_eq!(
            events[0].reason,
            ChangeReason::Preselected { persona: Some(Persona::Pepper) }
        );
    }

    #[tokio::test]
    async fn test_preselect_unavailable_returns_none() {
        let tracker = tracker_with(&["OPENAI_API_KEY", "GEMINI_API_KEY"]);
        tracker.record_failure("openai", ErrorClass::RateLimit).await;

        let router = AgentRouter::default();
        let recorder = Arc::new(Recorder::default());
        router.add_listener(recorder.clone());

        let picked = router
            .preselect(Some(Persona::Pepper), "what are the fees for this account", &tracker)
            .await;
        assert!(picked.is_none());
        assert!(recorder.events.lock().unwrap().is_empty());
        // routing never disables anything
        assert!(tracker.is_available("gemini").await);
    }
}
