//! End-to-end cascade behavior through the public API, with scripted providers.

use async_trait::async_trait;
use finance_chat_cascade::adapters::{AdapterRequest, AdapterSet, ProviderAdapter, SyntheticAdapter};
use finance_chat_cascade::cascade::record::{NO_CONNECTION_LABEL, RATE_LIMITED_LABEL};
use finance_chat_cascade::clock::ManualClock;
use finance_chat_cascade::config::{CascadePolicy, Environment};
use finance_chat_cascade::error::{OrchestrationError, ProviderError};
use finance_chat_cascade::normalizer::{normalize, DISCLAIMER_FOOTER};
use finance_chat_cascade::providers::{AdapterKind, Provider};
use finance_chat_cascade::router::KeywordRouting;
use finance_chat_cascade::router::RoutingStrategy;
use finance_chat_cascade::{
    AvailabilityTracker, CascadeOrchestrator, Persona, ProviderRegistry, SendOptions, Settings,
    StaticCredentials,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Scripted {
    outcomes: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(outcomes: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn always(err: ProviderError) -> Arc<Self> {
        Self::new(vec![Err(err); 8])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for Scripted {
    async fn complete(&self, provider: &Provider, _request: &AdapterRequest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(format!("Answer from {}. Consider reviewing your spending.", provider.key)))
    }
}

fn build(
    credentials: &[&str],
    adapters: &[(&str, Arc<Scripted>)],
    environment: Environment,
) -> (CascadeOrchestrator, Arc<ManualClock>) {
    let creds = StaticCredentials::new();
    for name in credentials {
        creds.set(name, "test-secret");
    }

    let settings = Settings {
        environment,
        synthetic_enabled: environment.allows_synthetic(),
        policy: CascadePolicy {
            retry_delay: Duration::ZERO,
            ..Default::default()
        },
        ..Default::default()
    };

    let registry = Arc::new(ProviderRegistry::with_defaults(Arc::new(creds)));
    let clock = Arc::new(ManualClock::new());
    let tracker = AvailabilityTracker::with_clock(registry, &settings.policy, clock.clone());

    let mut set = AdapterSet::new().with_kind(AdapterKind::Synthetic, Arc::new(SyntheticAdapter));
    for (key, adapter) in adapters {
        set = set.with_provider(key, adapter.clone());
    }

    (CascadeOrchestrator::new(tracker, set, &settings), clock)
}

#[tokio::test]
async fn no_credentials_in_production_reports_no_connection() {
    let (cascade, _clock) = build(&[], &[], Environment::Production);

    let response = cascade.send("hello", &[], None, SendOptions::default()).await.unwrap();

    assert_eq!(response.provider_label, NO_CONNECTION_LABEL);
    assert!(response.metadata.attempted_providers.is_empty());
    assert!(response.metadata.provider.is_none());
    assert!(response.message.ends_with(DISCLAIMER_FOOTER));
}

#[tokio::test]
async fn rate_limited_provider_is_skipped_for_the_window() {
    let gemini = Scripted::new(vec![Err(ProviderError::RateLimited { retry_after: None })]);
    let groq = Scripted::new(vec![
        Ok("Groq answer one.".into()),
        Err(ProviderError::Server { status: 500 }),
    ]);
    let openai = Scripted::new(vec![]);
    let (cascade, clock) = build(
        &["GEMINI_API_KEY", "GROQ_API_KEY", "OPENAI_API_KEY"],
        &[("gemini", gemini.clone()), ("groq", groq.clone()), ("openai", openai.clone())],
        Environment::Production,
    );

    let first = cascade.send("hello", &[], None, SendOptions::default()).await.unwrap();
    assert_eq!(first.metadata.attempted_providers, vec!["gemini", "groq"]);
    assert_eq!(gemini.calls(), 1, "429 must not be retried");

    clock.advance(Duration::from_secs(30));
    let second = cascade.send("hello again", &[], None, SendOptions::default()).await.unwrap();
    assert_eq!(second.metadata.attempted_providers, vec!["groq", "openai"]);
    assert_eq!(gemini.calls(), 1);

    clock.advance(Duration::from_secs(29));
    assert!(!cascade.tracker().is_available("gemini").await);
    clock.advance(Duration::from_secs(1));
    assert!(cascade.tracker().is_available("gemini").await);
}

#[tokio::test]
async fn unavailable_preselection_falls_back_to_default_order() {
    let message = "what are the fees for this account";
    assert_eq!(KeywordRouting.preferred(Some(Persona::Pepper), message), Some("openai"));

    // openai has no credentials, so the cascade starts from the top of the list
    let gemini = Scripted::new(vec![]);
    let (cascade, _clock) = build(
        &["GEMINI_API_KEY", "GROQ_API_KEY"],
        &[("gemini", gemini.clone()), ("groq", Scripted::new(vec![]))],
        Environment::Production,
    );

    let response = cascade
        .send(message, &[], None, SendOptions::with_persona(Persona::Pepper))
        .await
        .unwrap();
    assert_eq!(response.metadata.attempted_providers, vec!["gemini"]);
    assert_eq!(gemini.calls(), 1);
}

#[tokio::test]
async fn oversized_message_fails_before_any_attempt() {
    let gemini = Scripted::new(vec![]);
    let (cascade, _clock) = build(&["GEMINI_API_KEY"], &[("gemini", gemini.clone())], Environment::Production);

    let message = "a".repeat(5001);
    let err = tokio_test::assert_err!(cascade.send(&message, &[], None, SendOptions::default()).await);

    assert!(matches!(err, OrchestrationError::Validation(_)));
    assert_eq!(gemini.calls(), 0);
}

#[tokio::test]
async fn synthetic_provider_rescues_total_server_outage() {
    let adapters: Vec<(&str, Arc<Scripted>)> = ["gemini", "groq", "openai", "openrouter", "ollama"]
        .into_iter()
        .map(|key| (key, Scripted::always(ProviderError::Server { status: 503 })))
        .collect();
    let (cascade, _clock) = build(
        &[
            "GEMINI_API_KEY",
            "GROQ_API_KEY",
            "OPENAI_API_KEY",
            "OPENROUTER_API_KEY",
            "OLLAMA_BASE_URL",
        ],
        &adapters,
        Environment::Test,
    );

    let response = cascade.send("how should I budget?", &[], None, SendOptions::default()).await.unwrap();

    assert!(response.is_success());
    assert_eq!(response.metadata.provider.as_deref(), Some("synthetic"));
    assert_eq!(response.provider_label, "Synthetic assistant (dev)");
    assert_eq!(response.metadata.attempted_providers.first().map(String::as_str), Some("gemini"));
    assert_eq!(response.metadata.attempted_providers.last().map(String::as_str), Some("synthetic"));
}

#[tokio::test]
async fn synthetic_never_first_when_a_real_provider_has_credentials() {
    let (cascade, _clock) = build(
        &["GROQ_API_KEY"],
        &[("groq", Scripted::new(vec![]))],
        Environment::Development,
    );

    let response = tokio_test::assert_ok!(cascade.send("hi", &[], None, SendOptions::default()).await);
    assert_eq!(response.metadata.attempted_providers, vec!["groq"]);
}

#[tokio::test]
async fn all_providers_rate_limited_returns_wait_message() {
    let (cascade, _clock) = build(
        &["GEMINI_API_KEY", "GROQ_API_KEY"],
        &[
            ("gemini", Scripted::always(ProviderError::RateLimited { retry_after: None })),
            ("groq", Scripted::always(ProviderError::RateLimited { retry_after: None })),
        ],
        Environment::Production,
    );

    let response = cascade.send("hi", &[], None, SendOptions::default()).await.unwrap();
    assert_eq!(response.provider_label, RATE_LIMITED_LABEL);
    assert_eq!(response.metadata.attempted_providers, vec!["gemini", "groq"]);
}

#[test]
fn footer_is_appended_exactly_once() {
    let once = normalize("Track your spending for a month.").message;
    let twice = normalize(&once).message;
    assert_eq!(once, twice);
    assert_eq!(twice.matches(DISCLAIMER_FOOTER).count(), 1);
}
