//! Cascade orchestrator - the request control loop
//!
//! VALIDATE → REFRESH → PRESELECT → ATTEMPT (in order) → NORMALIZE → RESPOND
//!
//! Candidates are tried sequentially. Provider failures never escape `send`;
//! only validation errors do.

pub mod record;

pub use record::AttemptRecord;

use crate::adapters::{AdapterRequest, AdapterSet, ProviderAdapter};
use crate::config::{CascadePolicy, CredentialSource, Settings};
use crate::error::{OrchestrationError, ProviderError};
use crate::models::{ChatContext, ChatMessage, NormalizedResponse, Persona, ResponseMetadata, SendOptions};
use crate::normalizer::{estimate_confidence, ResponseNormalizer};
use crate::prompt;
use crate::providers::{AvailabilityTracker, Provider, ProviderRegistry};
use crate::router::{AgentRouter, ChangeReason, ProviderChangeEvent};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const SYNTHETIC_CONFIDENCE: f32 = 0.5;

pub struct CascadeOrchestrator {
    tracker: AvailabilityTracker,
    router: Arc<AgentRouter>,
    adapters: AdapterSet,
    normalizer: ResponseNormalizer,
    policy: CascadePolicy,
    synthetic_enabled: bool,
    /// Last provider that answered; tried first while it stays available
    preferred: RwLock<Option<String>>,
}

impl CascadeOrchestrator {
    pub fn new(tracker: AvailabilityTracker, adapters: AdapterSet, settings: &Settings) -> Self {
        Self {
            tracker,
            router: Arc::new(AgentRouter::default()),
            adapters,
            normalizer: ResponseNormalizer::default(),
            policy: settings.policy.clone(),
            synthetic_enabled: settings.synthetic_enabled,
            preferred: RwLock::new(None),
        }
    }

    /// Default provider table and HTTP adapters over the given credentials.
    pub fn from_settings(settings: &Settings, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::with_defaults(credentials.clone()));
        let tracker = AvailabilityTracker::new(registry, &settings.policy);
        let adapters = AdapterSet::http_defaults(credentials)?;

        Ok(Self::new(tracker, adapters, settings))
    }

    pub fn with_router(mut self, router: Arc<AgentRouter>) -> Self {
        self.router = router;
        self
    }

    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn tracker(&self) -> &AvailabilityTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.tracker.registry()
    }

    pub fn router(&self) -> &Arc<AgentRouter> {
        &self.router
    }

    pub fn synthetic_enabled(&self) -> bool {
        self.synthetic_enabled
    }

    pub async fn preferred_provider(&self) -> Option<String> {
        self.preferred.read().await.clone()
    }

    /// Clear one provider's window and re-read credentials.
    pub async fn reset_provider(&self, key: &str) -> Result<bool> {
        if self.registry().get(key).await.is_none() {
            return Err(OrchestrationError::UnknownProvider(key.to_string()));
        }
        let cleared = self.tracker.reset(key).await;
        self.registry().refresh_availability().await;
        Ok(cleared)
    }

    /// Config reload: clear every window and re-read credentials.
    pub async fn reset_all(&self) -> usize {
        let cleared = self.tracker.reset_all().await;
        self.registry().refresh_availability().await;
        cleared
    }

    pub async fn shutdown(&self) {
        self.tracker.shutdown().await;
        info!("Cascade orchestrator shut down");
    }

    /// Route one chat message through the provider cascade.
    ///
    /// Fails only on invalid input. Every provider-side failure is folded
    /// into a degraded `NormalizedResponse`.
    pub async fn send(
        &self,
        message: &str,
        history: &[ChatMessage],
        context: Option<&ChatContext>,
        options: SendOptions,
    ) -> Result<NormalizedResponse> {
        self.validate(message)?;

        let request_id = Uuid::new_v4();
        let started = Instant::now();

        info!(
            request_id = %request_id,
            persona = ?options.persona,
            message_chars = message.chars().count(),
            history_len = history.len(),
            "Cascade started"
        );

        let request = AdapterRequest {
            message: message.to_string(),
            history: history.to_vec(),
            system_prompt: prompt::build(options.persona, context),
            temperature: options
                .temperature
                .unwrap_or(DEFAULT_TEMPERATURE)
                .clamp(0.0, 2.0),
        };

        let mut record = AttemptRecord::new();
        let deadline = options.deadline.or(self.policy.overall_deadline);

        let response = match deadline {
            Some(limit) => {
                let cascade = self.run(&request, options.persona, &mut record, request_id, started);
                let outcome = tokio::time::timeout(limit, cascade).await;
                match outcome {
                    Ok(response) => response,
                    Err(_) => {
                        warn!(
                            request_id = %request_id,
                            deadline_ms = limit.as_millis() as u64,
                            attempted = ?record.attempted,
                            "Cascade deadline elapsed"
                        );
                        record.deadline_response(request_id, started)
                    }
                }
            }
            None => self.run(&request, options.persona, &mut record, request_id, started).await,
        };

        info!(
            request_id = %request_id,
            provider = ?response.metadata.provider,
            attempts = response.metadata.attempted_providers.len(),
            elapsed_ms = response.metadata.elapsed_ms,
            "Cascade finished"
        );

        Ok(response)
    }

    fn validate(&self, message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(OrchestrationError::Validation(
                "Message cannot be empty".to_string(),
            ));
        }

        let chars = message.chars().count();
        if chars > self.policy.max_message_chars {
            return Err(OrchestrationError::Validation(format!(
                "Message is {} characters, the limit is {}",
                chars, self.policy.max_message_chars
            )));
        }

        Ok(())
    }

    async fn run(
        &self,
        request: &AdapterRequest,
        persona: Option<Persona>,
        record: &mut AttemptRecord,
        request_id: Uuid,
        started: Instant,
    ) -> NormalizedResponse {
        self.registry().refresh_availability().await;

        let preferred = self.pick_preferred(persona, &request.message).await;
        let order = self.attempt_order(preferred.as_deref()).await;

        debug!(
            request_id = %request_id,
            preferred = ?preferred,
            order = ?order.iter().map(|p| p.key.as_str()).collect::<Vec<_>>(),
            "Attempt order built"
        );

        for provider in order {
            if provider.is_synthetic() {
                if !self.synthetic_enabled {
                    continue;
                }
                if !record.has_real_attempt(&provider.key) {
                    debug!(provider = %provider.key, "No real provider attempted, skipping synthetic");
                    continue;
                }
            }

            if !self.tracker.is_available(&provider.key).await {
                debug!(provider = %provider.key, "Skipping unavailable provider");
                continue;
            }

            let Some(adapter) = self.adapters.resolve(&provider) else {
                warn!(provider = %provider.key, kind = ?provider.kind, "No adapter registered");
                continue;
            };

            match self.attempt(&provider, adapter.as_ref(), request, record).await {
                Ok(raw) => return self.succeed(&provider, &raw, record, request_id, started).await,
                Err(err) => {
                    self.tracker.record_failure(&provider.key, err.class()).await;
                    info!(
                        provider = %provider.key,
                        error_class = ?err.class(),
                        "Falling through to next provider"
                    );
                }
            }
        }

        warn!(
            request_id = %request_id,
            attempted = ?record.attempted,
            rate_limited = record.rate_limited,
            "Cascade exhausted"
        );
        record.exhausted_response(request_id, started)
    }

    /// Last successful provider if still usable, otherwise the router's pick.
    async fn pick_preferred(&self, persona: Option<Persona>, text: &str) -> Option<String> {
        let last = self.preferred.read().await.clone();
        if let Some(key) = last {
            if self.tracker.is_available(&key).await {
                return Some(key);
            }
        }

        self.router.preselect(persona, text, &self.tracker).await
    }

    /// Preferred first, then registry priority order; synthetic providers always last.
    async fn attempt_order(&self, preferred: Option<&str>) -> Vec<Provider> {
        let providers = self.registry().list_providers().await;

        let (synthetic, real): (Vec<Provider>, Vec<Provider>) =
            providers.into_iter().partition(Provider::is_synthetic);

        let mut order = Vec::with_capacity(real.len() + synthetic.len());
        let mut rest = Vec::with_capacity(real.len());
        for provider in real {
            if Some(provider.key.as_str()) == preferred {
                order.push(provider);
            } else {
                rest.push(provider);
            }
        }
        order.extend(rest);
        order.extend(synthetic);
        order
    }

    /// Invoke one provider within its retry budget and per-call timeout.
    async fn attempt(
        &self,
        provider: &Provider,
        adapter: &dyn ProviderAdapter,
        request: &AdapterRequest,
        record: &mut AttemptRecord,
    ) -> std::result::Result<String, ProviderError> {
        let budget = adapter.retry_budget().max(1);
        let mut attempt = 1;

        loop {
            record.begin(&provider.key);
            let call_started = Instant::now();

            let result = match tokio::time::timeout(adapter.timeout(), adapter.complete(provider, request)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout),
            };

            match result {
                Ok(raw) => {
                    debug!(
                        provider = %provider.key,
                        attempt,
                        elapsed_ms = call_started.elapsed().as_millis() as u64,
                        reply_chars = raw.chars().count(),
                        "Provider answered"
                    );
                    return Ok(raw);
                }
                Err(err) => {
                    warn!(
                        provider = %provider.key,
                        attempt,
                        budget,
                        error = %err,
                        "Provider call failed"
                    );
                    record.fail(&err);

                    if !err.is_retryable() || attempt >= budget {
                        return Err(err);
                    }
                    attempt += 1;
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }

    async fn succeed(
        &self,
        provider: &Provider,
        raw: &str,
        record: &AttemptRecord,
        request_id: Uuid,
        started: Instant,
    ) -> NormalizedResponse {
        self.tracker.record_success(&provider.key).await;

        if !provider.is_synthetic() {
            self.set_preferred(&provider.key).await;
        }

        let fragment = self.normalizer.normalize(raw);
        let confidence = if provider.is_synthetic() {
            SYNTHETIC_CONFIDENCE
        } else {
            estimate_confidence(raw)
        };

        NormalizedResponse {
            message: fragment.message,
            suggestions: fragment.suggestions,
            action_hint: fragment.action_hint,
            provider_label: provider.display_name.clone(),
            confidence,
            metadata: ResponseMetadata {
                request_id,
                provider: Some(provider.key.clone()),
                model: Some(provider.model.clone()),
                elapsed_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
                attempted_providers: record.attempted.clone(),
                last_error: record.last_error.as_ref().map(|e| e.to_string()),
                error_class: record.last_class(),
            },
        }
    }

    async fn set_preferred(&self, key: &str) {
        let previous = {
            let mut preferred = self.preferred.write().await;
            if preferred.as_deref() == Some(key) {
                return;
            }
            preferred.replace(key.to_string())
        };

        self.router.notify(&ProviderChangeEvent::new(
            key,
            ChangeReason::Succeeded { previous },
        ));
    }
}
