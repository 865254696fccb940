// src/assistant.rs
// The two task instantiations wired to shared session state

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{self, AppConfig};
use crate::locale::{LocaleProvider, LocaleStore};
use crate::registry::{ModelRegistry, ProviderModel};
use crate::summarize::{self, SummarizeAdapter, SummarizeRequest};
use crate::task::{
    OperationError, PanelSurface, TaskController, TaskOperation, TaskSurface, TaskTextKeys,
    ValidationError,
};
use crate::transcribe::{self, AudioPayload, TranscribeAdapter};

/// Mutable slots shared between the two tasks and the embedding application.
/// Passed around by reference at construction; nothing here is ambient.
#[derive(Clone, Default)]
struct SessionState {
    api_key: Arc<Mutex<Option<String>>>,
    audio: Arc<Mutex<Option<AudioPayload>>>,
    keywords: Arc<Mutex<String>>,
}

impl SessionState {
    fn has_api_key(&self) -> bool {
        self.api_key
            .lock()
            .unwrap()
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

pub struct TranscribeInput {
    adapter: Arc<dyn TranscribeAdapter>,
    audio: AudioPayload,
    model: String,
}

/// Transcription task: uploads the selected audio payload to the selected
/// provider.
pub struct TranscribeOperation {
    session: SessionState,
    providers: Arc<Mutex<transcribe::ProviderSet>>,
    selection: Arc<Mutex<ProviderModel>>,
}

#[async_trait]
impl TaskOperation for TranscribeOperation {
    type Input = TranscribeInput;

    fn prepare(&self) -> Result<TranscribeInput, ValidationError> {
        let selection = self.selection.lock().unwrap().clone();
        let adapter = self
            .providers
            .lock()
            .unwrap()
            .get(&selection.provider)
            .ok_or(ValidationError::new("error_incorrect_api_key"))?;
        if selection.provider == "OpenAI" && !self.session.has_api_key() {
            return Err(ValidationError::new("error_incorrect_api_key"));
        }
        let audio = self
            .session
            .audio
            .lock()
            .unwrap()
            .clone()
            .ok_or(ValidationError::new("transcribe_section_disabled_tooltip"))?;
        Ok(TranscribeInput {
            adapter,
            audio,
            model: selection.model_name,
        })
    }

    fn ready(&self) -> bool {
        self.session.audio.lock().unwrap().is_some()
    }

    async fn execute(
        &self,
        input: TranscribeInput,
        token: CancellationToken,
    ) -> Result<String, OperationError> {
        input.adapter.transcribe(&input.audio, &input.model, &token).await
    }
}

pub struct SummarizeInput {
    adapter: Arc<dyn SummarizeAdapter>,
    request: SummarizeRequest,
    model: String,
}

/// Summarization task: sends the transcription box's content through the
/// selected chat model, with the clinical prompt and keyword requirements.
pub struct SummarizeOperation {
    session: SessionState,
    providers: Arc<Mutex<summarize::ProviderSet>>,
    selection: Arc<Mutex<ProviderModel>>,
    config: Arc<Mutex<AppConfig>>,
    /// The transcription panel; its result buffer is this task's source
    /// material.
    source: Arc<dyn TaskSurface>,
    locale: Arc<dyn LocaleProvider>,
}

impl SummarizeOperation {
    /// Source text, unless the box still holds an in-progress placeholder.
    fn source_content(&self) -> Option<String> {
        let content = self.source.result_text().trim().to_string();
        if content.is_empty() {
            return None;
        }
        if self.locale.progress_phrases().iter().any(|p| p == &content) {
            return None;
        }
        Some(content)
    }
}

#[async_trait]
impl TaskOperation for SummarizeOperation {
    type Input = SummarizeInput;

    fn prepare(&self) -> Result<SummarizeInput, ValidationError> {
        if !self.session.has_api_key() {
            return Err(ValidationError::new("error_incorrect_api_key"));
        }
        let content = self
            .source_content()
            .ok_or(ValidationError::new("summarize_section_disabled_tooltip"))?;
        let selection = self.selection.lock().unwrap().clone();
        let adapter = self
            .providers
            .lock()
            .unwrap()
            .get(&selection.provider)
            .ok_or(ValidationError::new("error_incorrect_api_key"))?;

        let (base_prompt, examples) = {
            let config = self.config.lock().unwrap();
            (config.system_prompt.clone(), config.examples_wrapped.clone())
        };
        let keywords = self.session.keywords.lock().unwrap().clone();
        let system_prompt = summarize::compose_system_prompt(&base_prompt, &keywords, &examples);

        Ok(SummarizeInput {
            adapter,
            request: SummarizeRequest {
                system_prompt,
                content,
            },
            model: selection.model_name,
        })
    }

    fn ready(&self) -> bool {
        self.source_content().is_some()
    }

    async fn execute(
        &self,
        input: SummarizeInput,
        token: CancellationToken,
    ) -> Result<String, OperationError> {
        input
            .adapter
            .summarize(&input.request, &input.model, &token)
            .await
    }
}

/// The assembled assistant: one transcription task and one summarization
/// task over shared session state, with settings persistence and locale
/// switching.
pub struct Assistant {
    config: Arc<Mutex<AppConfig>>,
    locale: Arc<LocaleStore>,
    session: SessionState,
    transcription: TaskController<TranscribeOperation>,
    summarization: TaskController<SummarizeOperation>,
    transcription_panel: Arc<PanelSurface>,
    summary_panel: Arc<PanelSurface>,
    transcribe_selection: Arc<Mutex<ProviderModel>>,
    summary_selection: Arc<Mutex<ProviderModel>>,
    transcribe_providers: Arc<Mutex<transcribe::ProviderSet>>,
    summarize_providers: Arc<Mutex<summarize::ProviderSet>>,
}

impl Assistant {
    pub fn new(
        config: AppConfig,
        locale: Arc<LocaleStore>,
        transcribe_registry: &ModelRegistry,
        summary_registry: &ModelRegistry,
    ) -> Self {
        let api_key = config.api_key();
        let transcribe_providers = transcribe::ProviderSet::from_api_key(api_key.as_deref());
        let summarize_providers = summarize::ProviderSet::from_api_key(api_key.as_deref());
        Self::with_providers(
            config,
            locale,
            transcribe_registry,
            summary_registry,
            transcribe_providers,
            summarize_providers,
        )
    }

    pub fn with_providers(
        config: AppConfig,
        locale: Arc<LocaleStore>,
        transcribe_registry: &ModelRegistry,
        summary_registry: &ModelRegistry,
        transcribe_providers: transcribe::ProviderSet,
        summarize_providers: summarize::ProviderSet,
    ) -> Self {
        locale.set_active(&config.locale);

        let session = SessionState::default();
        *session.api_key.lock().unwrap() = config.api_key();

        let transcribe_selection = Arc::new(Mutex::new(
            transcribe_registry
                .restore(config.transcribe_model.as_deref())
                .unwrap_or_else(|| ProviderModel::new("OpenAI", "whisper-1")),
        ));
        let summary_selection = Arc::new(Mutex::new(
            summary_registry
                .restore(config.summary_model.as_deref())
                .unwrap_or_else(|| ProviderModel::new("OpenAI", "gpt-4.1")),
        ));

        let transcribe_providers = Arc::new(Mutex::new(transcribe_providers));
        let summarize_providers = Arc::new(Mutex::new(summarize_providers));
        let config = Arc::new(Mutex::new(config));

        let transcription_panel = Arc::new(PanelSurface::new());
        let summary_panel = Arc::new(PanelSurface::new());

        let transcription = TaskController::new(
            Arc::new(TranscribeOperation {
                session: session.clone(),
                providers: transcribe_providers.clone(),
                selection: transcribe_selection.clone(),
            }),
            transcription_panel.clone(),
            locale.clone(),
            TaskTextKeys::transcription(),
        );

        let summarization = TaskController::new(
            Arc::new(SummarizeOperation {
                session: session.clone(),
                providers: summarize_providers.clone(),
                selection: summary_selection.clone(),
                config: config.clone(),
                source: transcription_panel.clone(),
                locale: locale.clone(),
            }),
            summary_panel.clone(),
            locale.clone(),
            TaskTextKeys::summarization(),
        );

        Self {
            config,
            locale,
            session,
            transcription,
            summarization,
            transcription_panel,
            summary_panel,
            transcribe_selection,
            summary_selection,
            transcribe_providers,
            summarize_providers,
        }
    }

    pub fn transcription(&self) -> &TaskController<TranscribeOperation> {
        &self.transcription
    }

    pub fn summarization(&self) -> &TaskController<SummarizeOperation> {
        &self.summarization
    }

    pub fn transcription_panel(&self) -> &Arc<PanelSurface> {
        &self.transcription_panel
    }

    pub fn summary_panel(&self) -> &Arc<PanelSurface> {
        &self.summary_panel
    }

    pub fn transcription_text(&self) -> String {
        self.transcription_panel.result_text()
    }

    /// Stage the audio payload to transcribe and update the action control
    /// accordingly.
    pub fn set_audio(&self, payload: Option<AudioPayload>) {
        *self.session.audio.lock().unwrap() = payload;
        self.transcription.sync_action_enabled();
    }

    pub fn set_keywords(&self, keywords: &str) {
        *self.session.keywords.lock().unwrap() = keywords.to_string();
    }

    /// Store the credential and rebuild the provider sets that depend on it.
    pub fn set_api_key(&self, api_key: &str) {
        let trimmed = api_key.trim();
        *self.session.api_key.lock().unwrap() = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self.config.lock().unwrap().set_api_key(api_key);

        let key = if trimmed.is_empty() { None } else { Some(trimmed) };
        *self.transcribe_providers.lock().unwrap() = transcribe::ProviderSet::from_api_key(key);
        *self.summarize_providers.lock().unwrap() = summarize::ProviderSet::from_api_key(key);
    }

    /// Switch display language and re-render both tasks' text.
    pub fn set_locale(&self, lang: &str) {
        let lang = config::normalize_locale(lang);
        if self.locale.set_active(&lang) {
            self.config.lock().unwrap().locale = lang;
            self.transcription.refresh_locale();
            self.summarization.refresh_locale();
        }
    }

    pub fn select_transcribe_model(&self, selection: ProviderModel) {
        self.config.lock().unwrap().transcribe_model = Some(selection.persist_key());
        *self.transcribe_selection.lock().unwrap() = selection;
    }

    pub fn select_summary_model(&self, selection: ProviderModel) {
        self.config.lock().unwrap().summary_model = Some(selection.persist_key());
        *self.summary_selection.lock().unwrap() = selection;
    }

    pub fn transcribe_selection(&self) -> ProviderModel {
        self.transcribe_selection.lock().unwrap().clone()
    }

    pub fn summary_selection(&self) -> ProviderModel {
        self.summary_selection.lock().unwrap().clone()
    }

    pub fn config_snapshot(&self) -> AppConfig {
        self.config.lock().unwrap().clone()
    }

    pub fn save_config(&self, dir: &Path) -> Result<(), String> {
        let config = self.config.lock().unwrap().clone();
        config::save(dir, &config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::registry::ModelRegistry;
    use crate::task::{StatusKind, TaskState};

    struct FakeTranscribe {
        text: &'static str,
        seen_model: Mutex<Option<String>>,
    }

    impl FakeTranscribe {
        fn new(text: &'static str) -> Self {
            Self {
                text,
                seen_model: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TranscribeAdapter for FakeTranscribe {
        async fn transcribe(
            &self,
            _audio: &AudioPayload,
            model: &str,
            _token: &CancellationToken,
        ) -> Result<String, OperationError> {
            *self.seen_model.lock().unwrap() = Some(model.to_string());
            Ok(self.text.to_string())
        }

        fn name(&self) -> &str {
            "fake-stt"
        }
    }

    struct FakeSummarize;

    #[async_trait]
    impl SummarizeAdapter for FakeSummarize {
        async fn summarize(
            &self,
            request: &SummarizeRequest,
            _model: &str,
            _token: &CancellationToken,
        ) -> Result<String, OperationError> {
            Ok(format!("summary of: {}", request.content))
        }

        fn name(&self) -> &str {
            "fake-llm"
        }
    }

    fn registries() -> (ModelRegistry, ModelRegistry) {
        (
            ModelRegistry::fallback_transcription(),
            ModelRegistry::fallback_summarization(),
        )
    }

    fn assistant_with_fakes(config: AppConfig) -> (Assistant, Arc<FakeTranscribe>) {
        let (tr, sr) = registries();
        let stt = Arc::new(FakeTranscribe::new("tere doktor"));
        let assistant = Assistant::with_providers(
            config,
            Arc::new(LocaleStore::bundled()),
            &tr,
            &sr,
            transcribe::ProviderSet::new().with_adapter("OpenAI", stt.clone()),
            summarize::ProviderSet::new().with_adapter("OpenAI", Arc::new(FakeSummarize)),
        );
        (assistant, stt)
    }

    fn payload() -> AudioPayload {
        AudioPayload {
            file_name: "visit.wav".to_string(),
            mime: "audio/wav".to_string(),
            bytes: vec![0u8; 16],
        }
    }

    async fn drain() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn transcription_feeds_summarization() {
        let mut config = AppConfig::default();
        config.set_api_key("sk-test");
        let (assistant, stt) = assistant_with_fakes(config);

        assistant.set_audio(Some(payload()));
        assistant.transcription().start();
        drain().await;

        assert_eq!(assistant.transcription().state(), TaskState::Succeeded);
        assert_eq!(assistant.transcription_text(), "tere doktor");
        // The call carried the selected model.
        assert_eq!(stt.seen_model.lock().unwrap().as_deref(), Some("whisper-1"));

        assistant.summarization().start();
        drain().await;

        assert_eq!(assistant.summarization().state(), TaskState::Succeeded);
        assert_eq!(
            assistant.summary_panel().result_text(),
            "summary of: tere doktor"
        );
    }

    #[tokio::test]
    async fn summarize_without_source_material_is_rejected_inline() {
        let mut config = AppConfig::default();
        config.set_api_key("sk-test");
        let (assistant, _) = assistant_with_fakes(config);

        assistant.summarization().start();
        drain().await;

        assert_eq!(assistant.summarization().state(), TaskState::Idle);
        let (kind, text) = assistant
            .summary_panel()
            .snapshot()
            .status
            .expect("validation notice");
        assert_eq!(kind, StatusKind::Error);
        assert_eq!(text, "Lisa kõigepealt transkriptsioon");
    }

    #[tokio::test]
    async fn missing_credential_blocks_both_tasks() {
        let (assistant, _) = assistant_with_fakes(AppConfig::default());
        assistant.set_audio(Some(payload()));

        assistant.transcription().start();
        assistant.summarization().start();
        drain().await;

        assert_eq!(assistant.transcription().state(), TaskState::Idle);
        assert_eq!(assistant.summarization().state(), TaskState::Idle);
    }

    #[tokio::test]
    async fn progress_placeholder_is_not_source_material() {
        let mut config = AppConfig::default();
        config.set_api_key("sk-test");
        let (assistant, _) = assistant_with_fakes(config);

        assistant
            .transcription_panel()
            .set_result_text("Transkribeerin...");
        assistant.summarization().start();
        drain().await;

        assert_eq!(assistant.summarization().state(), TaskState::Idle);
    }

    #[tokio::test]
    async fn selected_models_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"{
            "OpenAI": [
                { "modelName": "whisper-1", "localeKey": "model_whisper", "default": true }
            ],
            "TalTech": [
                { "modelName": "subtitreeri", "localeKey": "model_bark" }
            ]
        }"#;
        let registry = ModelRegistry::parse(doc).unwrap();
        let summary_registry = ModelRegistry::fallback_summarization();

        {
            let config = crate::config::load_or_create(dir.path()).unwrap();
            let assistant = Assistant::with_providers(
                config,
                Arc::new(LocaleStore::bundled()),
                &registry,
                &summary_registry,
                transcribe::ProviderSet::new(),
                summarize::ProviderSet::new(),
            );
            assistant.select_transcribe_model(ProviderModel::new("TalTech", "subtitreeri"));
            assistant.save_config(dir.path()).unwrap();
        }

        let config = crate::config::load_or_create(dir.path()).unwrap();
        let assistant = Assistant::with_providers(
            config,
            Arc::new(LocaleStore::bundled()),
            &registry,
            &summary_registry,
            transcribe::ProviderSet::new(),
            summarize::ProviderSet::new(),
        );
        assert_eq!(
            assistant.transcribe_selection(),
            ProviderModel::new("TalTech", "subtitreeri")
        );
        // The summarization selector was never touched and restores to the
        // registry default.
        assert_eq!(
            assistant.summary_selection(),
            ProviderModel::new("OpenAI", "gpt-4.1")
        );
    }

    #[tokio::test]
    async fn locale_switch_rerenders_validation_free_panels() {
        let mut config = AppConfig::default();
        config.set_api_key("sk-test");
        let (assistant, _) = assistant_with_fakes(config);

        assert_eq!(
            assistant.transcription_panel().snapshot().action_label,
            "Transkribeeri"
        );
        assistant.set_locale("eng");
        assert_eq!(
            assistant.transcription_panel().snapshot().action_label,
            "Transcribe"
        );
        assert_eq!(assistant.config_snapshot().locale, "eng");
    }
}
