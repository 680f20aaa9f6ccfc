use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use studio_contracts::events::{EventLog, HistoryKind, StudioEvent};
use studio_contracts::history::{ImageHistory, ImageHistoryEntry, PromptHistory};
use studio_contracts::image_data::{download_file_name, ImageData};
use studio_contracts::models::{Capability, ModelSelector, ModelSpec};
use studio_contracts::prompts::{CreateFunction, EditFunction, PromptFunction, PromptRequest};
use studio_contracts::storage::{FileStorage, HistoryStorage};
use tracing::{info, warn};

use crate::config::StudioConfig;
use crate::providers::{EditRequest, GenerateRequest, ImageService, ServiceRegistry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StudioError {
    /// Missing input; the request was never sent.
    #[error("{0}")]
    Validation(String),
    #[error("a request is already in progress")]
    Busy,
    #[error("the image could not be generated, try again")]
    NoImage,
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    InvalidImage(String),
    #[error("{0}")]
    NothingSelected(String),
    #[error("failed to save image: {0}")]
    Save(String),
}

impl StudioError {
    fn validation(message: &str) -> Self {
        StudioError::Validation(message.to_string())
    }
}

/// Source image slots. Compose reads both, every other edit reads the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    First,
    Second,
}

/// Shared "request outstanding" flag. Holding an [`InFlight`] ticket makes
/// every other submission fail with [`StudioError::Busy`].
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    busy: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl RequestGate {
    pub fn try_begin(&self) -> Option<InFlight> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// One user's working session: source images, the result on screen, and
/// the two persisted histories.
pub struct Studio {
    config: StudioConfig,
    services: ServiceRegistry,
    selector: ModelSelector,
    prompts: PromptHistory,
    images: ImageHistory,
    events: EventLog,
    gate: RequestGate,
    slots: [Option<ImageData>; 2],
    current: Option<ImageHistoryEntry>,
}

impl Studio {
    pub fn new(config: StudioConfig, services: ServiceRegistry) -> Self {
        let storage: Arc<dyn HistoryStorage> = Arc::new(FileStorage::new(config.storage_path()));
        let events = EventLog::for_new_session(config.events_path());
        Self::with_storage(config, services, storage, events)
    }

    pub fn with_storage(
        config: StudioConfig,
        services: ServiceRegistry,
        storage: Arc<dyn HistoryStorage>,
        events: EventLog,
    ) -> Self {
        Self {
            config,
            services,
            selector: ModelSelector::new(None),
            prompts: PromptHistory::prompts(storage.clone()),
            images: ImageHistory::images(storage),
            events,
            gate: RequestGate::default(),
            slots: [None, None],
            current: None,
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn gate(&self) -> RequestGate {
        self.gate.clone()
    }

    pub fn prompt_history(&self) -> &PromptHistory {
        &self.prompts
    }

    pub fn image_history(&self) -> &ImageHistory {
        &self.images
    }

    pub fn current(&self) -> Option<&ImageHistoryEntry> {
        self.current.as_ref()
    }

    pub fn image(&self, slot: Slot) -> Option<&ImageData> {
        self.slots[slot_index(slot)].as_ref()
    }

    pub fn set_image(&mut self, slot: Slot, image: Option<ImageData>) {
        self.slots[slot_index(slot)] = image;
    }

    pub fn load_image(&mut self, slot: Slot, path: &Path) -> Result<(), StudioError> {
        let image = ImageData::from_path(path)
            .map_err(|err| StudioError::InvalidImage(format!("{err:#}")))?;
        self.set_image(slot, Some(image));
        Ok(())
    }

    /// Validates, records the prompt, calls the service and records the
    /// result. The prompt history is only touched once validation passed.
    pub fn generate(&mut self, request: &PromptRequest) -> Result<ImageHistoryEntry, StudioError> {
        validate_text(request)?;
        let images = self.source_images(request)?;
        let _ticket = self.gate.try_begin().ok_or(StudioError::Busy)?;

        self.prompts.record(request.history_text().to_string());
        self.events.record(StudioEvent::GenerationStarted {
            function: request.function(),
            aspect_ratio: request.aspect_ratio(),
            source_images: images.len(),
            source_id: None,
        });

        let final_prompt = request.final_prompt();
        let outcome = match request.function() {
            PromptFunction::Create(_) => self.call_generate(request, final_prompt),
            PromptFunction::Edit(_) => self.call_edit(final_prompt, images),
        };
        self.finish(outcome, request.history_text().to_string())
    }

    /// Upscales the image currently shown, keeping its prompt.
    pub fn upscale_current(&mut self) -> Result<ImageHistoryEntry, StudioError> {
        let Some(current) = self.current.clone() else {
            return Err(StudioError::NothingSelected("No image to upscale.".to_string()));
        };
        let image = ImageData::from_data_url(&current.url)
            .map_err(|err| StudioError::InvalidImage(format!("{err:#}")))?;
        let _ticket = self.gate.try_begin().ok_or(StudioError::Busy)?;

        let request = PromptRequest::edit(EditFunction::Upscale, "");
        self.events.record(StudioEvent::GenerationStarted {
            function: request.function(),
            aspect_ratio: request.aspect_ratio(),
            source_images: 1,
            source_id: Some(image_fingerprint(&current.url)),
        });
        let outcome = self.call_edit(request.final_prompt(), vec![image]);
        self.finish(outcome, current.prompt)
    }

    pub fn select_from_history(&mut self, index: usize) -> Result<ImageHistoryEntry, StudioError> {
        let entry = self.images.get(index).cloned().ok_or_else(|| {
            StudioError::NothingSelected(format!("No image at history position {}.", index + 1))
        })?;
        self.current = Some(entry.clone());
        Ok(entry)
    }

    /// Moves the current result into the first source slot so the next
    /// edit applies to it.
    pub fn edit_current(&mut self) -> Result<(), StudioError> {
        let Some(current) = self.current.as_ref() else {
            return Err(StudioError::NothingSelected("No image to edit.".to_string()));
        };
        let image = ImageData::from_data_url(&current.url)
            .map_err(|err| StudioError::InvalidImage(format!("{err:#}")))?;
        self.slots = [Some(image), None];
        Ok(())
    }

    /// Writes the current result as PNG. A directory target gets a file
    /// name derived from the prompt.
    pub fn save_current(&self, target: &Path) -> Result<PathBuf, StudioError> {
        let Some(current) = self.current.as_ref() else {
            return Err(StudioError::NothingSelected("No image to save.".to_string()));
        };
        let image = ImageData::from_data_url(&current.url)
            .map_err(|err| StudioError::InvalidImage(format!("{err:#}")))?;
        let bytes = image
            .decode_bytes()
            .map_err(|err| StudioError::InvalidImage(format!("{err:#}")))?;
        let path = if target.is_dir() {
            let path = target.join(download_file_name(&current.prompt));
            if path.parent() != Some(target) {
                return Err(StudioError::Save(format!(
                    "{} is outside {}",
                    path.display(),
                    target.display()
                )));
            }
            path
        } else {
            target.to_path_buf()
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| StudioError::Save(format!("{}: {err}", parent.display())))?;
        }
        std::fs::write(&path, bytes)
            .map_err(|err| StudioError::Save(format!("{}: {err}", path.display())))?;
        info!(path = %path.display(), "saved image");
        Ok(path)
    }

    pub fn clear_image_history(&mut self) {
        self.images.clear();
        self.events
            .record(StudioEvent::HistoryCleared {
                history: HistoryKind::Images,
            });
    }

    pub fn clear_prompt_history(&mut self) {
        self.prompts.clear();
        self.events
            .record(StudioEvent::HistoryCleared {
                history: HistoryKind::Prompts,
            });
    }

    /// Starts over: no source images and nothing on screen. Histories stay.
    pub fn reset(&mut self) {
        self.slots = [None, None];
        self.current = None;
    }

    fn source_images(&self, request: &PromptRequest) -> Result<Vec<ImageData>, StudioError> {
        let PromptFunction::Edit(function) = request.function() else {
            return Ok(Vec::new());
        };
        match function {
            EditFunction::Compose => match (&self.slots[0], &self.slots[1]) {
                (Some(first), Some(second)) => Ok(vec![first.clone(), second.clone()]),
                _ => Err(StudioError::validation("Upload two images to combine.")),
            },
            _ => self.slots[0]
                .clone()
                .map(|image| vec![image])
                .ok_or_else(|| StudioError::validation("Upload an image to edit.")),
        }
    }

    fn call_generate(
        &self,
        request: &PromptRequest,
        final_prompt: String,
    ) -> Result<Option<ImageData>, StudioError> {
        let model = self.resolve_model(Capability::Generate)?;
        let service = self.service_for(&model)?;
        service
            .generate(&GenerateRequest {
                prompt: final_prompt,
                aspect_ratio: request.aspect_ratio(),
                model: model.name,
            })
            .map_err(|err| StudioError::Service(format!("{err:#}")))
    }

    fn call_edit(
        &self,
        final_prompt: String,
        images: Vec<ImageData>,
    ) -> Result<Option<ImageData>, StudioError> {
        let model = self.resolve_model(Capability::Edit)?;
        let service = self.service_for(&model)?;
        service
            .edit(&EditRequest {
                prompt: final_prompt,
                images,
                model: model.name,
            })
            .map_err(|err| StudioError::Service(format!("{err:#}")))
    }

    fn finish(
        &mut self,
        outcome: Result<Option<ImageData>, StudioError>,
        prompt: String,
    ) -> Result<ImageHistoryEntry, StudioError> {
        let result = outcome.and_then(|image| image.ok_or(StudioError::NoImage));
        match result {
            Ok(image) => {
                let entry = ImageHistoryEntry::new(image.to_data_url(), prompt);
                self.events.record(StudioEvent::GenerationFinished {
                    image_id: image_fingerprint(&entry.url),
                    mime_type: image.mime_type,
                });
                self.images.record(entry.clone());
                self.current = Some(entry.clone());
                Ok(entry)
            }
            Err(err) => {
                warn!(error = %err, "generation failed");
                self.events.record(StudioEvent::GenerationFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn resolve_model(&self, capability: Capability) -> Result<ModelSpec, StudioError> {
        if let Some(provider) = self.config.provider.as_deref() {
            return self
                .selector
                .select_for_provider(provider, capability)
                .ok_or_else(|| {
                    StudioError::Service(format!(
                        "Provider '{provider}' has no model for capability '{capability}'."
                    ))
                });
        }
        let requested = match capability {
            Capability::Generate => self.config.image_model.as_deref(),
            Capability::Edit => self.config.edit_model.as_deref(),
        };
        let selection = self
            .selector
            .select(requested, capability)
            .map_err(StudioError::Service)?;
        if let Some(reason) = selection.fallback_reason.as_deref() {
            warn!(model = %selection.model.name, "{reason}");
        }
        Ok(selection.model)
    }

    fn service_for(
        &self,
        model: &ModelSpec,
    ) -> Result<&dyn ImageService, StudioError> {
        self.services.get(&model.provider).ok_or_else(|| {
            StudioError::Service(format!(
                "No image service registered for provider '{}'.",
                model.provider
            ))
        })
    }
}

fn validate_text(request: &PromptRequest) -> Result<(), StudioError> {
    match request.function() {
        PromptFunction::Create(CreateFunction::TextEffect) => {
            let has_text = request
                .text_effect()
                .map(|effect| !effect.text.trim().is_empty())
                .unwrap_or(false);
            if !has_text {
                return Err(StudioError::validation("Enter the text for the effect."));
            }
        }
        PromptFunction::Create(_) => {
            if request.prompt().trim().is_empty() {
                return Err(StudioError::validation(
                    "Describe the image you want to create.",
                ));
            }
        }
        PromptFunction::Edit(EditFunction::Blur | EditFunction::Upscale) => {}
        PromptFunction::Edit(_) => {
            if request.prompt().trim().is_empty() {
                return Err(StudioError::validation("Describe the edit you want to make."));
            }
        }
    }
    Ok(())
}

fn slot_index(slot: Slot) -> usize {
    match slot {
        Slot::First => 0,
        Slot::Second => 1,
    }
}

/// Short stable id for an image URL, so logs never carry the payload.
pub fn image_fingerprint(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..6])
}
