//! The deck session: a single task that owns the current document and
//! applies every mutation, driven by `Op`s and reporting `Event`s.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use slidesmith_common::{GenerationRequest, PresentationDocument, SlideType};
use slidesmith_protocol::{Event, NoticeKind, Op, PlaybackState, Step, Submission};
use tokio::sync::{mpsc, Mutex};

use crate::auth::AuthState;
use crate::client::{
    ContentGenerator, GeminiAdapter, HttpImageFetcher, ImageFetcher, ResolvedVisual,
    SpeechSynthesizer, VisualSource,
};
use crate::config::Config;
use crate::deck::DeckAssembler;
use crate::error::{ExportError, GenerationError, PersistenceError, SpeechError};
use crate::narration::{AudioHandle, NarrationCache, NarrationRequester, PlayAction};
use crate::persistence::{FileDocumentStore, ProjectGateway};
use crate::visual::PixabayClient;

/// External collaborators a session calls out to.
#[derive(Clone)]
pub struct SessionServices {
    pub generator: Arc<dyn ContentGenerator>,
    pub visuals: Arc<dyn VisualSource>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub gateway: ProjectGateway,
}

impl SessionServices {
    pub fn from_config(config: &Config, auth: AuthState) -> Self {
        let gemini = Arc::new(GeminiAdapter::from_config(config));
        Self {
            generator: gemini.clone(),
            visuals: Arc::new(PixabayClient::from_config(config)),
            speech: gemini,
            fetcher: Arc::new(HttpImageFetcher::new()),
            gateway: ProjectGateway::new(Arc::new(FileDocumentStore::new(config.store_dir())), auth),
        }
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    tx_submit: mpsc::Sender<Submission>,
    rx_event: Mutex<mpsc::Receiver<Event>>,
}

pub struct SessionSpawnOk {
    pub session: Session,
}

impl Session {
    pub async fn spawn(services: SessionServices) -> Result<SessionSpawnOk> {
        let (tx_submit, rx_submit) = mpsc::channel::<Submission>(64);
        let (tx_event, rx_event) = mpsc::channel::<Event>(256);

        tx_event.send(Event::SessionConfigured {}).await?;

        tokio::spawn(async move {
            SessionLoop::new(services, tx_event).run(rx_submit).await;
        });

        let inner = Arc::new(Inner {
            tx_submit,
            rx_event: Mutex::new(rx_event),
        });
        Ok(SessionSpawnOk {
            session: Session { inner },
        })
    }

    /// Queue an operation. Returns the submission id.
    pub async fn submit(&self, op: Op) -> Result<String> {
        let submission = Submission::new(op);
        let id = submission.id.clone();
        self.inner
            .tx_submit
            .send(submission)
            .await
            .map_err(|e| anyhow::anyhow!("session closed: {e}"))?;
        Ok(id)
    }

    pub async fn next_event(&self) -> Option<Event> {
        let mut rx = self.inner.rx_event.lock().await;
        rx.recv().await
    }
}

/// Completed background work, reported back to the loop.
enum TaskResult {
    Generated {
        generation: u64,
        topic: String,
        result: Result<PresentationDocument, GenerationError>,
    },
    Loaded {
        request: u64,
        result: Result<PresentationDocument, PersistenceError>,
    },
    Visual {
        epoch: u64,
        index: usize,
        token: u64,
        visual: Option<ResolvedVisual>,
    },
    Narration {
        ticket: u64,
        index: usize,
        result: Result<AudioHandle, SpeechError>,
    },
    Exported(Result<PathBuf, ExportError>),
    Saved(Result<String, PersistenceError>),
    Deleted {
        id: String,
        result: Result<(), PersistenceError>,
    },
}

/// Slides that pick up a visual automatically on first display.
fn wants_auto_visual(slide_type: SlideType) -> bool {
    matches!(
        slide_type,
        SlideType::Title | SlideType::ImageSplit | SlideType::Chart
    )
}

struct SessionLoop {
    services: SessionServices,
    narrator: Arc<NarrationRequester>,
    assembler: Arc<DeckAssembler>,
    tx_event: mpsc::Sender<Event>,
    tx_result: mpsc::UnboundedSender<TaskResult>,
    rx_result: Option<mpsc::UnboundedReceiver<TaskResult>>,

    step: Step,
    document: Option<PresentationDocument>,
    topic: Option<String>,
    /// Bumped whenever the document is replaced or cleared.
    epoch: u64,
    /// Latest visual request token per slide.
    visual_tokens: HashMap<usize, u64>,
    next_token: u64,
    auto_requested: HashSet<usize>,
    current: usize,
    pending_generation: Option<u64>,
    generations: u64,
    pending_load: Option<u64>,
    loads: u64,
    narration: NarrationCache,
    narration_index: Option<usize>,
}

impl SessionLoop {
    fn new(services: SessionServices, tx_event: mpsc::Sender<Event>) -> Self {
        let (tx_result, rx_result) = mpsc::unbounded_channel();
        Self {
            narrator: Arc::new(NarrationRequester::new(services.speech.clone())),
            assembler: Arc::new(DeckAssembler::new(services.fetcher.clone())),
            services,
            tx_event,
            tx_result,
            rx_result: Some(rx_result),
            step: Step::Input,
            document: None,
            topic: None,
            epoch: 0,
            visual_tokens: HashMap::new(),
            next_token: 0,
            auto_requested: HashSet::new(),
            current: 0,
            pending_generation: None,
            generations: 0,
            pending_load: None,
            loads: 0,
            narration: NarrationCache::new(),
            narration_index: None,
        }
    }

    async fn run(mut self, mut rx_submit: mpsc::Receiver<Submission>) {
        let Some(mut rx_result) = self.rx_result.take() else {
            return;
        };
        loop {
            tokio::select! {
                submission = rx_submit.recv() => {
                    let Some(Submission { id, op }) = submission else { break };
                    tracing::debug!(%id, ?op, "op");
                    if matches!(op, Op::Shutdown) {
                        self.emit(Event::ShutdownComplete).await;
                        break;
                    }
                    self.handle_op(op).await;
                }
                Some(result) = rx_result.recv() => {
                    self.handle_result(result).await;
                }
            }
        }
        tracing::debug!("session loop finished");
    }

    async fn emit(&self, event: Event) {
        if self.tx_event.send(event).await.is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    async fn error(&self, message: impl Into<String>) {
        self.emit(Event::Error {
            message: message.into(),
        })
        .await;
    }

    async fn notice(&self, kind: NoticeKind, message: impl Into<String>) {
        self.emit(Event::Notice {
            kind,
            message: message.into(),
        })
        .await;
    }

    async fn set_step(&mut self, step: Step) {
        if self.step != step {
            self.step = step;
            self.emit(Event::StepChanged { step }).await;
        }
    }

    fn spawn_task<F>(&self, fut: F)
    where
        F: std::future::Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.tx_result.clone();
        tokio::spawn(async move {
            let _ = tx.send(fut.await);
        });
    }

    async fn handle_op(&mut self, op: Op) {
        match op {
            Op::Generate { request } => self.generate(request).await,
            Op::ShowSlide { index } => self.show_slide(index).await,
            Op::RegenerateVisual { index } => self.regenerate_visual(index).await,
            Op::LoadProject { id } => self.load_project(id).await,
            Op::OpenDocument { document } => {
                self.pending_load = None;
                self.pending_generation = None;
                self.replace_document(document, None).await;
            }
            Op::ClearProject => self.clear_project().await,
            Op::Export { out_dir } => self.export(out_dir).await,
            Op::Save { name } => self.save(name).await,
            Op::DeleteProject { id } => {
                let gateway = self.services.gateway.clone();
                self.spawn_task(async move {
                    let result = gateway.delete(&id).await;
                    TaskResult::Deleted { id, result }
                });
            }
            Op::ToggleNarration { index } => self.toggle_narration(index).await,
            Op::NarrationEnded => {
                self.narration.finished();
                if let Some(index) = self.narration_index {
                    self.emit_narration(index, None).await;
                }
            }
            Op::Snapshot => {
                let document = self.document.clone();
                self.emit(Event::Snapshot { document }).await;
            }
            Op::Shutdown => {}
        }
    }

    async fn handle_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Generated {
                generation,
                topic,
                result,
            } => {
                if self.pending_generation != Some(generation) {
                    tracing::debug!(generation, "dropping superseded generation");
                    return;
                }
                self.pending_generation = None;
                match result {
                    Ok(doc) => self.replace_document(doc, Some(topic)).await,
                    Err(e) => {
                        tracing::error!("generation failed: {e}");
                        self.set_step(Step::Input).await;
                        self.error(format!("Generation failed: {e}")).await;
                    }
                }
            }
            TaskResult::Loaded { request, result } => {
                if self.pending_load != Some(request) {
                    return;
                }
                self.pending_load = None;
                match result {
                    Ok(doc) => {
                        let title = doc.meta.title.clone();
                        self.replace_document(doc, Some(title)).await;
                    }
                    Err(e) => self.error(format!("Failed to load project: {e}")).await,
                }
            }
            TaskResult::Visual {
                epoch,
                index,
                token,
                visual,
            } => match visual {
                Some(visual) => {
                    if self.update_slide_image(epoch, index, token, visual.url.clone()) {
                        self.emit(Event::SlideImageUpdated {
                            index,
                            url: visual.url,
                        })
                        .await;
                    } else {
                        tracing::debug!(index, token, "dropping stale visual");
                    }
                }
                None => {
                    if self.is_latest_visual(epoch, index, token) {
                        self.emit(Event::VisualUnavailable { index }).await;
                    }
                }
            },
            TaskResult::Narration {
                ticket,
                index,
                result,
            } => {
                let current = self.narration.is_current(ticket);
                let handle = self.narration.complete(ticket, result);
                if current {
                    let audio = handle.map(|h| h.path().to_path_buf());
                    self.emit_narration(index, audio).await;
                }
            }
            TaskResult::Exported(result) => match result {
                Ok(path) => self.emit(Event::Exported { path }).await,
                Err(e) => self.error(format!("Export failed: {e}")).await,
            },
            TaskResult::Saved(result) => match result {
                Ok(id) => {
                    self.notice(NoticeKind::Success, "Project saved").await;
                    self.emit(Event::Saved { id }).await;
                }
                Err(e) => self.error(format!("Failed to save: {e}")).await,
            },
            TaskResult::Deleted { id, result } => match result {
                Ok(()) => {
                    self.notice(NoticeKind::Success, "Project deleted successfully!").await;
                    self.emit(Event::ProjectDeleted { id }).await;
                }
                Err(e) => self.error(format!("Failed to delete project: {e}")).await,
            },
        }
    }

    async fn generate(&mut self, request: GenerationRequest) {
        if request.topic.trim().is_empty() {
            self.notice(NoticeKind::Info, "Enter a topic to generate a deck").await;
            return;
        }
        if self.pending_generation.is_some() {
            self.notice(NoticeKind::Info, "A deck is already being generated").await;
            return;
        }

        self.generations += 1;
        let generation = self.generations;
        self.pending_generation = Some(generation);
        self.pending_load = None;
        self.set_step(Step::Generating).await;
        tracing::info!(topic = %request.topic, slides = request.slide_count, "generating deck");

        let generator = self.services.generator.clone();
        self.spawn_task(async move {
            let result = generator.generate(&request).await;
            TaskResult::Generated {
                generation,
                topic: request.topic,
                result,
            }
        });
    }

    /// Swap in a new document and show its first slide. All in-flight
    /// visual and narration results for the previous one become stale.
    async fn replace_document(&mut self, doc: PresentationDocument, topic: Option<String>) {
        self.epoch += 1;
        self.visual_tokens.clear();
        self.auto_requested.clear();
        self.current = 0;
        self.narration.set_script(None, None);
        self.narration_index = None;
        self.topic = topic;

        let title = doc.meta.title.clone();
        let slide_count = doc.len();
        self.document = Some(doc);

        self.emit(Event::DocumentReady { title, slide_count }).await;
        self.set_step(Step::Results).await;
        if slide_count > 0 {
            self.show_slide(0).await;
        }
    }

    async fn clear_project(&mut self) {
        self.epoch += 1;
        self.document = None;
        self.topic = None;
        self.visual_tokens.clear();
        self.auto_requested.clear();
        self.current = 0;
        self.pending_generation = None;
        self.pending_load = None;
        self.narration.set_script(None, None);
        self.narration_index = None;
        self.emit(Event::DocumentCleared).await;
        self.set_step(Step::Input).await;
    }

    fn is_latest_visual(&self, epoch: u64, index: usize, token: u64) -> bool {
        epoch == self.epoch && self.visual_tokens.get(&index) == Some(&token)
    }

    /// Record a resolved visual, unless a newer request for the slide was
    /// issued or the document changed meanwhile.
    fn update_slide_image(&mut self, epoch: u64, index: usize, token: u64, url: String) -> bool {
        if !self.is_latest_visual(epoch, index, token) {
            return false;
        }
        self.document
            .as_mut()
            .is_some_and(|doc| doc.set_slide_image(index, Some(url)))
    }

    async fn show_slide(&mut self, index: usize) {
        let Some(slide) = self.document.as_ref().and_then(|d| d.slide(index)).cloned() else {
            self.error(format!("No slide at position {}", index + 1)).await;
            return;
        };
        self.current = index;
        self.emit(Event::SlideShown { index }).await;

        let previous = self.narration_index;
        if self
            .narration
            .set_script(slide.speaker_script.as_deref(), slide.speaker_tone.as_deref())
        {
            if let Some(prev) = previous {
                self.emit_narration(prev, None).await;
            }
            self.narration_index = None;
        }

        let wants_visual = wants_auto_visual(slide.slide_type)
            && slide.visual_prompt.is_some()
            && slide.img_data.is_none();
        if wants_visual && self.auto_requested.insert(index) {
            self.request_visual(index).await;
        }
    }

    async fn regenerate_visual(&mut self, index: usize) {
        let has_prompt = self
            .document
            .as_ref()
            .and_then(|d| d.slide(index))
            .is_some_and(|s| s.visual_prompt.is_some());
        if has_prompt {
            self.request_visual(index).await;
        } else {
            self.notice(NoticeKind::Info, "This slide has no visual prompt").await;
        }
    }

    async fn request_visual(&mut self, index: usize) {
        let Some(prompt) = self
            .document
            .as_ref()
            .and_then(|d| d.slide(index))
            .and_then(|s| s.visual_prompt.clone())
        else {
            return;
        };
        self.next_token += 1;
        let token = self.next_token;
        let epoch = self.epoch;
        self.visual_tokens.insert(index, token);
        self.emit(Event::VisualRequested { index, token }).await;

        let visuals = self.services.visuals.clone();
        self.spawn_task(async move {
            let visual = visuals.resolve_visual(&prompt).await;
            TaskResult::Visual {
                epoch,
                index,
                token,
                visual,
            }
        });
    }

    async fn load_project(&mut self, id: String) {
        self.loads += 1;
        let request = self.loads;
        self.pending_load = Some(request);
        let gateway = self.services.gateway.clone();
        self.spawn_task(async move {
            let result = gateway.load(&id).await;
            TaskResult::Loaded { request, result }
        });
    }

    async fn export(&mut self, out_dir: PathBuf) {
        let Some(doc) = self.document.clone() else {
            self.error("Nothing to export yet").await;
            return;
        };
        self.notice(NoticeKind::Info, "Converting images for PowerPoint...").await;
        let assembler = self.assembler.clone();
        self.spawn_task(async move { TaskResult::Exported(assembler.export(&doc, &out_dir).await) });
    }

    async fn save(&mut self, name: Option<String>) {
        let Some(doc) = self.document.clone() else {
            self.error("Nothing to save yet").await;
            return;
        };
        let gateway = self.services.gateway.clone();
        let topic = self.topic.clone();
        self.spawn_task(async move {
            TaskResult::Saved(gateway.save(&doc, name.as_deref(), topic.as_deref()).await)
        });
    }

    async fn toggle_narration(&mut self, index: usize) {
        let Some(slide) = self.document.as_ref().and_then(|d| d.slide(index)) else {
            self.error(format!("No slide at position {}", index + 1)).await;
            return;
        };
        let script = slide.speaker_script.clone();
        let tone = slide.speaker_tone.clone();
        self.narration.set_script(script.as_deref(), tone.as_deref());
        self.narration_index = Some(index);

        match self.narration.toggle() {
            PlayAction::Pause => self.emit_narration(index, None).await,
            PlayAction::Resume(handle) => {
                self.emit_narration(index, Some(handle.path().to_path_buf()))
                    .await
            }
            PlayAction::Synthesize {
                ticket,
                script,
                tone,
            } => {
                self.emit_narration(index, None).await;
                let narrator = self.narrator.clone();
                self.spawn_task(async move {
                    let result = narrator.synthesize(&script, tone.as_deref()).await;
                    TaskResult::Narration {
                        ticket,
                        index,
                        result,
                    }
                });
            }
            PlayAction::Busy => {}
            PlayAction::Nothing => {
                self.notice(NoticeKind::Info, "This slide has no speaker script").await;
            }
        }
    }

    async fn emit_narration(&self, index: usize, audio: Option<PathBuf>) {
        let state = self.narration.state();
        let audio = if state == PlaybackState::Playing { audio } else { None };
        self.emit(Event::NarrationState {
            index,
            state,
            audio,
        })
        .await;
    }
}
