mod attach;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::seq::IndexedRandom;
use slidesmith_common::{create_slug, GenerationRequest, PresentationDocument, SAMPLE_TOPICS};
use slidesmith_core::auth::{AuthState, User};
use slidesmith_core::client::{GeminiAdapter, HttpImageFetcher};
use slidesmith_core::config::Config;
use slidesmith_core::deck::DeckAssembler;
use slidesmith_core::narration::NarrationRequester;
use slidesmith_core::persistence::{FileDocumentStore, ProjectGateway};
use slidesmith_core::session::{Session, SessionServices, SessionSpawnOk};
use slidesmith_protocol::{Event, NoticeKind, Op};
use tracing_subscriber::EnvFilter;

pub use attach::read_attachment;

#[derive(Parser)]
#[command(name = "slidesmith")]
#[command(about = "Generate, narrate and export slide decks with Gemini")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Override the generation model
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a deck and export it
    Generate {
        /// Deck topic; a sample topic is picked when omitted
        topic: Option<String>,
        /// Number of slides to generate
        #[arg(short = 'n', long, default_value_t = GenerationRequest::DEFAULT_SLIDE_COUNT)]
        count: usize,
        /// Visual style hint
        #[arg(long, default_value = GenerationRequest::DEFAULT_STYLE)]
        style: String,
        /// Context files (text or images)
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
        /// Output directory for the deck
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        /// Resolve stock photos for slides that ask for one
        #[arg(long)]
        images: bool,
        /// Save the project under this name
        #[arg(long)]
        save: Option<String>,
        /// Also write the document as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Browse a deck interactively
    View {
        /// Saved project to open
        #[arg(long, conflicts_with = "file")]
        project: Option<String>,
        /// Document JSON to open
        #[arg(long)]
        file: Option<PathBuf>,
        /// Where exports from the viewer go
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Export a document JSON file as a presentation
    Export {
        file: PathBuf,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a slide's narration as WAV
    Narrate {
        file: PathBuf,
        /// Slide number, starting at 1
        index: usize,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Manage saved projects
    Projects {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Sign in so projects can be saved
    Login {
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the signed-in user
    Logout,
    /// Show or change stored settings
    Settings {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        pixabay_key: Option<String>,
        #[arg(long = "set-model")]
        set_model: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    List,
    Show { id: String },
    Delete { id: String },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load();
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }

    let interactive = matches!(cli.command, None | Some(Commands::View { .. }));
    if interactive {
        init_file_logging(cli.debug, &config.log_file())?;
    } else {
        init_logging(cli.debug);
    }

    match cli.command {
        Some(Commands::Generate {
            topic,
            count,
            style,
            attachments,
            out,
            images,
            save,
            json,
        }) => {
            let topic = match topic {
                Some(t) if !t.trim().is_empty() => t,
                _ => {
                    let t = sample_topic(&mut rand::rng());
                    println!("No topic given, surprising you with: {t}");
                    t.to_string()
                }
            };
            let attachments = attachments
                .iter()
                .map(|p| read_attachment(p))
                .collect::<Result<Vec<_>>>()?;
            let request = GenerationRequest {
                topic,
                slide_count: count,
                style,
                attachments,
            };
            let opts = GenerateOptions {
                out,
                images,
                save,
                json,
            };
            generate_deck(&config, request, opts).await?;
        }
        Some(Commands::View { project, file, out }) => {
            view(&config, project, file, out).await?;
        }
        None => {
            view(&config, None, None, PathBuf::from(".")).await?;
        }
        Some(Commands::Export { file, out }) => {
            let doc = read_document(&file)?;
            let assembler = DeckAssembler::new(Arc::new(HttpImageFetcher::new()));
            let path = assembler.export(&doc, &out).await?;
            println!("Deck saved to: {}", path.display());
        }
        Some(Commands::Narrate { file, index, out }) => {
            narrate(&config, &file, index, out).await?;
        }
        Some(Commands::Projects { action }) => {
            projects(&config, action).await?;
        }
        Some(Commands::Login { name, email }) => {
            let user = User::new(name, email);
            update_settings(|c| c.user = Some(user.clone()))?;
            println!("Signed in as {}", user.display_name);
        }
        Some(Commands::Logout) => {
            update_settings(|c| c.user = None)?;
            println!("Signed out");
        }
        Some(Commands::Settings {
            api_key,
            pixabay_key,
            set_model,
        }) => {
            settings(api_key, pixabay_key, set_model)?;
        }
    }

    Ok(())
}

fn env_filter(debug: bool) -> EnvFilter {
    let default = if debug { "debug" } else { "warn" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn init_logging(debug: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The viewer owns the terminal, so logs go to a file instead.
fn init_file_logging(debug: bool, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn sample_topic<R: rand::Rng + ?Sized>(rng: &mut R) -> &'static str {
    SAMPLE_TOPICS.choose(rng).copied().unwrap_or("Future of AI")
}

fn read_document(path: &Path) -> Result<PresentationDocument> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a deck document", path.display()))
}

fn gateway(config: &Config) -> ProjectGateway {
    ProjectGateway::new(
        Arc::new(FileDocumentStore::new(config.store_dir())),
        AuthState::new(config.user.clone()),
    )
}

fn update_settings(change: impl FnOnce(&mut Config)) -> Result<()> {
    let path = Config::settings_path()?;
    let mut stored = Config::load_file_or_default(&path)?;
    change(&mut stored);
    stored.save_to_file(&path)?;
    Ok(())
}

fn mask(key: Option<&str>) -> String {
    match key {
        Some(k) if k.chars().count() > 4 => {
            let tail: String = k.chars().skip(k.chars().count() - 4).collect();
            format!("…{tail}")
        }
        Some(_) => "set".to_string(),
        None => "not set".to_string(),
    }
}

fn settings(api_key: Option<String>, pixabay_key: Option<String>, model: Option<String>) -> Result<()> {
    let changed = api_key.is_some() || pixabay_key.is_some() || model.is_some();
    if changed {
        update_settings(|c| {
            if let Some(k) = api_key {
                c.gemini_api_key = Some(k);
            }
            if let Some(k) = pixabay_key {
                c.pixabay_api_key = Some(k);
            }
            if let Some(m) = model {
                c.model = m;
            }
        })?;
        println!("Settings saved to {}", Config::settings_path()?.display());
    }

    let config = Config::load();
    println!("Gemini key:   {}", mask(config.gemini_api_key.as_deref()));
    println!("Pixabay key:  {}", mask(config.pixabay_api_key.as_deref()));
    println!("Model:        {}", config.model);
    println!("TTS model:    {}", config.tts_model);
    println!("Projects dir: {}", config.store_dir().display());
    match config.user {
        Some(user) => println!("Signed in:    {}", user.display_name),
        None => println!("Signed in:    no"),
    }
    Ok(())
}

struct GenerateOptions {
    out: PathBuf,
    images: bool,
    save: Option<String>,
    json: Option<PathBuf>,
}

/// Pull events until `f` yields a value. Notices are printed and error
/// events abort the wait.
async fn wait_for<T>(session: &Session, mut f: impl FnMut(Event) -> Option<T>) -> Result<T> {
    loop {
        let event = session
            .next_event()
            .await
            .ok_or_else(|| anyhow!("session ended unexpectedly"))?;
        match event {
            Event::Error { message } => bail!(message),
            Event::Notice { kind, message } => match kind {
                NoticeKind::Info => println!("{message}"),
                NoticeKind::Success => println!("✓ {message}"),
            },
            other => {
                if let Some(value) = f(other) {
                    return Ok(value);
                }
            }
        }
    }
}

async fn generate_deck(config: &Config, request: GenerationRequest, opts: GenerateOptions) -> Result<()> {
    let services = SessionServices::from_config(config, AuthState::new(config.user.clone()));
    let SessionSpawnOk { session } = Session::spawn(services).await?;
    run_generation(&session, request, opts).await
}

async fn run_generation(session: &Session, request: GenerationRequest, opts: GenerateOptions) -> Result<()> {
    println!(
        "Generating {} slides ({}) for: {}",
        request.slide_count, request.style, request.topic
    );
    session.submit(Op::Generate { request }).await?;
    let (title, slide_count) = wait_for(session, |ev| match ev {
        Event::DocumentReady { title, slide_count } => Some((title, slide_count)),
        _ => None,
    })
    .await?;
    println!("Generated \"{title}\" with {slide_count} slides");

    // Showing the first slide may already have asked for a visual; the
    // export must not start before it lands.
    if opts.images {
        resolve_all_visuals(session, slide_count).await?;
    } else {
        settle_visuals(session).await?;
    }

    session.submit(Op::Export { out_dir: opts.out }).await?;
    let path = wait_for(session, |ev| match ev {
        Event::Exported { path } => Some(path),
        _ => None,
    })
    .await?;
    println!("Deck saved to: {}", path.display());

    if let Some(json) = opts.json {
        session.submit(Op::Snapshot).await?;
        let doc = wait_for(session, |ev| match ev {
            Event::Snapshot { document } => Some(document),
            _ => None,
        })
        .await?
        .ok_or_else(|| anyhow!("no document to write"))?;
        let json = if json.is_dir() {
            json.join(format!("{}.json", create_slug(&doc.meta.title)))
        } else {
            json
        };
        std::fs::write(&json, serde_json::to_string_pretty(&doc)?)?;
        println!("Document written to: {}", json.display());
    }

    if let Some(name) = opts.save {
        session.submit(Op::Save { name: Some(name) }).await?;
        let id = wait_for(session, |ev| match ev {
            Event::Saved { id } => Some(id),
            _ => None,
        })
        .await?;
        println!("Project id: {id}");
    }

    session.submit(Op::Shutdown).await?;
    wait_for(session, |ev| matches!(ev, Event::ShutdownComplete).then_some(())).await
}

/// Visit every slide so the session requests visuals, then wait for all
/// requests to settle.
async fn resolve_all_visuals(session: &Session, slide_count: usize) -> Result<()> {
    for index in 0..slide_count {
        session.submit(Op::ShowSlide { index }).await?;
    }
    let found = settle_visuals(session).await?;
    println!("Found images for {found} slides");
    Ok(())
}

/// Wait until every visual requested so far has resolved or come back
/// empty. Returns how many resolved to an image.
async fn settle_visuals(session: &Session) -> Result<usize> {
    // The snapshot reply is queued after every request event already sent.
    session.submit(Op::Snapshot).await?;

    let mut pending = HashSet::new();
    let mut found = 0usize;
    let mut barrier = false;
    while !(barrier && pending.is_empty()) {
        let event = session
            .next_event()
            .await
            .ok_or_else(|| anyhow!("session ended unexpectedly"))?;
        match event {
            Event::VisualRequested { index, .. } => {
                pending.insert(index);
            }
            Event::SlideImageUpdated { index, .. } => {
                pending.remove(&index);
                found += 1;
            }
            Event::VisualUnavailable { index } => {
                pending.remove(&index);
            }
            Event::Snapshot { .. } => barrier = true,
            Event::Error { message } => bail!(message),
            _ => {}
        }
    }
    Ok(found)
}

async fn view(config: &Config, project: Option<String>, file: Option<PathBuf>, out: PathBuf) -> Result<()> {
    let services = SessionServices::from_config(config, AuthState::new(config.user.clone()));
    let SessionSpawnOk { session } = Session::spawn(services).await?;

    if let Some(id) = project {
        session.submit(Op::LoadProject { id }).await?;
    } else if let Some(file) = file {
        let document = read_document(&file)?;
        session.submit(Op::OpenDocument { document }).await?;
    }

    slidesmith_tui::run_viewer(session, out).await
}

async fn narrate(config: &Config, file: &Path, number: usize, out: Option<PathBuf>) -> Result<()> {
    let doc = read_document(file)?;
    let slide = number
        .checked_sub(1)
        .and_then(|i| doc.slide(i))
        .ok_or_else(|| anyhow!("slide {number} does not exist (deck has {})", doc.len()))?;
    let script = slide
        .speaker_script
        .as_deref()
        .ok_or_else(|| anyhow!("slide {number} has no speaker script"))?;

    let narrator = NarrationRequester::new(Arc::new(GeminiAdapter::from_config(config)));
    let audio = narrator.synthesize(script, slide.speaker_tone.as_deref()).await?;
    let out = out.unwrap_or_else(|| PathBuf::from(format!("slide-{number}.wav")));
    audio.persist_to(&out)?;
    println!("Narration saved to: {}", out.display());
    Ok(())
}

async fn projects(config: &Config, action: ProjectAction) -> Result<()> {
    let gateway = gateway(config);
    match action {
        ProjectAction::List => {
            let list = gateway.list().await?;
            if list.is_empty() {
                println!("No saved projects yet.");
            }
            for p in list {
                println!(
                    "{}  {}  {:>2} slides  {}",
                    p.id,
                    p.created_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                    p.slide_count,
                    p.topic
                );
            }
        }
        ProjectAction::Show { id } => {
            let doc = gateway.load(&id).await?;
            println!("{} ({}, {})", doc.meta.title, doc.meta.theme, doc.meta.date);
            for (i, slide) in doc.slides.iter().enumerate() {
                println!("\n{}. [{}] {}", i + 1, slide.slide_type.as_str(), slide.title);
                for line in slide.content_lines() {
                    println!("   {line}");
                }
            }
        }
        ProjectAction::Delete { id } => {
            gateway.delete(&id).await?;
            println!("Project deleted successfully!");
        }
    }
    Ok(())
}
