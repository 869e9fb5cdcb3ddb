//! Knowledge Explorer
//!
//! An infinite knowledge-tree explorer with:
//! - A paged node cache seeded from a static taxonomy
//! - LLM-generated sub-topics, fetched on demand per node
//! - Streamed per-node chat sessions with suggested follow-up questions
//! - An axum HTTP API (JSON + Server-Sent Events)

pub mod api;
pub mod chat;
pub mod llm;
pub mod taxonomy;
pub mod tree;

use anyhow::{Context, Result};
use api::{ExplorerState, ServerState};
use chat::{ChatConfig, ChatManager};
use llm::traits::{ChatStreamer, ChildGenerator};
use llm::{GeminiStreamer, HttpChatStreamer, HttpChildGenerator, OpenAiGenerator};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taxonomy::Taxonomy;
use tree::{Explorer, InMemoryNodeStore, NodeStore, DEFAULT_CHILDREN_PER_PAGE};

/// Default cap on generated pages per node
pub const DEFAULT_MAX_PAGES_PER_NODE: usize = 20;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub generation: GenerationYamlConfig,
    pub chat: ChatYamlConfig,
    pub limits: LimitsYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    /// Taxonomy seed file; the bundled seed is used when absent
    pub taxonomy_path: Option<PathBuf>,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            taxonomy_path: None,
        }
    }
}

/// Child-generation provider section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationYamlConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub children_per_page: usize,
    /// Remote `/api/generate` endpoint used instead of the in-process provider
    pub endpoint: Option<String>,
}

impl Default for GenerationYamlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: llm::openai::DEFAULT_GENERATION_MODEL.into(),
            base_url: llm::openai::DEFAULT_OPENAI_BASE_URL.into(),
            temperature: llm::openai::DEFAULT_TEMPERATURE,
            children_per_page: DEFAULT_CHILDREN_PER_PAGE,
            endpoint: None,
        }
    }
}

/// Chat provider section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatYamlConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Remote `/api/chat` endpoint used instead of the in-process provider
    pub endpoint: Option<String>,
}

impl Default for ChatYamlConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: llm::gemini::DEFAULT_CHAT_MODEL.into(),
            base_url: llm::gemini::DEFAULT_GEMINI_BASE_URL.into(),
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsYamlConfig {
    pub max_pages_per_node: usize,
}

impl Default for LimitsYamlConfig {
    fn default() -> Self {
        Self {
            max_pages_per_node: DEFAULT_MAX_PAGES_PER_NODE,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub taxonomy_path: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub generation_model: String,
    pub openai_base_url: String,
    pub temperature: f32,
    pub children_per_page: usize,
    pub generation_endpoint: Option<String>,
    pub google_api_key: Option<String>,
    pub chat_model: String,
    pub gemini_base_url: String,
    pub chat_endpoint: Option<String>,
    pub max_pages_per_node: usize,
}

/// Non-empty env var
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

impl From<YamlConfig> for Config {
    fn from(yaml: YamlConfig) -> Self {
        Self {
            server_port: yaml.server.port,
            taxonomy_path: yaml.server.taxonomy_path,
            openai_api_key: yaml.generation.api_key,
            generation_model: yaml.generation.model,
            openai_base_url: yaml.generation.base_url,
            temperature: yaml.generation.temperature,
            children_per_page: yaml.generation.children_per_page.max(1),
            generation_endpoint: yaml.generation.endpoint,
            google_api_key: yaml.chat.api_key,
            chat_model: yaml.chat.model,
            gemini_base_url: yaml.chat.base_url,
            chat_endpoint: yaml.chat.endpoint,
            max_pages_per_node: yaml.limits.max_pages_per_node.max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        YamlConfig::default().into()
    }
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let base = Config::from(Self::load_yaml(yaml_path));

        Ok(Self {
            server_port: env_parse("SERVER_PORT").unwrap_or(base.server_port),
            taxonomy_path: env_var("TAXONOMY_PATH")
                .map(PathBuf::from)
                .or(base.taxonomy_path),
            openai_api_key: env_var("OPENAI_API_KEY").or(base.openai_api_key),
            generation_model: env_var("GENERATION_MODEL").unwrap_or(base.generation_model),
            openai_base_url: env_var("OPENAI_BASE_URL").unwrap_or(base.openai_base_url),
            temperature: base.temperature,
            children_per_page: env_parse("CHILDREN_PER_PAGE")
                .unwrap_or(base.children_per_page)
                .max(1),
            generation_endpoint: env_var("GENERATION_ENDPOINT").or(base.generation_endpoint),
            google_api_key: env_var("GOOGLE_API_KEY").or(base.google_api_key),
            chat_model: env_var("CHAT_MODEL").unwrap_or(base.chat_model),
            gemini_base_url: env_var("GEMINI_BASE_URL").unwrap_or(base.gemini_base_url),
            chat_endpoint: env_var("CHAT_ENDPOINT").or(base.chat_endpoint),
            max_pages_per_node: env_parse("MAX_PAGES_PER_NODE")
                .unwrap_or(base.max_pages_per_node)
                .max(1),
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Application state
// ============================================================================

/// Providers selected from the configuration
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn ChildGenerator>,
    pub streamer: Arc<dyn ChatStreamer>,
    pub generation_ready: bool,
    pub chat_ready: bool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the providers.
    ///
    /// A configured endpoint wins over the in-process provider. Missing API
    /// keys are not an error: the provider then fails each call instead.
    pub fn new(config: Config) -> Result<Self> {
        let (generator, generation_ready): (Arc<dyn ChildGenerator>, bool) =
            match &config.generation_endpoint {
                Some(url) => {
                    tracing::info!(endpoint = %url, "Using remote generation endpoint");
                    (Arc::new(HttpChildGenerator::new(url.clone())?), true)
                }
                None => {
                    let generator = OpenAiGenerator::new(
                        config.openai_api_key.clone(),
                        config.openai_base_url.clone(),
                        config.generation_model.clone(),
                        config.temperature,
                        config.children_per_page,
                    )?;
                    let ready = generator.has_credentials();
                    if !ready {
                        tracing::warn!("OPENAI_API_KEY not set; generation requests will fail");
                    }
                    (Arc::new(generator), ready)
                }
            };

        let (streamer, chat_ready): (Arc<dyn ChatStreamer>, bool) = match &config.chat_endpoint {
            Some(url) => {
                tracing::info!(endpoint = %url, "Using remote chat endpoint");
                (Arc::new(HttpChatStreamer::new(url.clone())?), true)
            }
            None => {
                let streamer = GeminiStreamer::new(
                    config.google_api_key.clone(),
                    config.gemini_base_url.clone(),
                    config.chat_model.clone(),
                )?;
                let ready = streamer.has_credentials();
                if !ready {
                    tracing::warn!("GOOGLE_API_KEY not set; chat requests will fail");
                }
                (Arc::new(streamer), ready)
            }
        };

        Ok(Self {
            generator,
            streamer,
            generation_ready,
            chat_ready,
            config: Arc::new(config),
        })
    }

    /// Use the given providers instead of the configured ones
    pub fn with_providers(
        config: Config,
        generator: Arc<dyn ChildGenerator>,
        streamer: Arc<dyn ChatStreamer>,
    ) -> Self {
        Self {
            generator,
            streamer,
            generation_ready: true,
            chat_ready: true,
            config: Arc::new(config),
        }
    }

    /// Load the taxonomy seed and wire the explorer and chat manager
    pub fn into_server_state(self) -> Result<ExplorerState> {
        let cache = Taxonomy::load_or_default(self.config.taxonomy_path.as_deref())?
            .into_cache(self.config.max_pages_per_node)?;
        let store: Arc<dyn NodeStore> = Arc::new(InMemoryNodeStore::new(cache));

        let explorer = Arc::new(Explorer::new(
            store.clone(),
            self.generator.clone(),
            self.config.children_per_page,
        ));
        let chat_manager = Arc::new(ChatManager::new(
            self.streamer.clone(),
            store,
            ChatConfig::default(),
        ));

        Ok(Arc::new(ServerState {
            explorer,
            chat_manager,
            generator: self.generator,
            streamer: self.streamer,
            generation_ready: self.generation_ready,
            chat_ready: self.chat_ready,
        }))
    }
}

/// Start the HTTP server and serve until the process is stopped
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config)?.into_server_state()?;
    let app = api::create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Knowledge explorer listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
