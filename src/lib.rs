pub mod composer;
pub mod config;
pub mod curator;
pub mod digester;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod profile;
pub mod types;

pub use composer::{ComposeStage, DEFAULT_TOP_N};
pub use config::Settings;
pub use curator::CurationStage;
pub use digester::{DigestOutput, DigestStage};
pub use model::{GeminiClient, GenerationParams, MockModelClient, ModelClient};
pub use pipeline::{PipelineOrchestrator, RunReport};
pub use profile::{ContentPreferences, UserProfile};
pub use types::*;
