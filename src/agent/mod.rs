pub mod copywriter;
pub mod orchestrator;
pub mod prompt;
pub mod tools;
pub mod truncation;

pub use orchestrator::{FALLBACK_TEXT, FallbackReason, LlmOrchestrator, LoopOutcome};
