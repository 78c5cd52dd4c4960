pub mod extraction;
pub mod budget;
pub mod prompt;
pub mod providers;
pub mod fallback;
pub mod metrics;
pub mod processor;

pub use budget::bound;
pub use extraction::{DocumentNormalizer, ExtractionError};
pub use fallback::{FallbackError, FallbackOrchestrator, Provider, RetryPolicy};
pub use metrics::MetricExtractor;
pub use processor::{AnalysisCoordinator, PipelineError, RunError};
pub use prompt::{PromptBuilder, PromptError};
pub use providers::{AnalysisProvider, ProviderError};
