// Analysis client: trait-based access to the external topic-analysis service.
//
// The TopicAnalyzer trait is what the session host and the search code hold.
// ChatCompletionsAnalyzer implements it against any OpenAI-compatible
// chat-completions endpoint (ModelScope by default). Tests swap in fakes.

pub mod client;
pub mod prompts;
pub mod rate_limiter;
pub mod response;
pub mod traits;

pub use client::ChatCompletionsAnalyzer;
pub use traits::{
    AnalysisRequest, AnalysisResult, ExistingTopic, ReportContext, ReportKind, SemanticRanking,
    TopicAnalyzer, TopicCandidate,
};
