pub mod cache;
pub mod client;
pub mod formatters;
pub mod generators;
pub mod prompts;
pub mod provider;

pub use client::GenerationClient;
pub use generators::{
    generate_competitive_landscape, generate_competitive_landscape_tokens, generate_executive_summary,
    generate_executive_summary_tokens, generate_market_narrative, generate_market_narrative_tokens,
    generate_parallel_intelligence, generate_recommendation, generate_scenarios, generate_trend_analysis,
    ParallelIntelligence,
};
