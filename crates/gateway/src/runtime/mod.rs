pub mod actors;
pub mod agent;
pub mod concurrency;
pub mod export;
pub mod metrics;
pub mod objects;
pub mod prompt;
pub mod rate_limit;
pub mod recall;
pub mod tool;
