//! Stateless domain services: pure functions and small orchestration
//! pieces that sit above the domain models but don't need a port of
//! their own (target parsing, rule matching, dispatch filtering,
//! ingestion, ETL, auto-tagging, rule-pack packaging, project expansion).

pub mod dispatcher;
pub mod etl;
pub mod ingestor;
pub mod matcher;
pub mod orchestrator;
pub mod rulepack;
pub mod tag_engine;
pub mod target;
