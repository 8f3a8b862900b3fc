pub mod aggregation;
pub mod media;
pub mod orchestrator;
pub mod queue;
pub mod scoring;
pub mod sightengine;
pub mod submission;
pub mod summary;
