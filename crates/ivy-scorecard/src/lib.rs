//! Multi-pointer weighted scoring for the Ivy League admissions-coaching track.
//!
//! Evaluators grade documents, activities, narratives and certificates; each of the six
//! evaluation pointers condenses its items into a 0-10 score, and the scorecard recombines
//! those pointer scores into one weighted overall score per enrollment.

pub mod config;
pub mod error;
pub mod imports;
pub mod scoring;
pub mod telemetry;
