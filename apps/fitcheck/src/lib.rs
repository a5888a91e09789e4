//! fitcheck: candidate-fit analysis from a resume, a job description and a recruiter
//! conversation.
//!
//! Leaf-first: `document` → `similarity` → `transcript` → `analysis` → `report`, wired
//! together per candidate by `session` and exposed over HTTP by `routes`.

pub mod analysis;
pub mod config;
pub mod document;
pub mod errors;
pub mod interview;
pub mod llm_client;
pub mod report;
pub mod routes;
pub mod session;
pub mod similarity;
pub mod state;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_support;
