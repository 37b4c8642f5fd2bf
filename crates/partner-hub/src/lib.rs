//! Applicant onboarding, partner directory, and bid intake for the partner hub marketplace.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
