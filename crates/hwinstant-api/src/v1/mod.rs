// Local API v1: `/api`, `/api/v1/data`, `/api/v1/system`.

pub mod client;
mod endpoints;
pub mod models;

pub use client::HomeWizardClient;
