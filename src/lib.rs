// src/lib.rs

pub mod analyzer;
pub mod api;
pub mod compositor;
pub mod config;
pub mod error;
pub mod generator;
pub mod notify;
pub mod orchestrator;
pub mod state;
