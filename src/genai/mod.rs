// src/genai/mod.rs
pub mod client;
pub mod models;

pub use client::{GeminiClient, Generation, GenerationRequest, GenerativeModel};
