//! Notes backend with memory-augmented chat over OpenAI and Gemini.

pub mod api;
pub mod app;
pub mod core;
pub mod middleware;
pub mod models;
