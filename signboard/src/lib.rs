pub mod api;
pub mod batch;
pub mod config;
pub mod error;
mod http;
pub mod language;
pub mod ocr;
pub mod pipeline;
pub mod speech;
pub mod translation;
