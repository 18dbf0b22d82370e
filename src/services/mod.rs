// src/services/mod.rs
pub mod board;
pub mod gateway;
pub mod image_client;
pub mod image_processor;
pub mod response_decoder;
pub mod retry;
pub mod sequencer;
pub mod store;
pub mod style_client;
pub mod stylist;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use image_processor::ImageProcessor;
pub use stylist::Stylist;
