//! WoM remote service client.

pub mod client;

pub use client::WomClient;
