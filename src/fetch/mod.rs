//! Retrieval of conversations from the platform API.
//!
//! - `client`: reqwest-backed [`page::PageSource`] for the conversations endpoint
//! - `fetcher`: the cursor loop and time-window cutoff
//! - `page`: page decoding and the source trait
//! - `timestamp`: creation-time parsing

pub mod client;
pub mod error;
pub mod fetcher;
pub mod page;
pub mod timestamp;

pub use client::{ApiClient, ClientSettings};
pub use fetcher::{FetchConfig, Fetcher, StopReason};
