//! Network utilities for fetching the server binary.
//!
//! This module provides:
//! - An HTTP client carrying the launcher's user agent
//! - A streaming downloader that never overwrites an existing file

mod client;
mod download;

pub use client::HttpClient;
pub use download::{BinaryDownloader, DownloadProgress};
