//! S3 implementation for keyrotate
//!
//! This crate provides a bucket registry that authenticates ListBuckets
//! requests with SigV4, and a client that signs those requests from a
//! raw key pair. The client is what credential validation probes with.

pub mod client;
pub mod service;

pub use client::{S3Client, S3ClientFactory};
pub use service::{BucketSummary, S3Error, S3Service};
