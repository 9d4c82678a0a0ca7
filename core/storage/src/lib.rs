//! Storage adapter for Skyshelf.
//!
//! This module provides one interface for storing, retrieving, deleting and
//! addressing uploaded files across storage providers (Amazon S3, Google
//! Cloud Storage, Rackspace Cloud Files, local disk).
//!
//! # Design Principles
//! - Closed provider set: each provider is an enum variant with typed credentials
//! - Provider isolation: network and SDK details live behind [`Connection`]
//! - Async operations: every I/O call is async
//! - Unified error semantics: `Auth`, `Connection` and `NotFound` across providers

pub mod adapter;
pub mod cleanup;
pub mod credentials;
pub mod file;
pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod uploader;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(test)]
mod conformance;

pub use adapter::{is_dns_compatible_bucket, StorageAdapter};
pub use cleanup::purge_directory;
pub use credentials::{
    AwsCredentials, Credentials, GoogleCredentials, LocalCredentials, ProviderConfig,
    RackspaceCredentials,
};
pub use file::StoredFile;
pub use local::LocalConnection;
pub use memory::{Fault, MemoryConnection};
pub use provider::{Connection, ObjectInfo, Provider, PutOptions};
pub use registry::{open_connection, ConnectionMode};
pub use resolver::CredentialResolver;
pub use settings::{load_credentials, Settings};
pub use uploader::{DirectoryUploader, Uploader};

#[cfg(feature = "s3")]
pub use s3::S3Connection;
