//! Behaviour every provider must share, run against each backend we can
//! exercise offline: the mocked object stores and the local filesystem.

use bytes::Bytes;
use std::collections::BTreeMap;
use tempfile::TempDir;

use skyshelf_common::ObjectPath;

use crate::adapter::StorageAdapter;
use crate::cleanup::purge_directory;
use crate::credentials::{Credentials, ProviderConfig};
use crate::provider::{Provider, PutOptions};
use crate::registry::ConnectionMode;
use crate::resolver::CredentialResolver;
use crate::uploader::DirectoryUploader;

const DIRECTORY: &str = "skyshelf-conformance";

struct Backend {
    adapter: StorageAdapter,
    // Keeps the local root alive for the duration of the test.
    _root: Option<TempDir>,
}

async fn backends() -> Vec<Backend> {
    let mut backends = Vec::new();

    let resolver = CredentialResolver::new(ConnectionMode::Mock, DIRECTORY);
    for config in resolver.resolve(&BTreeMap::new()) {
        backends.push(Backend {
            adapter: StorageAdapter::connect(config, ConnectionMode::Mock).await.unwrap(),
            _root: None,
        });
    }

    let root = TempDir::new().unwrap();
    let mut source = BTreeMap::new();
    source.insert(
        "local_root".to_string(),
        root.path().to_string_lossy().to_string(),
    );
    let config = ProviderConfig::new(
        Credentials::from_map(Provider::Local, &source).unwrap(),
        DIRECTORY,
    )
    .unwrap();
    backends.push(Backend {
        adapter: StorageAdapter::connect(config, ConnectionMode::Live).await.unwrap(),
        _root: Some(root),
    });

    backends
}

fn bar_path() -> ObjectPath {
    ObjectPath::parse("uploads/bar.txt").unwrap()
}

#[tokio::test]
async fn store_uploads_the_file() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        let file = adapter
            .store(&b"this is stuff"[..], "uploads/bar.txt", adapter.config())
            .await
            .unwrap();

        let body = adapter
            .connection()
            .get_object(DIRECTORY, &bar_path())
            .await
            .unwrap();
        assert_eq!(body, Bytes::from_static(b"this is stuff"), "{}", adapter.provider());
        assert_eq!(file.path(), "uploads/bar.txt");
        assert_eq!(file.size().await.unwrap(), 13);
    }
}

#[tokio::test]
async fn stored_file_public_url() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        let file = adapter
            .store(&b"this is stuff"[..], "uploads/bar.txt", adapter.config())
            .await
            .unwrap();

        if adapter.provider() == Provider::Local {
            assert!(file.public_url().is_none());
        } else {
            assert!(file.public_url().is_some(), "{}", adapter.provider());
        }

        let with_host = adapter.config().clone().with_host("http://foo.bar").unwrap();
        let file = adapter
            .store(&b"this is stuff"[..], "uploads/bar.txt", &with_host)
            .await
            .unwrap();
        assert_eq!(
            file.public_url().as_deref(),
            Some("http://foo.bar/uploads/bar.txt"),
            "{}",
            adapter.provider()
        );
    }
}

#[tokio::test]
async fn private_files_have_no_public_url() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        let private = adapter.config().clone().with_public(false);
        let file = adapter
            .store(&b"this is stuff"[..], "uploads/bar.txt", &private)
            .await
            .unwrap();

        assert!(file.public_url().is_none(), "{}", adapter.provider());
        assert!(adapter.public_url("uploads/bar.txt", &private).is_none());
    }
}

#[tokio::test]
async fn stored_file_is_deletable() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        let file = adapter
            .store(&b"this is stuff"[..], "uploads/bar.txt", adapter.config())
            .await
            .unwrap();

        file.delete().await.unwrap();

        let head = adapter
            .connection()
            .head_object(DIRECTORY, &bar_path())
            .await
            .unwrap();
        assert!(head.is_none(), "{}", adapter.provider());
        assert!(adapter
            .retrieve("uploads/bar.txt")
            .await
            .unwrap_err()
            .is_not_found());
    }
}

#[tokio::test]
async fn retrieve_existing_file() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        let connection = adapter.connection();
        connection.create_directory(DIRECTORY, true).await.unwrap();
        connection
            .put_object(
                DIRECTORY,
                &bar_path(),
                Bytes::from_static(b"A test, 1234"),
                &PutOptions {
                    public: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let uploader = DirectoryUploader::default();
        let file = adapter.retrieve_for(&uploader, "bar.txt").await.unwrap();

        let content = file.read().await.unwrap();
        assert_eq!(
            String::from_utf8_lossy(&content).trim_end(),
            "A test, 1234",
            "{}",
            adapter.provider()
        );
        assert_eq!(file.path(), "uploads/bar.txt");
        assert_eq!(file.size().await.unwrap(), 12);
        if adapter.provider() != Provider::Local {
            assert!(file.public_url().is_some());
        }

        file.delete().await.unwrap();
        assert!(connection.head_object(DIRECTORY, &bar_path()).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn round_trip_preserves_bytes() {
    let payloads: [&[u8]; 4] = [b"", b"x", b"\x00\xff\x10binary\r\n", &[7u8; 4096]];

    for backend in backends().await {
        let adapter = &backend.adapter;
        for (i, payload) in payloads.iter().enumerate() {
            let path = format!("uploads/payload-{}.bin", i);
            adapter
                .store(Bytes::copy_from_slice(payload), &path, adapter.config())
                .await
                .unwrap();

            let file = adapter.retrieve(&path).await.unwrap();
            assert_eq!(file.size().await.unwrap(), payload.len() as u64);
            assert_eq!(&file.read().await.unwrap()[..], *payload, "{}", adapter.provider());
        }
    }
}

#[tokio::test]
async fn store_overwrites_previous_version() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        adapter.store(&b"first"[..], "a.txt", adapter.config()).await.unwrap();
        adapter.store(&b"second!"[..], "a.txt", adapter.config()).await.unwrap();

        let file = adapter.retrieve("a.txt").await.unwrap();
        assert_eq!(file.size().await.unwrap(), 7);
        assert_eq!(&file.read().await.unwrap()[..], b"second!");
    }
}

#[tokio::test]
async fn purge_removes_everything() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        adapter.store(&b"1"[..], "uploads/a.txt", adapter.config()).await.unwrap();
        adapter.store(&b"2"[..], "uploads/b.txt", adapter.config()).await.unwrap();

        let connection = adapter.connection();
        assert_eq!(purge_directory(connection.as_ref(), DIRECTORY).await.unwrap(), 2);
        assert!(connection.list_objects(DIRECTORY).await.unwrap_err().is_not_found());
    }
}

#[tokio::test]
async fn store_after_purge_recreates_directory() {
    for backend in backends().await {
        let adapter = &backend.adapter;
        adapter.store(&b"before"[..], "a.txt", adapter.config()).await.unwrap();

        purge_directory(adapter.connection().as_ref(), DIRECTORY).await.unwrap();

        let file = adapter
            .store(&b"after"[..], "a.txt", adapter.config())
            .await
            .unwrap_or_else(|e| panic!("{}: {}", adapter.provider(), e));
        assert_eq!(file.size().await.unwrap(), 5);
        assert_eq!(&adapter.retrieve("a.txt").await.unwrap().read().await.unwrap()[..], b"after");
    }
}
