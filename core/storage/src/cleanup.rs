//! Removal of whole directories, used to clean up after test runs.

use futures::future::try_join_all;
use tracing::{debug, info};

use skyshelf_common::{ObjectPath, Result};

use crate::provider::Connection;

/// Delete every object in `directory`, then the directory itself.
///
/// A missing directory counts as already clean. Returns the number of
/// objects removed.
pub async fn purge_directory(connection: &dyn Connection, directory: &str) -> Result<usize> {
    let objects = match connection.list_objects(directory).await {
        Ok(objects) => objects,
        Err(e) if e.is_not_found() => {
            debug!(directory, "Nothing to purge");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    let paths = objects
        .iter()
        .map(|info| ObjectPath::parse(&info.key))
        .collect::<Result<Vec<_>>>()?;

    try_join_all(paths.iter().map(|path| async move {
        match connection.delete_object(directory, path).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }))
    .await?;

    if let Err(e) = connection.delete_directory(directory).await {
        if !e.is_not_found() {
            return Err(e);
        }
    }

    info!(directory, objects = paths.len(), "Purged directory");
    Ok(paths.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalConnection;
    use crate::memory::{Fault, MemoryConnection};
    use crate::provider::PutOptions;
    use bytes::Bytes;
    use skyshelf_common::Error;

    async fn seed(conn: &dyn Connection, directory: &str, keys: &[&str]) {
        conn.create_directory(directory, true).await.unwrap();
        for key in keys {
            conn.put_object(
                directory,
                &ObjectPath::parse(key).unwrap(),
                Bytes::from_static(b"x"),
                &PutOptions::default(),
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_purge_memory() {
        let conn = MemoryConnection::new();
        seed(&conn, "bucket", &["a.txt", "uploads/b.txt", "uploads/c.txt"]).await;

        assert_eq!(purge_directory(&conn, "bucket").await.unwrap(), 3);
        assert!(!conn.has_directory("bucket"));
    }

    #[tokio::test]
    async fn test_purge_local() {
        let temp = tempfile::TempDir::new().unwrap();
        let conn = LocalConnection::new(temp.path()).unwrap();
        seed(&conn, "bucket", &["a.txt", "uploads/deep/b.txt"]).await;

        assert_eq!(purge_directory(&conn, "bucket").await.unwrap(), 2);
        assert!(!temp.path().join("bucket").exists());
    }

    #[tokio::test]
    async fn test_purge_missing_directory() {
        let conn = MemoryConnection::new();
        assert_eq!(purge_directory(&conn, "never-created").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_surfaces_connection_errors() {
        let conn = MemoryConnection::new();
        seed(&conn, "bucket", &["a.txt"]).await;
        conn.set_fault(Some(Fault::Unreachable));

        let result = purge_directory(&conn, "bucket").await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
