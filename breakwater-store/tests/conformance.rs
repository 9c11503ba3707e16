//! Contract conformance suite run against both store implementations.
//!
//! Every test here exercises the `ChunkStore` trait only, so the plain and
//! encrypted stores must be indistinguishable through it.

use std::sync::Arc;

use breakwater_store::{
    ChunkIndex, ChunkStore, EncryptedChunkStore, EncryptionKey, FileChunkStore, GetOptions,
    StoreOptions,
};
use proptest::prelude::*;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Plain,
    Encrypted,
}

const KINDS: [Kind; 2] = [Kind::Plain, Kind::Encrypted];

fn create_store(kind: Kind, dir: &TempDir, chunk_length: u64) -> Arc<dyn ChunkStore> {
    let options = StoreOptions {
        path: Some(dir.path().join("store.bin")),
        ..Default::default()
    };
    match kind {
        Kind::Plain => Arc::new(FileChunkStore::new(chunk_length, options).unwrap()),
        Kind::Encrypted => Arc::new(
            EncryptedChunkStore::new(
                chunk_length,
                options,
                EncryptionKey::from_passphrase("conformance"),
            )
            .unwrap(),
        ),
    }
}

fn chunk_of(value: u8) -> Vec<u8> {
    vec![value; 10]
}

#[tokio::test]
async fn basic_put_then_get() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);

        store
            .put(ChunkIndex::new(0), b"0123456789")
            .await
            .unwrap();
        let chunk = store
            .get(ChunkIndex::new(0), GetOptions::default())
            .await
            .unwrap();
        assert_eq!(chunk, b"0123456789", "{kind:?}");
    }
}

#[tokio::test]
async fn put_with_invalid_chunk_length_fails() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);

        let result = store.put(ChunkIndex::new(0), b"0123").await;
        assert!(result.is_err(), "{kind:?}");
    }
}

#[tokio::test]
async fn concurrent_puts_then_concurrent_gets() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);

        let puts: Vec<_> = (0..100u8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .put(ChunkIndex::new(u32::from(i)), &chunk_of(i))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for put in puts {
            put.await.unwrap();
        }

        let gets: Vec<_> = (0..100u8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let chunk = store
                        .get(ChunkIndex::new(u32::from(i)), GetOptions::default())
                        .await
                        .unwrap();
                    assert_eq!(chunk, chunk_of(i));
                })
            })
            .collect();
        for get in gets {
            get.await.unwrap();
        }
    }
}

#[tokio::test]
async fn interleaved_puts_and_gets() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);

        let tasks: Vec<_> = (0..100u8)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let index = ChunkIndex::new(u32::from(i));
                    store.put(index, &chunk_of(i)).await.unwrap();
                    let chunk = store.get(index, GetOptions::default()).await.unwrap();
                    assert_eq!(chunk, chunk_of(i));
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
    }
}

#[tokio::test]
async fn get_option_defaults_select_expected_windows() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);
        store
            .put(ChunkIndex::new(0), b"0123456789")
            .await
            .unwrap();

        let full = store
            .get(ChunkIndex::new(0), GetOptions::default())
            .await
            .unwrap();
        assert_eq!(full, b"0123456789", "{kind:?}");

        let from_offset = store
            .get(
                ChunkIndex::new(0),
                GetOptions {
                    offset: 2,
                    length: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(from_offset, b"23456789", "{kind:?}");

        let length_only = store
            .get(ChunkIndex::new(0), GetOptions::range(0, 5))
            .await
            .unwrap();
        assert_eq!(length_only, b"01234", "{kind:?}");

        let window = store
            .get(ChunkIndex::new(0), GetOptions::range(2, 3))
            .await
            .unwrap();
        assert_eq!(window, b"234", "{kind:?}");
    }
}

#[tokio::test]
async fn sparse_indices_are_supported() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);

        store
            .put(ChunkIndex::new(10), b"0123456789")
            .await
            .unwrap();
        let chunk = store
            .get(ChunkIndex::new(10), GetOptions::default())
            .await
            .unwrap();
        assert_eq!(chunk, b"0123456789", "{kind:?}");
    }
}

#[tokio::test]
async fn chunk_length_is_exposed() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);
        assert_eq!(store.chunk_length(), 10, "{kind:?}");
    }
}

#[tokio::test]
async fn get_on_never_written_index_fails() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);

        let result = store.get(ChunkIndex::new(0), GetOptions::default()).await;
        assert!(result.is_err(), "{kind:?}");
    }
}

#[tokio::test]
async fn close_completes_on_empty_store() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);
        store.close().await.unwrap();
    }
}

#[tokio::test]
async fn close_completes_on_written_store() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);
        store
            .put(ChunkIndex::new(0), b"0123456789")
            .await
            .unwrap();
        store.close().await.unwrap();
    }
}

#[tokio::test]
async fn destroy_leaves_no_backing_storage() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);
        store
            .put(ChunkIndex::new(0), b"0123456789")
            .await
            .unwrap();

        store.destroy().await.unwrap();
        assert!(
            std::fs::read(dir.path().join("store.bin")).is_err(),
            "{kind:?}"
        );
    }
}

#[tokio::test]
async fn discarding_results_is_inert() {
    for kind in KINDS {
        let dir = TempDir::new().unwrap();
        let store = create_store(kind, &dir, 10);

        // Fire-and-forget is an explicit discard of the returned result;
        // a failed operation must not disturb the store or the process.
        let _ = store.put(ChunkIndex::new(0), b"0123").await;

        let detached = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let _ = store.put(ChunkIndex::new(1), b"xx").await;
            })
        };
        detached.await.unwrap();

        store
            .put(ChunkIndex::new(0), b"0123456789")
            .await
            .unwrap();
        let chunk = store
            .get(ChunkIndex::new(0), GetOptions::default())
            .await
            .unwrap();
        assert_eq!(chunk, b"0123456789", "{kind:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    // Sub-range law: any valid window equals the matching slice of the
    // full chunk, through either implementation.
    #[test]
    fn get_window_equals_slice_of_full_chunk(
        (offset, length) in (0u64..=64).prop_flat_map(|offset| (Just(offset), 0u64..=64 - offset))
    ) {
        tokio_test::block_on(async move {
            for kind in KINDS {
                let dir = TempDir::new().unwrap();
                let store = create_store(kind, &dir, 64);

                let full: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(31)).collect();
                store.put(ChunkIndex::new(0), &full).await.unwrap();

                let window = store
                    .get(ChunkIndex::new(0), GetOptions { offset, length: Some(length) })
                    .await
                    .unwrap();
                assert_eq!(window, &full[offset as usize..(offset + length) as usize]);
            }
        });
    }
}
