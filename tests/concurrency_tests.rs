//! Several writers racing on one destination.
//!
//! Every writer stages its content first, then all of them commit at once
//! behind a barrier, so the commits genuinely overlap.

mod common;

use atomic_scribe::{AtomicWriter, WriteMode};
use std::fs;
use std::io::{self, Write};
use std::sync::Barrier;
use std::thread;

use common::*;
use tempfile::TempDir;

const WRITERS: usize = 8;

fn payload(id: usize) -> Vec<u8> {
    format!("writer-{id}:").repeat(4096).into_bytes()
}

#[test]
fn test_concurrent_no_overwrite_has_single_winner() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("shared");
    let writer = AtomicWriter::new(&target).mode(WriteMode::Binary);
    let barrier = Barrier::new(WRITERS);

    let outcomes: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..WRITERS)
            .map(|id| {
                let writer = &writer;
                let barrier = &barrier;
                s.spawn(move || {
                    let result = writer.write(|f| {
                        f.write_all(&payload(id))?;
                        barrier.wait();
                        io::Result::Ok(())
                    });
                    (id, result)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = outcomes
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(winners.len(), 1, "exactly one writer must win");

    for (_, result) in &outcomes {
        if let Err(e) = result {
            assert!(e.is_destination_exists(), "unexpected error: {}", e);
        }
    }

    assert_eq!(fs::read(&target).unwrap(), payload(winners[0]));
    assert_eq!(entries(temp.path()), vec!["shared"]);
}

#[test]
fn test_concurrent_overwrite_leaves_one_whole_generation() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("shared");
    fs::write(&target, "generation zero").unwrap();
    let writer = AtomicWriter::new(&target)
        .overwrite(true)
        .mode(WriteMode::Binary);
    let barrier = Barrier::new(WRITERS);

    thread::scope(|s| {
        for id in 0..WRITERS {
            let writer = &writer;
            let barrier = &barrier;
            s.spawn(move || {
                writer
                    .write(|f| {
                        f.write_all(&payload(id))?;
                        barrier.wait();
                        io::Result::Ok(())
                    })
                    .unwrap();
            });
        }
    });

    let content = fs::read(&target).unwrap();
    assert!(
        (0..WRITERS).any(|id| content == payload(id)),
        "final content must be exactly one writer's payload"
    );
    assert_eq!(entries(temp.path()), vec!["shared"]);
}

#[test]
fn test_reader_never_sees_partial_content() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("shared");
    let old = b"old generation".to_vec();
    let new = payload(1);
    fs::write(&target, &old).unwrap();

    AtomicWriter::new(&target)
        .overwrite(true)
        .mode(WriteMode::Binary)
        .write(|f| {
            for chunk in new.chunks(1024) {
                f.write_all(chunk)?;
                f.flush()?;
                assert_eq!(fs::read(&target)?, old);
            }
            io::Result::Ok(())
        })
        .unwrap();

    assert_eq!(fs::read(&target).unwrap(), new);
}

#[test]
fn test_concurrent_writers_use_distinct_temp_files() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("shared");
    let writer = AtomicWriter::new(&target).overwrite(true);

    let files: Vec<_> = (0..WRITERS).map(|_| writer.open().unwrap()).collect();
    assert_eq!(strays(temp.path(), "shared").len(), WRITERS);

    for file in files {
        file.rollback().unwrap();
    }
    assert!(entries(temp.path()).is_empty());
}
