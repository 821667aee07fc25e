//! Shared helpers for atomic-scribe integration tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::path::Path;

/// Sorted file names in `dir`.
#[allow(unused)]
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Names in `dir` other than `keep`, i.e. staged temporary files.
#[allow(unused)]
pub fn strays(dir: &Path, keep: &str) -> Vec<String> {
    entries(dir).into_iter().filter(|n| n != keep).collect()
}

/// Exactly `len` deterministic bytes.
///
/// The first 256 bytes are 0..=255 in order, so any `len >= 256` covers
/// every byte value; the rest are pseudo-random.
#[allow(unused)]
pub fn binary_payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    let mut data: Vec<u8> = (0..=255u8).take(len).collect();
    while data.len() < len {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        data.push((state >> 24) as u8);
    }
    data
}

/// Runs the binary with `args` from `dir`.
#[allow(unused)]
pub fn run_scribe(dir: &Path, args: &[&str], stdin: &[u8]) -> assert_cmd::assert::Assert {
    let mut cmd = cargo_bin_cmd!("atomic-scribe");
    cmd.args(args).current_dir(dir).write_stdin(stdin.to_vec());

    cmd.assert()
}
