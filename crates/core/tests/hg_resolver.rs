//! Resolver tests against a real Mercurial repository.
//!
//! Skipped when `hg` is not on PATH.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use rbhook_core::errors::{HgError, ReconcileError};
use rbhook_core::revset::Revset;
use rbhook_core::traits::Vcs;
use rbhook_core::{ChangesetResolver, HgClient};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn hg_available() -> bool {
    Command::new("hg")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn hg(repo: &Path, args: &[&str]) {
    let output = Command::new("hg")
        .current_dir(repo)
        .env("HGPLAIN", "1")
        .env("HGUSER", "Test User <test@example.com>")
        .args(args)
        .output()
        .expect("failed to run hg");
    assert!(
        output.status.success(),
        "hg {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn commit_file(repo: &Path, name: &str, content: &str, message: &str) {
    std::fs::write(repo.join(name), content).unwrap();
    hg(repo, &["add", name]);
    hg(repo, &["commit", "-m", message]);
}

/// Repository with two commits on `master` and two more on `feature-x`.
fn feature_repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path();
    hg(repo, &["init"]);

    commit_file(repo, "readme.txt", "hello\n", "Add readme");
    commit_file(repo, "lib.txt", "base\n", "Add lib");
    hg(repo, &["bookmark", "master"]);

    hg(repo, &["bookmark", "feature-x"]);
    commit_file(repo, "fix.txt", "fixed\n", "Fix bug\n\nLonger explanation");
    commit_file(repo, "test.txt", "tested\n", "Add \"quoted\" test");
    tmp
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_resolve_unique_history_in_order() {
    if !hg_available() {
        eprintln!("SKIPPED: hg not found in PATH");
        return;
    }
    let tmp = feature_repo();
    let client = HgClient::new(tmp.path(), "hg");
    let resolver = ChangesetResolver::new(&client, "master");

    let history = resolver.resolve("feature-x").await.unwrap();

    assert_eq!(history.changesets.len(), 2);
    assert_eq!(history.changesets[0].summary(), "Fix bug");
    assert_eq!(
        history.changesets[0].description,
        "Fix bug\n\nLonger explanation"
    );
    assert_eq!(history.changesets[1].description, "Add \"quoted\" test");
    assert!(history
        .changesets
        .iter()
        .all(|cs| cs.node.len() == 40 && cs.node.chars().all(|c| c.is_ascii_hexdigit())));

    let stable = client
        .enumerate(&Revset::Symbol("master".into()))
        .await
        .unwrap();
    assert_eq!(history.diff_range.base, stable[0].node);
    assert_eq!(history.diff_range.revset, Revset::range("master", "feature-x"));
}

#[tokio::test]
async fn test_resolve_bookmark_on_stable_line_is_empty() {
    if !hg_available() {
        eprintln!("SKIPPED: hg not found in PATH");
        return;
    }
    let tmp = feature_repo();
    hg(tmp.path(), &["bookmark", "--rev", "master", "parked"]);
    let client = HgClient::new(tmp.path(), "hg");
    let resolver = ChangesetResolver::new(&client, "master");

    let history = resolver.resolve("parked").await.unwrap();

    assert!(history.is_empty());
}

#[tokio::test]
async fn test_resolve_stable_bookmark_rejected() {
    if !hg_available() {
        eprintln!("SKIPPED: hg not found in PATH");
        return;
    }
    let tmp = feature_repo();
    let client = HgClient::new(tmp.path(), "hg");
    let resolver = ChangesetResolver::new(&client, "master");

    let result = resolver.resolve("master").await;

    assert!(matches!(result, Err(ReconcileError::StableBookmark(_))));
}

#[tokio::test]
async fn test_diffs_cover_changeset_and_range() {
    if !hg_available() {
        eprintln!("SKIPPED: hg not found in PATH");
        return;
    }
    let tmp = feature_repo();
    let client = HgClient::new(tmp.path(), "hg");
    let resolver = ChangesetResolver::new(&client, "master");
    let history = resolver.resolve("feature-x").await.unwrap();

    let single = client.diff_for(&history.changesets[0].node).await.unwrap();
    let single = String::from_utf8_lossy(&single);
    assert!(single.contains("diff --git a/fix.txt b/fix.txt"));
    assert!(!single.contains("test.txt"));

    let range = client
        .diff_for_range(&history.diff_range.revset)
        .await
        .unwrap();
    let range = String::from_utf8_lossy(&range);
    assert!(range.contains("fix.txt"));
    assert!(range.contains("test.txt"));
    assert!(!range.contains("readme.txt"));
}

#[tokio::test]
async fn test_unknown_bookmark_is_command_failure() {
    if !hg_available() {
        eprintln!("SKIPPED: hg not found in PATH");
        return;
    }
    let tmp = feature_repo();
    let client = HgClient::new(tmp.path(), "hg");

    let result = client
        .enumerate(&Revset::unique_history("no-such-bookmark", "master"))
        .await;

    assert!(matches!(result, Err(HgError::CommandFailed { .. })));
}
