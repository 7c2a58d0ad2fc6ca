#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::Command;

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Wiki Test",
            "-c",
            "user.email=wiki@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Create a git repository at `dir` holding `files`, committed once.
pub fn init_origin(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "--quiet"]);
    commit_files(dir, files, "initial");
}

pub fn commit_files(dir: &Path, files: &[(&str, &str)], message: &str) {
    for (path, content) in files {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
    git(dir, &["add", "--all"]);
    git(dir, &["commit", "--quiet", "-m", message]);
}

pub fn sample_wiki() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "Lambda.md",
            "# AWS Lambda\n\nLambda runs code without provisioning servers.",
        ),
        (
            "S3.md",
            "# Amazon S3\n\nS3 stores objects in buckets.",
        ),
        ("guides/VPC.md", "# VPC\n\nSubnets and route tables."),
        (".hidden.md", "lambda notes that must never show up"),
    ]
}
