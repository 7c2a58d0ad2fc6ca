//! Local git mirror of the remote wiki.
//!
//! The mirror knows how to clone, fast-forward, list and read files. It has
//! no notion of queries; see [`crate::engine`] for that.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{MirrorError, Result};

/// Remote address plus the directory the checkout lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub url: String,
    pub local_path: PathBuf,
    /// Branch to clone. `None` follows the remote's default branch.
    pub branch: Option<String>,
    /// Subdirectory that holds the documents. `None` means the whole checkout.
    pub knowledge_dir: Option<PathBuf>,
}

impl RepoLocation {
    pub fn new(url: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
            branch: None,
            knowledge_dir: None,
        }
    }

    /// Directory that handles are relative to.
    pub fn documents_root(&self) -> PathBuf {
        match &self.knowledge_dir {
            Some(dir) => self.local_path.join(dir),
            None => self.local_path.clone(),
        }
    }
}

/// Raw access to a synchronized document collection.
///
/// [`crate::engine::RetrievalEngine`] drives any implementation through the
/// same sync → list → read sequence; [`GitMirror`] is the production one.
pub trait DocumentStore: Send {
    /// Bring the local copy up to date with the remote.
    fn sync(&mut self) -> Result<()>;

    /// Every non-hidden regular file, as paths relative to the documents root.
    fn list_files(&self) -> Result<Vec<PathBuf>>;

    /// Full UTF-8 content of one file. Absolute paths are used as given.
    fn read_file(&self, path: &Path) -> Result<String>;
}

/// A git checkout kept in sync with `git clone` / `git pull --ff-only`.
#[derive(Debug, Clone)]
pub struct GitMirror {
    location: RepoLocation,
}

impl GitMirror {
    pub fn new(location: RepoLocation) -> Self {
        Self { location }
    }

    /// Whether a previous clone left its control directory behind.
    pub fn is_cloned(&self) -> bool {
        self.location.local_path.join(".git").exists()
    }

    fn clone_repo(&self) -> Result<()> {
        let dest = &self.location.local_path;
        std::fs::create_dir_all(dest).map_err(|e| MirrorError::io(dest, e))?;

        info!(url = %self.location.url, dest = %dest.display(), "cloning wiki");
        run_git(self.clone_command(), "clone")
    }

    /// `--` keeps a URL that starts with `-` from being read as an option.
    fn clone_command(&self) -> Command {
        let mut cmd = git_command();
        cmd.arg("clone");
        if let Some(branch) = &self.location.branch {
            cmd.args(["--branch", branch.as_str(), "--single-branch"]);
        }
        cmd.arg("--")
            .arg(&self.location.url)
            .arg(&self.location.local_path);
        cmd
    }

    fn pull(&self) -> Result<()> {
        let repo_dir = &self.location.local_path;
        info!(dest = %repo_dir.display(), "pulling wiki");

        let mut cmd = git_command();
        cmd.current_dir(repo_dir).args(["pull", "--ff-only"]);
        if let Some(branch) = &self.location.branch {
            cmd.args(["origin", branch.as_str()]);
        }

        run_git(cmd, "pull")
    }
}

impl DocumentStore for GitMirror {
    fn sync(&mut self) -> Result<()> {
        if self.is_cloned() {
            self.pull()
        } else {
            self.clone_repo()
        }
    }

    fn list_files(&self) -> Result<Vec<PathBuf>> {
        list_visible_files(&self.location.documents_root())
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.location.documents_root().join(path)
        };
        read_text(&resolved)
    }
}

/// A `git` invocation that never blocks on a credential prompt.
fn git_command() -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

fn run_git(mut cmd: Command, action: &str) -> Result<()> {
    let output = cmd
        .output()
        .map_err(|e| MirrorError::sync(format!("failed to execute 'git {}': {}", action, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MirrorError::sync(format!(
            "git {} failed: {}",
            action,
            stderr.trim()
        )));
    }

    debug!(action, "git finished");
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Walk `root` and return every regular file whose name does not start with
/// a dot, relative to `root`. Hidden directories are pruned.
///
/// Symlinks are followed, so a link to a file is listed under the link's
/// name. Dangling links and links that loop back to an ancestor are skipped.
/// A missing root yields an empty listing.
pub fn list_visible_files(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if is_skippable_link(&e) => {
                warn!(path = ?e.path(), error = %e, "skipping unresolvable symlink");
                continue;
            }
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed"));
                return Err(MirrorError::io(path, source));
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        files.push(relative.to_path_buf());
    }

    Ok(files)
}

/// A symlink below the root that points nowhere or at one of its ancestors.
fn is_skippable_link(err: &walkdir::Error) -> bool {
    if err.depth() == 0 {
        return false;
    }
    if err.loop_ancestor().is_some() {
        return true;
    }
    let dangling = err
        .io_error()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound);
    dangling && err.path().is_some_and(|p| p.is_symlink())
}

/// Read a file as UTF-8, mapping a missing file to [`MirrorError::NotFound`].
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MirrorError::NotFound(path.to_path_buf()),
        _ => MirrorError::io(path, e),
    })?;
    String::from_utf8(bytes).map_err(|_| MirrorError::Decode(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mirror_at(path: &Path) -> GitMirror {
        GitMirror::new(RepoLocation::new("https://example.invalid/wiki.git", path))
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let mirror = mirror_at(&tmp.path().join("never-cloned"));
        assert!(mirror.list_files().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_hidden_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/master").unwrap();
        fs::write(root.join(".gitignore"), "*.tmp").unwrap();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::write(root.join("Home.md"), "home").unwrap();
        fs::write(root.join("guides/Lambda.md"), "lambda").unwrap();
        fs::write(root.join("guides/.draft.md"), "draft").unwrap();

        let files = mirror_at(root).list_files().unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("Home.md"), PathBuf::from("guides/Lambda.md")]
        );
        assert!(files.iter().all(|p| !p
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with('.')));
    }

    #[test]
    fn test_list_includes_non_markdown_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("diagram.png"), [0u8, 159, 146, 150]).unwrap();
        fs::write(tmp.path().join("notes.txt"), "notes").unwrap();

        let files = mirror_at(tmp.path()).list_files().unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_knowledge_dir_scopes_listing_and_reads() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("README.md"), "top level").unwrap();
        fs::write(root.join("docs/S3.md"), "buckets").unwrap();

        let mut location = RepoLocation::new("https://example.invalid/wiki.git", root);
        location.knowledge_dir = Some(PathBuf::from("docs"));
        let mirror = GitMirror::new(location);

        let files = mirror.list_files().unwrap();
        assert_eq!(files, vec![PathBuf::from("S3.md")]);
        assert_eq!(mirror.read_file(&files[0]).unwrap(), "buckets");
    }

    #[test]
    fn test_read_relative_and_absolute() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("doc.md"), "Lambda information").unwrap();
        let mirror = mirror_at(tmp.path());

        assert_eq!(
            mirror.read_file(Path::new("doc.md")).unwrap(),
            "Lambda information"
        );
        assert_eq!(
            mirror.read_file(&tmp.path().join("doc.md")).unwrap(),
            "Lambda information"
        );
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = mirror_at(tmp.path())
            .read_file(Path::new("gone.md"))
            .unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
    }

    #[test]
    fn test_read_binary_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("blob.bin"), [0xffu8, 0xfe, 0x00]).unwrap();
        let err = mirror_at(tmp.path())
            .read_file(Path::new("blob.bin"))
            .unwrap_err();
        assert!(matches!(err, MirrorError::Decode(_)));
    }

    #[test]
    fn test_is_cloned_requires_git_dir() {
        let tmp = TempDir::new().unwrap();
        let mirror = mirror_at(tmp.path());
        assert!(!mirror.is_cloned());

        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        assert!(mirror.is_cloned());
    }

    #[cfg(unix)]
    #[test]
    fn test_list_follows_symlinks() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("real.md"), "lambda").unwrap();
        std::os::unix::fs::symlink(root.join("real.md"), root.join("link.md")).unwrap();
        std::os::unix::fs::symlink(root.join("missing.md"), root.join("dangling.md")).unwrap();
        fs::create_dir_all(root.join("nested")).unwrap();
        std::os::unix::fs::symlink(root, root.join("nested/loop")).unwrap();

        let mirror = mirror_at(root);
        let files = mirror.list_files().unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("link.md"), PathBuf::from("real.md")]
        );
        assert_eq!(mirror.read_file(Path::new("link.md")).unwrap(), "lambda");
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_clone_command_ends_options_before_url() {
        let mut location = RepoLocation::new("--upload-pack=touch /tmp/owned", "/srv/wiki");
        location.branch = Some("master".to_string());

        let cmd = GitMirror::new(location).clone_command();
        assert_eq!(
            args_of(&cmd),
            vec![
                "clone",
                "--branch",
                "master",
                "--single-branch",
                "--",
                "--upload-pack=touch /tmp/owned",
                "/srv/wiki",
            ]
        );
    }

    #[test]
    fn test_sync_unreachable_remote_is_sync_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("mirror");
        let mut mirror = GitMirror::new(RepoLocation::new(
            tmp.path().join("no-such-repo").to_string_lossy().to_string(),
            &dest,
        ));

        let err = mirror.sync().unwrap_err();
        assert!(matches!(err, MirrorError::Sync { .. }), "got: {err}");
        // the destination is still created before the clone is attempted
        assert!(dest.exists());
    }
}
