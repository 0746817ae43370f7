//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `ScriptedAnalyzer`, `ScriptedOracle`, `MemoryVcs` and
//! `RecordingNotifier` that satisfy the trait contracts without any external
//! tools or network access.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::collaborators::{Analyzer, Notifier, SuggestionOracle, SuggestionRequest, VcsClient};
use crate::domain::{ChangeRef, Finding, GuardianError, Result};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// ScriptedAnalyzer
// ---------------------------------------------------------------------------

/// Analyzer that returns a fixed list of findings, or a fixed failure.
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    findings: Vec<Finding>,
    failure: Option<String>,
    panic: Option<String>,
    calls: Mutex<Vec<PathBuf>>,
}

impl ScriptedAnalyzer {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            ..Self::default()
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Analyzer that panics when invoked.
    pub fn panicking(message: impl Into<String>) -> Self {
        Self {
            panic: Some(message.into()),
            ..Self::default()
        }
    }

    /// Workspace roots the analyzer was invoked on.
    pub fn calls(&self) -> Vec<PathBuf> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(&self, workspace_root: &Path) -> Result<Vec<Finding>> {
        lock(&self.calls).push(workspace_root.to_path_buf());
        if let Some(message) = &self.panic {
            panic!("{message}");
        }
        match &self.failure {
            Some(message) => Err(GuardianError::Analyzer(message.clone())),
            None => Ok(self.findings.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Text(String),
    Fail(String),
    Panic(String),
}

/// Oracle that replays queued responses per file path.
///
/// Files with nothing queued get an empty response (no patch blocks).
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    queues: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<SuggestionRequest>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, file_path: &str, item: Scripted) -> Self {
        lock(&self.queues)
            .entry(file_path.to_string())
            .or_default()
            .push_back(item);
        self
    }

    /// Queue a response for the next request about `file_path`.
    pub fn respond(self, file_path: &str, text: impl Into<String>) -> Self {
        self.push(file_path, Scripted::Text(text.into()))
    }

    /// Queue a request failure for `file_path`.
    pub fn fail(self, file_path: &str, message: impl Into<String>) -> Self {
        self.push(file_path, Scripted::Fail(message.into()))
    }

    /// Queue a panic, standing in for a defect inside the fix cycle.
    pub fn panic_on(self, file_path: &str, message: impl Into<String>) -> Self {
        self.push(file_path, Scripted::Panic(message.into()))
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<SuggestionRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl SuggestionOracle for ScriptedOracle {
    async fn suggest(&self, request: &SuggestionRequest) -> Result<String> {
        lock(&self.requests).push(request.clone());
        let next = lock(&self.queues)
            .get_mut(&request.file_path)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(GuardianError::Suggestion(message)),
            Some(Scripted::Panic(message)) => panic!("{message}"),
            None => Ok(String::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryVcs
// ---------------------------------------------------------------------------

/// A commit recorded by [`MemoryVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub repo_root: PathBuf,
    pub files: Vec<String>,
    pub message: String,
}

/// VCS fake whose "remote" is an in-memory file tree.
///
/// `clone_repo` writes the tree into the destination directory; commits and
/// pushes are recorded instead of performed.
#[derive(Debug, Default)]
pub struct MemoryVcs {
    tree: BTreeMap<String, String>,
    fail_clone: Option<String>,
    fail_checkout: Option<String>,
    reject_push: Option<String>,
    clones: Mutex<Vec<PathBuf>>,
    staged: Mutex<HashMap<PathBuf, Vec<String>>>,
    commits: Mutex<Vec<RecordedCommit>>,
    pushes: Mutex<Vec<String>>,
    known_roots: Mutex<HashSet<PathBuf>>,
}

impl MemoryVcs {
    pub fn new<I, K, V>(files: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            tree: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_clone_failure(mut self, message: impl Into<String>) -> Self {
        self.fail_clone = Some(message.into());
        self
    }

    pub fn with_checkout_failure(mut self, message: impl Into<String>) -> Self {
        self.fail_checkout = Some(message.into());
        self
    }

    pub fn with_push_rejection(mut self, message: impl Into<String>) -> Self {
        self.reject_push = Some(message.into());
        self
    }

    pub fn clones(&self) -> Vec<PathBuf> {
        lock(&self.clones).clone()
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        lock(&self.commits).clone()
    }

    /// Branches pushed successfully.
    pub fn pushes(&self) -> Vec<String> {
        lock(&self.pushes).clone()
    }
}

#[async_trait]
impl VcsClient for MemoryVcs {
    async fn clone_repo(&self, _repo_url: &str, dest: &Path) -> Result<()> {
        if let Some(message) = &self.fail_clone {
            return Err(GuardianError::Vcs(message.clone()));
        }
        if dest.exists() {
            return Err(GuardianError::Vcs(format!(
                "destination already exists: {}",
                dest.display()
            )));
        }
        for (rel, content) in &self.tree {
            let path = dest.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content)?;
        }
        std::fs::create_dir_all(dest)?;
        lock(&self.clones).push(dest.to_path_buf());
        lock(&self.known_roots).insert(dest.to_path_buf());
        Ok(())
    }

    async fn checkout(&self, repo_root: &Path, branch: &str) -> Result<String> {
        if let Some(message) = &self.fail_checkout {
            return Err(GuardianError::Vcs(message.clone()));
        }
        if !lock(&self.known_roots).contains(repo_root) {
            return Err(GuardianError::Vcs(format!(
                "not a clone: {}",
                repo_root.display()
            )));
        }
        Ok(format!("fake-head-{branch}"))
    }

    async fn stage(&self, repo_root: &Path, files: &[String]) -> Result<()> {
        for file in files {
            if !repo_root.join(file).is_file() {
                return Err(GuardianError::Vcs(format!("pathspec '{file}' did not match")));
            }
        }
        lock(&self.staged)
            .entry(repo_root.to_path_buf())
            .or_default()
            .extend(files.iter().cloned());
        Ok(())
    }

    async fn commit(&self, repo_root: &Path, message: &str) -> Result<String> {
        let files = lock(&self.staged).remove(repo_root).unwrap_or_default();
        if files.is_empty() {
            return Err(GuardianError::Vcs("nothing to commit".to_string()));
        }
        let mut commits = lock(&self.commits);
        commits.push(RecordedCommit {
            repo_root: repo_root.to_path_buf(),
            files,
            message: message.to_string(),
        });
        Ok(format!("fake-commit-{}", commits.len()))
    }

    async fn push(&self, _repo_root: &Path, branch: &str) -> Result<()> {
        if let Some(message) = &self.reject_push {
            return Err(GuardianError::Vcs(message.clone()));
        }
        lock(&self.pushes).push(branch.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Notifier that records every comment body it is asked to post.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    fail: bool,
    posted: Mutex<Vec<(ChangeRef, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every post fails (attempts are still recorded).
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        lock(&self.posted).iter().map(|(_, b)| b.clone()).collect()
    }

    pub fn posted(&self) -> Vec<(ChangeRef, String)> {
        lock(&self.posted).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_comment(&self, change: &ChangeRef, body: &str) -> Result<()> {
        lock(&self.posted).push((change.clone(), body.to_string()));
        if self.fail {
            return Err(GuardianError::Notify("comment endpoint unavailable".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Confidence;

    #[tokio::test]
    async fn test_scripted_oracle_replays_per_file_in_order() {
        let oracle = ScriptedOracle::new()
            .respond("a.py", "first")
            .respond("a.py", "second")
            .fail("b.py", "quota");

        let finding = Finding::new("a.py", 1, "x", Confidence::Low);
        let req = SuggestionRequest::for_finding(&finding, "a.py", "");
        assert_eq!(oracle.suggest(&req).await.unwrap(), "first");
        assert_eq!(oracle.suggest(&req).await.unwrap(), "second");
        assert_eq!(oracle.suggest(&req).await.unwrap(), "");

        let req_b = SuggestionRequest::for_finding(&finding, "b.py", "");
        assert!(oracle.suggest(&req_b).await.is_err());
        assert_eq!(oracle.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_memory_vcs_clone_stage_commit_push() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("clone");
        let vcs = MemoryVcs::new([("pkg/app.py", "x = 1\n")]);

        vcs.clone_repo("mem://repo", &dest).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dest.join("pkg/app.py")).unwrap(),
            "x = 1\n"
        );
        assert_eq!(vcs.checkout(&dest, "main").await.unwrap(), "fake-head-main");

        vcs.stage(&dest, &["pkg/app.py".to_string()]).await.unwrap();
        vcs.commit(&dest, "msg").await.unwrap();
        vcs.push(&dest, "main").await.unwrap();

        let commits = vcs.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].files, vec!["pkg/app.py".to_string()]);
        assert_eq!(vcs.pushes(), vec!["main".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_vcs_rejects_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let vcs = MemoryVcs::new(Vec::<(String, String)>::new());
        assert!(vcs.clone_repo("mem://repo", dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_failing_notifier_records_attempt() {
        let notifier = RecordingNotifier::failing();
        let change = ChangeRef {
            owner: "o".to_string(),
            repo: "r".to_string(),
            number: 1,
        };
        assert!(notifier.post_comment(&change, "hello").await.is_err());
        assert_eq!(notifier.bodies(), vec!["hello".to_string()]);
    }
}
