use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    Commit, Cred, CredentialType, Diff, DiffOptions, ErrorCode, FetchOptions, Index, IndexAddOption,
    IndexEntry, IndexTime, Oid, ProxyOptions, PushOptions, RemoteCallbacks, Repository,
    RepositoryInitOptions, ResetType, Signature, Sort, StatusOptions, Tree, TreeEntry,
};
use termbase_sync::{CommitInfo, Divergence, MergeOutcome, RepositoryController, SyncResult};
use tracing::{debug, info, warn};

use crate::error::{GitContext, GitError, GitResult};
use crate::options::GitOptions;

/// A working copy tracking one branch of one remote.
///
/// libgit2 repositories are not `Sync`; every operation takes the lock for
/// its whole duration, which also serializes commits and merges.
pub struct GitController {
    options: GitOptions,
    workdir: PathBuf,
    repo: Mutex<Repository>,
}

impl GitController {
    /// Open the working copy at `options.work_dir`, creating the repository
    /// when there is none. With a remote configured, fetch it and check out
    /// the remote branch if nothing has been committed locally yet.
    pub fn init_repo(options: GitOptions) -> GitResult<Self> {
        options.validate()?;
        let repo = match Repository::open(&options.work_dir) {
            Ok(repo) => repo,
            Err(e) if e.code() == ErrorCode::NotFound => {
                info!(
                    path = %options.work_dir.display(),
                    branch = %options.branch,
                    "initializing repository"
                );
                let mut init = RepositoryInitOptions::new();
                init.initial_head(&options.branch);
                Repository::init_opts(&options.work_dir, &init).op("init")?
            }
            Err(source) => return Err(GitError::Git { op: "open", source }),
        };
        if let Some(url) = &options.remote_url {
            match repo.find_remote(&options.remote_name) {
                Ok(remote) if remote.url() == Some(url.as_str()) => {}
                Ok(_) => repo.remote_set_url(&options.remote_name, url).op("set remote")?,
                Err(_) => {
                    repo.remote(&options.remote_name, url).op("add remote")?;
                }
            }
        }

        let controller = Self::from_repo(options, repo)?;
        if controller.options.remote_url.is_some() {
            controller.checkout_remote()?;
        }
        Ok(controller)
    }

    fn checkout_remote(&self) -> GitResult<()> {
        let repo = self.repo()?;
        self.fetch_in(&repo)?;
        if head_oid(&repo)?.is_none() {
            let outcome = self.merge_in(&repo, "Check out remote branch", &BTreeSet::new())?;
            debug!(?outcome, "initial checkout");
        }
        Ok(())
    }

    /// Open an existing working copy without touching the network.
    pub fn open(options: GitOptions) -> GitResult<Self> {
        options.validate()?;
        let repo = Repository::open(&options.work_dir).op("open")?;
        Self::from_repo(options, repo)
    }

    fn from_repo(options: GitOptions, repo: Repository) -> GitResult<Self> {
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::Bare(options.work_dir.clone()))?
            .to_path_buf();
        Ok(Self {
            options,
            workdir,
            repo: Mutex::new(repo),
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn options(&self) -> &GitOptions {
        &self.options
    }

    fn repo(&self) -> GitResult<MutexGuard<'_, Repository>> {
        self.repo.lock().map_err(|_| GitError::LockPoisoned)
    }

    fn signature(&self) -> GitResult<Signature<'static>> {
        Signature::now(&self.options.author_name, &self.options.author_email).op("signature")
    }

    fn callbacks<'a>(&self) -> RemoteCallbacks<'a> {
        let mut callbacks = RemoteCallbacks::new();
        let mut attempts = 0u32;
        callbacks.credentials(move |url, username, allowed| {
            attempts += 1;
            if attempts > 3 {
                return Err(git2::Error::from_str("authentication failed"));
            }
            if allowed.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                let config = git2::Config::open_default()?;
                return Cred::credential_helper(&config, url, username);
            }
            Cred::default()
        });
        callbacks
    }

    fn proxy(&self) -> ProxyOptions<'_> {
        let mut proxy = ProxyOptions::new();
        match &self.options.proxy_url {
            Some(url) => {
                proxy.url(url);
            }
            None => {
                proxy.auto();
            }
        }
        proxy
    }

    fn tracking_oid(&self, repo: &Repository) -> GitResult<Option<Oid>> {
        match repo.refname_to_id(&self.options.tracking_ref()) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(source) => Err(GitError::Git { op: "resolve", source }),
        }
    }

    /// Common ancestor of the local branch and the remote-tracking branch.
    /// Without a remote-tracking branch every local commit counts as local.
    fn base_oid(&self, repo: &Repository) -> GitResult<Option<Oid>> {
        match (head_oid(repo)?, self.tracking_oid(repo)?) {
            (Some(head), Some(remote)) => match repo.merge_base(head, remote) {
                Ok(base) => Ok(Some(base)),
                Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                Err(source) => Err(GitError::Git { op: "merge base", source }),
            },
            (Some(head), None) => Ok(Some(head)),
            (None, _) => Ok(None),
        }
    }

    fn fetch_in(&self, repo: &Repository) -> GitResult<()> {
        let name = &self.options.remote_name;
        if repo.find_remote(name).is_err() {
            return Err(GitError::NoRemote(name.clone()));
        }
        with_retry("fetch", || {
            let mut remote = repo.find_remote(name).op("fetch")?;
            let mut opts = FetchOptions::new();
            opts.remote_callbacks(self.callbacks());
            opts.proxy_options(self.proxy());
            remote
                .fetch::<&str>(&[], Some(&mut opts), None)
                .op("fetch")
        })?;
        info!(remote = %name, "fetched");
        Ok(())
    }

    fn merge_in(
        &self,
        repo: &Repository,
        message: &str,
        keep_local: &BTreeSet<String>,
    ) -> GitResult<MergeOutcome> {
        let Some(remote) = self.tracking_oid(repo)? else {
            return Ok(MergeOutcome::UpToDate);
        };
        let head = head_oid(repo)?;
        if let Some(head) = head {
            if head == remote || repo.graph_descendant_of(head, remote).op("merge")? {
                return Ok(MergeOutcome::UpToDate);
            }
        }
        if is_dirty(repo)? {
            return Err(GitError::DirtyWorkingTree);
        }

        let fast_forward = match head {
            None => true,
            Some(head) => repo.graph_descendant_of(remote, head).op("merge")?,
        };
        if fast_forward {
            let target = repo.find_commit(remote).op("merge")?;
            self.move_branch(repo, &target.tree().op("merge")?, remote, message)?;
            info!(head = %remote, "fast-forwarded");
            return Ok(MergeOutcome::FastForward {
                head: remote.to_string(),
            });
        }

        let ours = repo.find_commit(head.unwrap_or(remote)).op("merge")?;
        let theirs = repo.find_commit(remote).op("merge")?;
        let mut index = repo.merge_commits(&ours, &theirs, None).op("merge")?;
        let our_tree = ours.tree().op("merge")?;
        for path in keep_local {
            take_ours(repo, &mut index, &our_tree, path)?;
        }
        if index.has_conflicts() {
            return Err(GitError::MergeConflict(first_conflict(&index)?));
        }

        let tree_id = index.write_tree_to(repo).op("merge")?;
        let tree = repo.find_tree(tree_id).op("merge")?;
        let signature = self.signature()?;
        let commit = repo
            .commit(None, &signature, &signature, message, &tree, &[&ours, &theirs])
            .op("merge")?;
        self.move_branch(repo, &tree, commit, message)?;
        info!(%commit, kept = keep_local.len(), "merged remote branch");
        Ok(MergeOutcome::Merged {
            commit: commit.to_string(),
        })
    }

    /// Check out `tree` and point the branch at `commit`. The checkout runs
    /// first so the branch never names content the working tree lacks.
    fn move_branch(&self, repo: &Repository, tree: &Tree<'_>, commit: Oid, message: &str) -> GitResult<()> {
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        repo.checkout_tree(tree.as_object(), Some(&mut checkout))
            .op("checkout")?;
        let branch = self.options.branch_ref();
        repo.reference(&branch, commit, true, message).op("update branch")?;
        repo.set_head(&branch).op("update branch")?;
        Ok(())
    }

    fn push_in(&self, repo: &Repository) -> GitResult<()> {
        let Some(head) = head_oid(repo)? else {
            return Ok(());
        };
        let name = &self.options.remote_name;
        let refspec = self.options.push_refspec();
        with_retry("push", || {
            let mut remote = repo
                .find_remote(name)
                .map_err(|_| GitError::NoRemote(name.clone()))?;
            let mut rejection = None;
            {
                let mut callbacks = self.callbacks();
                callbacks.push_update_reference(|refname, status| {
                    if let Some(reason) = status {
                        rejection = Some(format!("{refname}: {reason}"));
                    }
                    Ok(())
                });
                let mut opts = PushOptions::new();
                opts.remote_callbacks(callbacks);
                opts.proxy_options(self.proxy());
                match remote.push(&[refspec.as_str()], Some(&mut opts)) {
                    Err(e) if e.code() == ErrorCode::NotFastForward => {
                        return Err(GitError::PushRejected(e.message().to_string()));
                    }
                    result => result.op("push")?,
                }
            }
            match rejection {
                Some(reason) => Err(GitError::PushRejected(reason)),
                None => Ok(()),
            }
        })?;
        repo.reference(&self.options.tracking_ref(), head, true, "push")
            .op("push")?;
        info!(remote = %name, %head, "pushed");
        Ok(())
    }
}

fn with_retry<T>(op: &'static str, mut attempt: impl FnMut() -> GitResult<T>) -> GitResult<T> {
    match attempt() {
        Err(e) if e.is_transient() => {
            warn!(op, error = %e, "transient git failure, retrying once");
            attempt()
        }
        result => result,
    }
}

fn head_oid(repo: &Repository) -> GitResult<Option<Oid>> {
    match repo.head() {
        Ok(head) => Ok(head.target()),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(source) => Err(GitError::Git { op: "head", source }),
    }
}

fn tree_of(repo: &Repository, commit: Option<Oid>) -> GitResult<Option<Tree<'_>>> {
    commit
        .map(|oid| repo.find_commit(oid).and_then(|c| c.tree()))
        .transpose()
        .op("read tree")
}

fn read_at(repo: &Repository, commit: Option<Oid>, path: &str) -> GitResult<Option<Vec<u8>>> {
    let Some(tree) = tree_of(repo, commit)? else {
        return Ok(None);
    };
    let entry = match tree.get_path(Path::new(path)) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(source) => return Err(GitError::Git { op: "read", source }),
    };
    let blob = repo.find_blob(entry.id()).op("read")?;
    Ok(Some(blob.content().to_vec()))
}

fn delta_paths(diff: &Diff<'_>) -> BTreeSet<String> {
    diff.deltas()
        .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
        .map(|path| path.to_string_lossy().replace('\\', "/"))
        .collect()
}

fn is_dirty(repo: &Repository) -> GitResult<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    let statuses = repo.statuses(Some(&mut opts)).op("status")?;
    Ok(!statuses.is_empty())
}

/// Replace whatever the merge produced at `path` with the local version,
/// removing the path when it does not exist locally.
fn take_ours(repo: &Repository, index: &mut Index, ours: &Tree<'_>, path: &str) -> GitResult<()> {
    index.remove_path(Path::new(path)).op("merge")?;
    if let Ok(entry) = ours.get_path(Path::new(path)) {
        let blob = repo.find_blob(entry.id()).op("merge")?;
        index
            .add(&index_entry(path, &entry, blob.size()))
            .op("merge")?;
    }
    Ok(())
}

fn index_entry(path: &str, entry: &TreeEntry<'_>, size: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: entry.filemode() as u32,
        uid: 0,
        gid: 0,
        file_size: u32::try_from(size).unwrap_or(u32::MAX),
        id: entry.id(),
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

fn first_conflict(index: &Index) -> GitResult<String> {
    for conflict in index.conflicts().op("merge")? {
        let conflict = conflict.op("merge")?;
        if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
            return Ok(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    Ok(String::new())
}

fn walk(repo: &Repository, from: Oid, hide: Option<Oid>) -> GitResult<Vec<CommitInfo>> {
    let mut walk = repo.revwalk().op("log")?;
    walk.set_sorting(Sort::TIME).op("log")?;
    walk.push(from).op("log")?;
    if let Some(hide) = hide {
        walk.hide(hide).op("log")?;
    }
    walk.map(|oid| -> Result<CommitInfo, git2::Error> {
        let commit = repo.find_commit(oid?)?;
        Ok(commit_info(&commit))
    })
    .collect::<Result<Vec<_>, _>>()
    .op("log")
}

fn commit_info(commit: &Commit<'_>) -> CommitInfo {
    CommitInfo {
        id: commit.id().to_string(),
        summary: commit.summary().unwrap_or_default().to_string(),
        author: commit.author().name().unwrap_or_default().to_string(),
        time: DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
    }
}

impl RepositoryController for GitController {
    fn fetch(&self) -> SyncResult<()> {
        let repo = self.repo()?;
        Ok(self.fetch_in(&repo)?)
    }

    fn head(&self) -> SyncResult<Option<String>> {
        let repo = self.repo()?;
        Ok(head_oid(&repo)?.map(|oid| oid.to_string()))
    }

    fn divergence(&self) -> SyncResult<Divergence> {
        let repo = self.repo()?;
        let head = head_oid(&repo)?;
        let remote = self.tracking_oid(&repo)?;
        let incoming = match remote {
            Some(remote) => walk(&repo, remote, head)?,
            None => Vec::new(),
        };
        let outgoing = match head {
            Some(head) => walk(&repo, head, remote)?,
            None => Vec::new(),
        };
        Ok(Divergence { incoming, outgoing })
    }

    fn local_changes(&self) -> SyncResult<BTreeSet<String>> {
        let repo = self.repo()?;
        let base = tree_of(&repo, self.base_oid(&repo)?)?;
        let mut opts = DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let diff = repo
            .diff_tree_to_workdir_with_index(base.as_ref(), Some(&mut opts))
            .op("diff")?;
        Ok(delta_paths(&diff))
    }

    fn remote_changes(&self) -> SyncResult<BTreeSet<String>> {
        let repo = self.repo()?;
        let Some(remote) = self.tracking_oid(&repo)? else {
            return Ok(BTreeSet::new());
        };
        let base = tree_of(&repo, self.base_oid(&repo)?)?;
        let remote = tree_of(&repo, Some(remote))?;
        let diff = repo
            .diff_tree_to_tree(base.as_ref(), remote.as_ref(), None)
            .op("diff")?;
        Ok(delta_paths(&diff))
    }

    fn read_base(&self, path: &str) -> SyncResult<Option<Vec<u8>>> {
        let repo = self.repo()?;
        let base = self.base_oid(&repo)?;
        Ok(read_at(&repo, base, path)?)
    }

    fn read_remote(&self, path: &str) -> SyncResult<Option<Vec<u8>>> {
        let repo = self.repo()?;
        let remote = self.tracking_oid(&repo)?;
        Ok(read_at(&repo, remote, path)?)
    }

    fn commit_all(&self, message: &str) -> SyncResult<Option<String>> {
        let repo = self.repo()?;
        let mut index = repo.index().op("stage")?;
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .op("stage")?;
        index.update_all(["*"], None).op("stage")?;
        index.write().op("stage")?;
        let tree_id = index.write_tree().op("commit")?;

        let parent = head_oid(&repo)?
            .map(|oid| repo.find_commit(oid))
            .transpose()
            .op("commit")?;
        match &parent {
            Some(parent) if parent.tree_id() == tree_id => return Ok(None),
            None if index.is_empty() => return Ok(None),
            _ => {}
        }

        let tree = repo.find_tree(tree_id).op("commit")?;
        let signature = self.signature()?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .op("commit")?;
        info!(commit = %oid, "committed working tree");
        Ok(Some(oid.to_string()))
    }

    fn merge_remote(
        &self,
        message: &str,
        keep_local: &BTreeSet<String>,
    ) -> SyncResult<MergeOutcome> {
        let repo = self.repo()?;
        Ok(self.merge_in(&repo, message, keep_local)?)
    }

    fn reset_hard(&self, commit: &str) -> SyncResult<()> {
        let repo = self.repo()?;
        let target = repo.revparse_single(commit).op("reset")?;
        repo.reset(&target, ResetType::Hard, None).op("reset")?;
        warn!(%commit, "reset working copy");
        Ok(())
    }

    fn push(&self) -> SyncResult<()> {
        let repo = self.repo()?;
        Ok(self.push_in(&repo)?)
    }

    fn list_unmerged_conflicts(&self) -> SyncResult<BTreeSet<String>> {
        let repo = self.repo()?;
        let index = repo.index().op("status")?;
        let mut paths = BTreeSet::new();
        for conflict in index.conflicts().op("status")? {
            let conflict = conflict.op("status")?;
            if let Some(entry) = conflict.our.or(conflict.their).or(conflict.ancestor) {
                paths.insert(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use termbase_sync::SyncError;

    fn bare_remote() -> (TempDir, String) {
        let dir = tempdir().unwrap();
        Repository::init_bare(dir.path()).unwrap();
        let url = dir.path().to_str().unwrap().to_string();
        (dir, url)
    }

    fn clone(url: &str) -> (TempDir, GitController) {
        let dir = tempdir().unwrap();
        let options = GitOptions::new(dir.path().join("work"))
            .with_remote(url)
            .with_author("Test", "test@example.org");
        (dir, GitController::init_repo(options).unwrap())
    }

    fn write(ctl: &GitController, path: &str, content: &str) {
        let full = ctl.workdir().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }

    fn read(ctl: &GitController, path: &str) -> Option<String> {
        fs::read_to_string(ctl.workdir().join(path)).ok()
    }

    /// A remote whose branch holds `a.txt` and `concepts/b.txt`.
    fn seeded() -> (TempDir, String) {
        let (dir, url) = bare_remote();
        let (_work, seed) = clone(&url);
        write(&seed, "a.txt", "a0\n");
        write(&seed, "concepts/b.txt", "b0\n");
        seed.commit_all("initial").unwrap().unwrap();
        seed.push().unwrap();
        (dir, url)
    }

    #[test]
    fn init_against_empty_remote_then_push_and_clone() {
        let (_remote, url) = bare_remote();
        let (_wa, a) = clone(&url);
        assert_eq!(a.head().unwrap(), None);
        assert_eq!(a.commit_all("nothing").unwrap(), None);

        write(&a, "a.txt", "hello\n");
        assert!(a.commit_all("first").unwrap().is_some());
        assert_eq!(a.commit_all("again").unwrap(), None);
        a.push().unwrap();

        let (_wb, b) = clone(&url);
        assert_eq!(read(&b, "a.txt").as_deref(), Some("hello\n"));
        assert_eq!(b.head().unwrap(), a.head().unwrap());
        assert!(b.divergence().unwrap().is_synced());
    }

    #[test]
    fn changes_are_relative_to_merge_base() {
        let (_remote, url) = seeded();
        let (_wa, a) = clone(&url);
        let (_wb, b) = clone(&url);
        write(&a, "a.txt", "a1\n");
        a.commit_all("edit a").unwrap();
        a.push().unwrap();

        write(&b, "concepts/b.txt", "b1\n");
        b.fetch().unwrap();
        let divergence = b.divergence().unwrap();
        assert_eq!(divergence.incoming.len(), 1);
        assert_eq!(divergence.incoming[0].summary, "edit a");
        assert!(divergence.outgoing.is_empty());
        assert_eq!(b.remote_changes().unwrap(), BTreeSet::from(["a.txt".to_string()]));
        assert_eq!(
            b.local_changes().unwrap(),
            BTreeSet::from(["concepts/b.txt".to_string()])
        );
        assert_eq!(b.read_base("a.txt").unwrap().unwrap(), b"a0\n");
        assert_eq!(b.read_remote("a.txt").unwrap().unwrap(), b"a1\n");
        assert_eq!(b.read_remote("missing.txt").unwrap(), None);
    }

    #[test]
    fn disjoint_changes_merge_and_push() {
        let (_remote, url) = seeded();
        let (_wa, a) = clone(&url);
        let (_wb, b) = clone(&url);
        write(&a, "a.txt", "a1\n");
        a.commit_all("edit a").unwrap();
        a.push().unwrap();

        write(&b, "concepts/b.txt", "b1\n");
        b.commit_all("edit b").unwrap();
        b.fetch().unwrap();
        let outcome = b.merge_remote("merge", &BTreeSet::new()).unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged { .. }));
        assert_eq!(read(&b, "a.txt").as_deref(), Some("a1\n"));
        b.push().unwrap();

        assert!(matches!(a.pull().unwrap(), MergeOutcome::FastForward { .. }));
        assert_eq!(read(&a, "concepts/b.txt").as_deref(), Some("b1\n"));
    }

    #[test]
    fn overlapping_change_needs_keep_local() {
        let (_remote, url) = seeded();
        let (_wa, a) = clone(&url);
        let (_wb, b) = clone(&url);
        write(&a, "a.txt", "theirs\n");
        a.commit_all("remote edit").unwrap();
        a.push().unwrap();

        write(&b, "a.txt", "mine\n");
        b.commit_all("local edit").unwrap();
        b.fetch().unwrap();
        assert!(matches!(
            b.merge_remote("merge", &BTreeSet::new()),
            Err(SyncError::MergeConflict(path)) if path == "a.txt"
        ));
        assert_eq!(read(&b, "a.txt").as_deref(), Some("mine\n"));

        let keep = BTreeSet::from(["a.txt".to_string()]);
        b.merge_remote("merge", &keep).unwrap();
        assert_eq!(read(&b, "a.txt").as_deref(), Some("mine\n"));
        b.push().unwrap();
        a.pull().unwrap();
        assert_eq!(read(&a, "a.txt").as_deref(), Some("mine\n"));
    }

    #[test]
    fn merge_refuses_dirty_tree() {
        let (_remote, url) = seeded();
        let (_wa, a) = clone(&url);
        let (_wb, b) = clone(&url);
        write(&a, "a.txt", "a1\n");
        a.commit_all("edit a").unwrap();
        a.push().unwrap();

        write(&b, "concepts/b.txt", "uncommitted\n");
        b.fetch().unwrap();
        assert!(matches!(
            b.merge_remote("merge", &BTreeSet::new()),
            Err(SyncError::DirtyWorkingTree)
        ));
    }

    #[test]
    fn push_behind_remote_is_refused() {
        let (_remote, url) = seeded();
        let (_wa, a) = clone(&url);
        let (_wb, b) = clone(&url);
        write(&a, "a.txt", "a1\n");
        a.commit_all("edit a").unwrap();
        a.push().unwrap();

        write(&b, "a.txt", "b's version\n");
        b.commit_all("stale edit").unwrap();
        assert!(b.push().is_err());

        let (_wc, c) = clone(&url);
        assert_eq!(read(&c, "a.txt").as_deref(), Some("a1\n"));
    }

    #[test]
    fn reset_hard_restores_committed_state() {
        let (_remote, url) = seeded();
        let (_wa, a) = clone(&url);
        let before = a.head().unwrap().unwrap();
        write(&a, "c.txt", "new\n");
        write(&a, "a.txt", "changed\n");
        a.commit_all("more").unwrap();
        a.reset_hard(&before).unwrap();
        assert_eq!(read(&a, "c.txt"), None);
        assert_eq!(read(&a, "a.txt").as_deref(), Some("a0\n"));
        assert_eq!(a.head().unwrap().unwrap(), before);
    }

    #[test]
    fn deletions_are_committed() {
        let (_remote, url) = seeded();
        let (_wa, a) = clone(&url);
        fs::remove_file(a.workdir().join("a.txt")).unwrap();
        assert!(a.local_changes().unwrap().contains("a.txt"));
        assert!(a.commit_all("remove a").unwrap().is_some());
        a.push().unwrap();
        let (_wb, b) = clone(&url);
        assert_eq!(read(&b, "a.txt"), None);
        assert!(a.list_unmerged_conflicts().unwrap().is_empty());
    }

    #[test]
    fn open_requires_existing_repository() {
        let dir = tempdir().unwrap();
        assert!(GitController::open(GitOptions::new(dir.path())).is_err());
    }
}
