use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use termbase_store::InMemoryBackend;
use tracing::debug;

use crate::controller::{CommitInfo, Divergence, MergeOutcome, RepositoryController};
use crate::error::{SyncError, SyncResult};

type Tree = BTreeMap<String, Vec<u8>>;

struct MemCommit {
    id: String,
    parents: Vec<usize>,
    tree: Tree,
    summary: String,
    time: DateTime<Utc>,
}

#[derive(Default)]
struct Repo {
    commits: Vec<MemCommit>,
    /// Local branch tip.
    head: Option<usize>,
    /// Remote-tracking branch, as of the last fetch.
    tracking: Option<usize>,
    /// The remote branch itself.
    upstream: Option<usize>,
    reject_push: bool,
    fail_next_merge: bool,
}

impl Repo {
    fn ancestors(&self, tip: Option<usize>) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = tip.into_iter().collect();
        while let Some(i) = stack.pop() {
            if seen.insert(i) {
                stack.extend(self.commits[i].parents.iter().copied());
            }
        }
        seen
    }

    fn is_ancestor(&self, ancestor: usize, of: usize) -> bool {
        self.ancestors(Some(of)).contains(&ancestor)
    }

    fn merge_base(&self, a: Option<usize>, b: Option<usize>) -> Option<usize> {
        let a_side = self.ancestors(a);
        let mut queue: VecDeque<usize> = b.into_iter().collect();
        let mut seen = BTreeSet::new();
        while let Some(i) = queue.pop_front() {
            if a_side.contains(&i) {
                return Some(i);
            }
            if seen.insert(i) {
                queue.extend(self.commits[i].parents.iter().copied());
            }
        }
        None
    }

    fn tree(&self, commit: Option<usize>) -> Tree {
        commit.map(|i| self.commits[i].tree.clone()).unwrap_or_default()
    }

    fn base_tree(&self) -> Tree {
        self.tree(self.merge_base(self.head, self.tracking))
    }

    fn commit(&mut self, parents: Vec<usize>, tree: Tree, summary: &str) -> usize {
        let index = self.commits.len();
        self.commits.push(MemCommit {
            id: format!("mem-{index:04}"),
            parents,
            tree,
            summary: summary.to_string(),
            time: Utc::now(),
        });
        index
    }

    fn find(&self, id: &str) -> Option<usize> {
        self.commits.iter().position(|c| c.id == id)
    }

    fn info(&self, ids: impl Iterator<Item = usize>, author: &str) -> Vec<CommitInfo> {
        let mut ids: Vec<usize> = ids.collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        ids.into_iter()
            .map(|i| CommitInfo {
                id: self.commits[i].id.clone(),
                summary: self.commits[i].summary.clone(),
                author: author.to_string(),
                time: self.commits[i].time,
            })
            .collect()
    }
}

fn changed(a: &Tree, b: &Tree) -> BTreeSet<String> {
    a.keys()
        .chain(b.keys())
        .filter(|path| a.get(*path) != b.get(*path))
        .cloned()
        .collect()
}

/// Repository controller over an [`InMemoryBackend`] working tree.
///
/// Keeps a small commit graph with a local branch, a remote-tracking branch
/// and the remote branch itself. Tests drive the remote side with
/// [`InMemoryController::commit_upstream`].
pub struct InMemoryController {
    worktree: Arc<InMemoryBackend>,
    repo: Mutex<Repo>,
    author: String,
}

impl InMemoryController {
    pub fn new(worktree: Arc<InMemoryBackend>) -> Self {
        Self {
            worktree,
            repo: Mutex::new(Repo::default()),
            author: "termbase".to_string(),
        }
    }

    fn repo(&self) -> SyncResult<MutexGuard<'_, Repo>> {
        self.repo
            .lock()
            .map_err(|_| SyncError::LockPoisoned("in-memory repository"))
    }

    fn snapshot(&self) -> SyncResult<Tree> {
        Ok(self.worktree.snapshot()?)
    }

    /// Commit `changes` directly on the remote branch, as another user
    /// would. `None` deletes the path.
    pub fn commit_upstream<'a, I>(&self, summary: &str, changes: I) -> SyncResult<String>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a [u8]>)>,
    {
        let mut repo = self.repo()?;
        let mut tree = repo.tree(repo.upstream);
        for (path, content) in changes {
            match content {
                Some(bytes) => tree.insert(path.to_string(), bytes.to_vec()),
                None => tree.remove(path),
            };
        }
        let parents = repo.upstream.into_iter().collect();
        let index = repo.commit(parents, tree, summary);
        repo.upstream = Some(index);
        Ok(repo.commits[index].id.clone())
    }

    /// Content of `path` on the remote branch.
    pub fn upstream_file(&self, path: &str) -> SyncResult<Option<Vec<u8>>> {
        let repo = self.repo()?;
        Ok(repo.tree(repo.upstream).get(path).cloned())
    }

    /// Make the next `push` fail as if the remote refused it.
    pub fn set_reject_push(&self, reject: bool) -> SyncResult<()> {
        self.repo()?.reject_push = reject;
        Ok(())
    }

    /// Make the next `merge_remote` fail without changing anything.
    pub fn fail_next_merge(&self) -> SyncResult<()> {
        self.repo()?.fail_next_merge = true;
        Ok(())
    }
}

impl RepositoryController for InMemoryController {
    fn fetch(&self) -> SyncResult<()> {
        let mut repo = self.repo()?;
        repo.tracking = repo.upstream;
        Ok(())
    }

    fn head(&self) -> SyncResult<Option<String>> {
        let repo = self.repo()?;
        Ok(repo.head.map(|i| repo.commits[i].id.clone()))
    }

    fn divergence(&self) -> SyncResult<Divergence> {
        let repo = self.repo()?;
        let local = repo.ancestors(repo.head);
        let remote = repo.ancestors(repo.tracking);
        Ok(Divergence {
            incoming: repo.info(remote.difference(&local).copied(), &self.author),
            outgoing: repo.info(local.difference(&remote).copied(), &self.author),
        })
    }

    fn local_changes(&self) -> SyncResult<BTreeSet<String>> {
        let base = self.repo()?.base_tree();
        Ok(changed(&base, &self.snapshot()?))
    }

    fn remote_changes(&self) -> SyncResult<BTreeSet<String>> {
        let repo = self.repo()?;
        Ok(changed(&repo.base_tree(), &repo.tree(repo.tracking)))
    }

    fn read_base(&self, path: &str) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.repo()?.base_tree().get(path).cloned())
    }

    fn read_remote(&self, path: &str) -> SyncResult<Option<Vec<u8>>> {
        let repo = self.repo()?;
        Ok(repo.tree(repo.tracking).get(path).cloned())
    }

    fn commit_all(&self, message: &str) -> SyncResult<Option<String>> {
        let work = self.snapshot()?;
        let mut repo = self.repo()?;
        if repo.head.is_some() && repo.tree(repo.head) == work {
            return Ok(None);
        }
        if repo.head.is_none() && work.is_empty() {
            return Ok(None);
        }
        let parents = repo.head.into_iter().collect();
        let index = repo.commit(parents, work, message);
        repo.head = Some(index);
        debug!(commit = %repo.commits[index].id, "committed working tree");
        Ok(Some(repo.commits[index].id.clone()))
    }

    fn merge_remote(
        &self,
        message: &str,
        keep_local: &BTreeSet<String>,
    ) -> SyncResult<MergeOutcome> {
        let work = self.snapshot()?;
        let mut repo = self.repo()?;
        if std::mem::take(&mut repo.fail_next_merge) {
            return Err(SyncError::repository("merge", "simulated merge failure"));
        }
        let Some(remote) = repo.tracking else {
            return Ok(MergeOutcome::UpToDate);
        };
        if let Some(head) = repo.head {
            if repo.is_ancestor(remote, head) {
                return Ok(MergeOutcome::UpToDate);
            }
        }
        if repo.tree(repo.head) != work {
            return Err(SyncError::DirtyWorkingTree);
        }

        let head = match repo.head {
            Some(head) if !repo.is_ancestor(head, remote) => head,
            _ => {
                repo.head = Some(remote);
                self.worktree.restore(repo.tree(Some(remote)))?;
                return Ok(MergeOutcome::FastForward {
                    head: repo.commits[remote].id.clone(),
                });
            }
        };

        let base = repo.tree(repo.merge_base(Some(head), Some(remote)));
        let ours = repo.tree(Some(head));
        let theirs = repo.tree(Some(remote));
        let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
        let mut merged = Tree::new();
        for path in paths {
            let (b, o, t) = (base.get(path), ours.get(path), theirs.get(path));
            let chosen = if keep_local.contains(path.as_str()) || o == t || t == b {
                o
            } else if o == b {
                t
            } else {
                return Err(SyncError::MergeConflict(path.clone()));
            };
            if let Some(content) = chosen {
                merged.insert(path.clone(), content.clone());
            }
        }

        let index = repo.commit(vec![head, remote], merged.clone(), message);
        repo.head = Some(index);
        self.worktree.restore(merged)?;
        Ok(MergeOutcome::Merged {
            commit: repo.commits[index].id.clone(),
        })
    }

    fn reset_hard(&self, commit: &str) -> SyncResult<()> {
        let mut repo = self.repo()?;
        let index = repo
            .find(commit)
            .ok_or_else(|| SyncError::repository("reset", format!("unknown commit {commit}")))?;
        repo.head = Some(index);
        self.worktree.restore(repo.tree(Some(index)))?;
        Ok(())
    }

    fn push(&self) -> SyncResult<()> {
        let mut repo = self.repo()?;
        if repo.reject_push {
            return Err(SyncError::PushRejected("remote refused the update".into()));
        }
        let Some(head) = repo.head else {
            return Ok(());
        };
        if let Some(upstream) = repo.upstream {
            if !repo.is_ancestor(upstream, head) {
                return Err(SyncError::PushRejected("not a fast-forward".into()));
            }
        }
        repo.upstream = Some(head);
        repo.tracking = Some(head);
        Ok(())
    }

    fn list_unmerged_conflicts(&self) -> SyncResult<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termbase_store::FileBackend;

    fn setup() -> (Arc<InMemoryBackend>, InMemoryController) {
        let worktree = Arc::new(InMemoryBackend::new());
        let ctl = InMemoryController::new(Arc::clone(&worktree));
        ctl.commit_upstream("initial", [("a.txt", Some(&b"a0"[..])), ("b.txt", Some(&b"b0"[..]))])
            .unwrap();
        ctl.pull().unwrap();
        (worktree, ctl)
    }

    #[test]
    fn pull_fast_forwards_into_empty_clone() {
        let (worktree, ctl) = setup();
        assert_eq!(worktree.read("a.txt").unwrap().unwrap(), b"a0");
        assert!(ctl.divergence().unwrap().is_synced());
    }

    #[test]
    fn changes_are_relative_to_merge_base() {
        let (worktree, ctl) = setup();
        worktree.write("a.txt", b"a1").unwrap();
        ctl.commit_upstream("remote edit", [("b.txt", Some(&b"b1"[..]))]).unwrap();
        ctl.fetch().unwrap();
        assert_eq!(ctl.local_changes().unwrap(), BTreeSet::from(["a.txt".to_string()]));
        assert_eq!(ctl.remote_changes().unwrap(), BTreeSet::from(["b.txt".to_string()]));
        assert_eq!(ctl.read_base("b.txt").unwrap().unwrap(), b"b0");
        assert_eq!(ctl.read_remote("b.txt").unwrap().unwrap(), b"b1");
        assert_eq!(ctl.divergence().unwrap().incoming.len(), 1);
    }

    #[test]
    fn disjoint_changes_merge_and_push() {
        let (worktree, ctl) = setup();
        worktree.write("a.txt", b"a1").unwrap();
        ctl.commit_all("local edit").unwrap().unwrap();
        ctl.commit_upstream("remote edit", [("b.txt", Some(&b"b1"[..]))]).unwrap();
        ctl.fetch().unwrap();
        let outcome = ctl.merge_remote("merge", &BTreeSet::new()).unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged { .. }));
        assert_eq!(worktree.read("b.txt").unwrap().unwrap(), b"b1");
        ctl.push().unwrap();
        assert_eq!(ctl.upstream_file("a.txt").unwrap().unwrap(), b"a1");
    }

    #[test]
    fn overlapping_change_needs_keep_local() {
        let (worktree, ctl) = setup();
        worktree.write("a.txt", b"mine").unwrap();
        ctl.commit_all("local edit").unwrap();
        ctl.commit_upstream("remote edit", [("a.txt", Some(&b"theirs"[..]))]).unwrap();
        ctl.fetch().unwrap();
        assert!(matches!(
            ctl.merge_remote("merge", &BTreeSet::new()),
            Err(SyncError::MergeConflict(p)) if p == "a.txt"
        ));
        let keep = BTreeSet::from(["a.txt".to_string()]);
        ctl.merge_remote("merge", &keep).unwrap();
        assert_eq!(worktree.read("a.txt").unwrap().unwrap(), b"mine");
    }

    #[test]
    fn merge_refuses_dirty_tree_and_commit_skips_clean_tree() {
        let (worktree, ctl) = setup();
        assert_eq!(ctl.commit_all("nothing").unwrap(), None);
        ctl.commit_upstream("remote edit", [("b.txt", Some(&b"b1"[..]))]).unwrap();
        ctl.fetch().unwrap();
        worktree.write("a.txt", b"dirty").unwrap();
        assert!(matches!(
            ctl.merge_remote("merge", &BTreeSet::new()),
            Err(SyncError::DirtyWorkingTree)
        ));
    }

    #[test]
    fn push_requires_fast_forward() {
        let (worktree, ctl) = setup();
        worktree.write("a.txt", b"a1").unwrap();
        ctl.commit_all("local").unwrap();
        ctl.commit_upstream("remote", [("b.txt", Some(&b"b1"[..]))]).unwrap();
        assert!(matches!(ctl.push(), Err(SyncError::PushRejected(_))));
    }

    #[test]
    fn reset_hard_restores_tree() {
        let (worktree, ctl) = setup();
        let before = ctl.head().unwrap().unwrap();
        worktree.write("c.txt", b"new").unwrap();
        ctl.commit_all("add c").unwrap();
        ctl.reset_hard(&before).unwrap();
        assert!(worktree.read("c.txt").unwrap().is_none());
        assert_eq!(ctl.head().unwrap().unwrap(), before);
    }
}
