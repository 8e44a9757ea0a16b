use std::path::PathBuf;

use crate::error::{GitError, GitResult};

/// Where the working copy lives and what it tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitOptions {
    pub work_dir: PathBuf,
    /// Remote to clone from and synchronize with. A URL or a local path.
    pub remote_url: Option<String>,
    pub proxy_url: Option<String>,
    pub remote_name: String,
    pub branch: String,
    pub author_name: String,
    pub author_email: String,
}

impl GitOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            remote_url: None,
            proxy_url: None,
            remote_name: "origin".to_string(),
            branch: "main".to_string(),
            author_name: "termbase".to_string(),
            author_email: "termbase@localhost".to_string(),
        }
    }

    pub fn with_remote(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// Reject malformed remote and proxy URLs before libgit2 sees them.
    /// Remotes without a scheme are local paths or scp-style addresses.
    pub fn validate(&self) -> GitResult<()> {
        if let Some(remote) = &self.remote_url {
            if remote.contains("://") {
                check_url("remote", remote)?;
            }
        }
        if let Some(proxy) = &self.proxy_url {
            check_url("proxy", proxy)?;
        }
        Ok(())
    }

    pub(crate) fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    pub(crate) fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote_name, self.branch)
    }

    pub(crate) fn push_refspec(&self) -> String {
        format!("{0}:{0}", self.branch_ref())
    }
}

fn check_url(what: &'static str, raw: &str) -> GitResult<()> {
    url::Url::parse(raw)
        .map(|_| ())
        .map_err(|source| GitError::InvalidUrl {
            what,
            url: raw.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refspecs_follow_branch_and_remote() {
        let opts = GitOptions::new("/tmp/work").with_branch("gh-pages");
        assert_eq!(opts.tracking_ref(), "refs/remotes/origin/gh-pages");
        assert_eq!(opts.push_refspec(), "refs/heads/gh-pages:refs/heads/gh-pages");
    }

    #[test]
    fn validates_urls() {
        let ok = GitOptions::new("/tmp/work")
            .with_remote("https://github.com/geolexica/osgeo-glossary")
            .with_proxy("http://proxy.local:3128");
        assert!(ok.validate().is_ok());

        assert!(GitOptions::new("/tmp/work").with_remote("/srv/git/glossary.git").validate().is_ok());
        assert!(GitOptions::new("/tmp/work").with_remote("git@github.com:geolexica/osgeo-glossary.git").validate().is_ok());

        let bad = GitOptions::new("/tmp/work").with_proxy("not a url");
        assert!(matches!(bad.validate(), Err(GitError::InvalidUrl { what: "proxy", .. })));
        let bad = GitOptions::new("/tmp/work").with_remote("https://exa mple.com/x");
        assert!(matches!(bad.validate(), Err(GitError::InvalidUrl { what: "remote", .. })));
    }
}
