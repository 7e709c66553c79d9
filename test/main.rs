// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use git2::{IndexEntry, IndexTime, Oid, Repository, RepositoryInitOptions};
use std::{
    fs::{create_dir_all, read_to_string, remove_file, write},
    path::Path,
};

pub(crate) struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("master");
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    pub(crate) fn open(&self) -> Result<Repository> {
        Ok(Repository::open(self.repo.path())?)
    }

    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<Oid> {
        let filename = filename.as_ref();
        let contents = contents.as_ref();

        // INVARIANT: Keep work tree in sync with index.
        let workdir = self.repo.workdir().unwrap();
        create_dir_all(workdir.join(filename).parent().unwrap())?;
        write(workdir.join(filename), contents)?;

        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.len() as u32,
            id: self.repo.blob(contents.as_bytes())?,
            flags: 0,
            flags_extended: 0,
            path: filename.to_string_lossy().into_owned().into_bytes(),
        };

        let mut index = self.repo.index()?;
        index.add_frombuffer(&entry, contents.as_bytes())?;
        index.write()?;

        self.commit(format!("chore: add {filename:?}"))
    }

    pub(crate) fn remove_and_commit(&self, filename: impl AsRef<Path>) -> Result<Oid> {
        let filename = filename.as_ref();
        remove_file(self.repo.workdir().unwrap().join(filename))?;

        let mut index = self.repo.index()?;
        index.remove_path(filename)?;
        index.write()?;

        self.commit(format!("chore: remove {filename:?}"))
    }

    pub(crate) fn rename_and_commit(
        &self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
    ) -> Result<Oid> {
        let from = from.as_ref();
        let workdir = self.repo.workdir().unwrap();
        let contents = read_to_string(workdir.join(from))?;

        let mut index = self.repo.index()?;
        index.remove_path(from)?;
        index.write()?;
        remove_file(workdir.join(from))?;

        self.stage_and_commit(to, contents)
    }

    /// Point remote tracking branch at commit, as if it had been fetched.
    pub(crate) fn set_remote_ref(&self, remote: &str, branch: &str, oid: Oid) -> Result<()> {
        self.repo.reference(
            &format!("refs/remotes/{remote}/{branch}"),
            oid,
            true,
            "test: fake fetch",
        )?;

        Ok(())
    }

    fn commit(&self, message: String) -> Result<Oid> {
        // INVARIANT: Always use new tree produced by index after staging.
        let mut index = self.repo.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().and_then(|head| head.target()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        // INVARIANT: Commit to HEAD by appending to obtained parent commits.
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &parents,
        )?;

        Ok(oid)
    }
}
