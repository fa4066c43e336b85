use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::merge::merge_base::MergeBaseFinder;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::remote::transport::{LocalTransport, copy_objects, missing_objects};
use crate::errors::LitError;
use std::path::Path;
use tracing::{debug, info};

impl Repository {
    // ------------------------------------------------------------------
    // Remote bookkeeping
    // ------------------------------------------------------------------

    pub fn remote_add(&self, name: &str, url: &str) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let mut config = self.config();
        if config.get(&format!("remote.{name}.url")).is_some() {
            return Err(LitError::AlreadyExists {
                kind: "remote",
                name: name.to_string(),
            }
            .into());
        }

        config.set(&format!("remote.{name}.url"), url)?;
        config.set(
            &format!("remote.{name}.fetch"),
            &format!("+refs/heads/*:refs/remotes/{name}/*"),
        )?;
        config.save()
    }

    pub fn remote_remove(&self, name: &str) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let mut config = self.config();
        let removed = config.unset(&format!("remote.{name}.url"))?;
        config.unset(&format!("remote.{name}.fetch"))?;
        if !removed {
            return Err(LitError::NotFound {
                kind: "remote",
                name: name.to_string(),
            }
            .into());
        }
        config.save()
    }

    pub fn remote_list(&self, verbose: bool) -> anyhow::Result<()> {
        let config = self.config();
        for name in config.remotes() {
            if verbose {
                let url = config.get(&format!("remote.{name}.url")).unwrap_or_default();
                writeln!(self.writer(), "{name}\t{url}")?;
            } else {
                writeln!(self.writer(), "{name}")?;
            }
        }

        Ok(())
    }

    fn remote_url(&self, name: &str) -> anyhow::Result<String> {
        self.config()
            .get(&format!("remote.{name}.url"))
            .ok_or_else(|| {
                LitError::NotFound {
                    kind: "remote",
                    name: name.to_string(),
                }
                .into()
            })
    }

    fn open_transport(&self, remote: &str) -> anyhow::Result<LocalTransport> {
        let url = self.remote_url(remote)?;
        LocalTransport::open(&url, self.root())
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    /// Fetch branches from a remote into `refs/remotes/<remote>/*`
    ///
    /// Atomic per ref: the tracking ref only moves once every object
    /// reachable from the fetched tip is stored locally.
    pub fn fetch(&self, remote: &str, branch: Option<&str>) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let transport = self.open_transport(remote)?;
        let advertised = transport.advertise_refs()?;

        let wanted: Vec<(String, ObjectId)> = match branch {
            Some(branch) => advertised
                .into_iter()
                .filter(|(name, _)| name == branch)
                .collect(),
            None => advertised,
        };

        if let Some(branch) = branch
            && wanted.is_empty()
        {
            return Err(LitError::NotFound {
                kind: "remote branch",
                name: branch.to_string(),
            }
            .into());
        }

        for (name, tip) in wanted {
            let missing = missing_objects(transport.database(), self.database(), &[tip.clone()])?;
            copy_objects(transport.database(), self.database(), &missing)?;

            let ref_path = format!("refs/remotes/{remote}/{name}");
            self.refs().update_ref(&ref_path, &tip, None)?;
            info!(%name, %tip, "fetched");
            writeln!(
                self.writer(),
                " * branch {name} -> {remote}/{name}"
            )?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Push
    // ------------------------------------------------------------------

    /// Push a branch (or tag) to a remote
    ///
    /// Refuses non-fast-forward branch updates and any tag overwrite
    /// unless forced; the remote ref is updated with compare-and-set
    /// against the advertised value after all objects have landed.
    pub fn push(&self, remote: &str, refspec: Option<&str>, force: bool) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let transport = self.open_transport(remote)?;

        // tags push by name when no branch of that name exists
        if let Some(name) = refspec
            && self.refs().read_ref(&format!("refs/tags/{name}"))?.is_some()
            && BranchName::try_parse(name)
                .map(|branch| !self.refs().branch_exists(&branch))
                .unwrap_or(false)
        {
            return self.push_tag(&transport, name, force);
        }

        let branch = match refspec {
            Some(name) => BranchName::try_parse(name)?,
            None => self.require_current_branch()?,
        };
        let local_tip = self
            .refs()
            .read_ref(branch.as_ref())?
            .ok_or_else(|| LitError::UnbornBranch {
                reference: branch.to_string(),
            })?;

        let remote_ref = branch.to_ref_path();
        let observed_tip = transport.repository().refs().read_ref(branch.as_ref())?;

        if let Some(observed) = &observed_tip
            && *observed != local_tip
            && !force
        {
            // only fast-forward updates are allowed: the observed remote
            // tip must be an ancestor of what we are pushing
            let known_locally = self.database().has(observed);
            let is_ff = known_locally
                && MergeBaseFinder::new(self.database()).is_ancestor(observed, &local_tip)?;
            if !is_ff {
                return Err(LitError::NonFastForward {
                    reference: remote_ref,
                }
                .into());
            }
        }

        let missing = missing_objects(self.database(), transport.database(), &[local_tip.clone()])?;
        debug!(count = missing.len(), "pushing objects");
        copy_objects(self.database(), transport.database(), &missing)?;

        transport.repository().refs().update_ref(
            &remote_ref,
            &local_tip,
            Some(observed_tip.as_ref()),
        )?;

        // track what we last saw on the remote
        self.refs().update_ref(
            &format!("refs/remotes/{remote}/{branch}"),
            &local_tip,
            None,
        )?;

        writeln!(
            self.writer(),
            " * {branch} -> {remote}/{branch} ({})",
            local_tip.to_short_oid()
        )?;

        Ok(())
    }

    fn push_tag(&self, transport: &LocalTransport, name: &str, force: bool) -> anyhow::Result<()> {
        let tag_ref = format!("refs/tags/{name}");
        let local_value = self
            .refs()
            .read_ref(&tag_ref)?
            .ok_or_else(|| LitError::NotFound {
                kind: "tag",
                name: name.to_string(),
            })?;

        let observed = transport.repository().refs().read_ref(&tag_ref)?;
        if let Some(observed) = &observed
            && *observed != local_value
            && !force
        {
            // tag overwrites are always rejected unless forced
            return Err(LitError::NonFastForward { reference: tag_ref }.into());
        }

        let missing =
            missing_objects(self.database(), transport.database(), &[local_value.clone()])?;
        copy_objects(self.database(), transport.database(), &missing)?;

        transport
            .repository()
            .refs()
            .update_ref(&tag_ref, &local_value, Some(observed.as_ref()))?;

        writeln!(self.writer(), " * tag {name}")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pull
    // ------------------------------------------------------------------

    /// Fetch then merge the tracking branch into HEAD
    ///
    /// With no explicit remote or branch, `branch.<name>.remote` and
    /// `branch.<name>.merge` from the config pick the upstream.
    pub fn pull(&self, remote: Option<&str>, branch: Option<&str>) -> anyhow::Result<()> {
        let current = self.require_current_branch()?;

        let remote = match remote {
            Some(name) => name.to_string(),
            None => self
                .config()
                .get(&format!("branch.{current}.remote"))
                .unwrap_or_else(|| "origin".to_string()),
        };
        let remote = remote.as_str();

        let branch_name = match branch {
            Some(name) => name.to_string(),
            None => self
                .config()
                .get(&format!("branch.{current}.merge"))
                .and_then(|merge_ref| {
                    merge_ref
                        .strip_prefix("refs/heads/")
                        .map(str::to_string)
                })
                .unwrap_or_else(|| current.to_string()),
        };

        self.fetch(remote, Some(&branch_name))?;

        let tracking = format!("{remote}/{branch_name}");
        let outcome = self.merge(&tracking, None, Some(&format!("Merge {tracking}")))?;
        if outcome.is_conflicted() {
            return Err(LitError::Conflict {
                paths: match outcome {
                    crate::commands::merge::MergeOutcome::Conflicted(paths) => paths,
                    _ => Vec::new(),
                },
            }
            .into());
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Clone
    // ------------------------------------------------------------------

    /// Clone a repository from a local URL
    pub fn clone_repository(
        url: &str,
        destination: &Path,
        bare: bool,
        writer: Box<dyn std::io::Write>,
    ) -> anyhow::Result<Repository> {
        if destination.exists() && destination.read_dir()?.next().is_some() {
            return Err(LitError::AlreadyExists {
                kind: "destination",
                name: destination.display().to_string(),
            }
            .into());
        }

        let repository = Repository::init(destination, bare, writer)?;
        let source_base = std::env::current_dir()?;

        let transport = LocalTransport::open(url, &source_base)?;
        let url_for_config = crate::artifacts::remote::transport::parse_url(url, &source_base)?;
        {
            let mut config = repository.config();
            config.set("remote.origin.url", &url_for_config.display().to_string())?;
            config.set("remote.origin.fetch", "+refs/heads/*:refs/remotes/origin/*")?;
            config.save()?;
        }

        // transfer every advertised branch
        for (name, tip) in transport.advertise_refs()? {
            let missing =
                missing_objects(transport.database(), repository.database(), &[tip.clone()])?;
            copy_objects(transport.database(), repository.database(), &missing)?;

            repository
                .refs()
                .update_ref(&format!("refs/remotes/origin/{name}"), &tip, None)?;
            if bare {
                repository
                    .refs()
                    .update_ref(&format!("refs/heads/{name}"), &tip, None)?;
            }
        }

        // attach HEAD to the remote's default branch
        let default_branch = transport
            .head_branch()?
            .unwrap_or(BranchName::try_parse(
                crate::areas::repository::DEFAULT_BRANCH,
            )?);
        repository.refs().set_head_to_branch(&default_branch)?;

        if let Some(tip) = repository
            .refs()
            .read_ref(&format!("refs/remotes/origin/{default_branch}"))?
            && !bare
        {
            // materialise the working tree from the empty tree, then
            // create the local branch (objects land before the ref)
            let target_tree = repository
                .database()
                .load_commit(&tip)?
                .tree_oid()
                .clone();
            let migration = crate::artifacts::checkout::migration::Migration::plan(
                repository.database(),
                repository.workspace(),
                None,
                Some(&target_tree),
            )?;
            {
                let mut index = repository.index();
                migration.check_dirty(&index)?;
                migration.apply(&mut index)?;
                index.write_updates()?;
            }

            repository
                .refs()
                .update_ref(&default_branch.to_ref_path(), &tip, None)?;
            let mut config = repository.config();
            config.set(&format!("branch.{default_branch}.remote"), "origin")?;
            config.set(
                &format!("branch.{default_branch}.merge"),
                &default_branch.to_ref_path(),
            )?;
            config.save()?;
        }

        writeln!(
            repository.writer(),
            "Cloned into {}",
            destination.display()
        )?;

        Ok(repository)
    }
}
