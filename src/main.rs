use anyhow::Result;
use clap::{Parser, Subcommand};
use lit::Repository;
use lit::commands::log::LogOptions;
use lit::commands::merge::MergeOutcome;
use lit::commands::rebase::RebaseOutcome;
use lit::commands::reset::ResetMode;
use lit::errors::LitError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "lit",
    version = "0.1.0",
    about = "A Git-compatible distributed version control system",
    long_about = "Lit keeps its snapshots in a content-addressed object store that is \
    bit-compatible with Git's loose-object, index and ref formats."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Initialize a new repository")]
    Init {
        #[arg(index = 1, help = "Directory for the new repository")]
        path: Option<PathBuf>,
        #[arg(long, help = "Create a bare repository")]
        bare: bool,
    },
    #[command(about = "Clone a repository from a local URL")]
    Clone {
        #[arg(index = 1)]
        url: String,
        #[arg(index = 2)]
        directory: PathBuf,
        #[arg(long, help = "Create a bare clone")]
        bare: bool,
    },
    #[command(about = "Stage files for the next commit")]
    Add {
        #[arg(index = 1, required = true)]
        paths: Vec<String>,
    },
    #[command(about = "Remove files from the index")]
    Rm {
        #[arg(index = 1, required = true)]
        paths: Vec<String>,
        #[arg(long, help = "Only remove from the index")]
        cached: bool,
    },
    #[command(about = "Record the staged changes")]
    Commit {
        #[arg(short, long, default_value = "")]
        message: String,
    },
    #[command(about = "Show the working tree status")]
    Status,
    #[command(about = "Show commit history")]
    Log {
        #[arg(index = 1)]
        revisions: Vec<String>,
        #[arg(long)]
        oneline: bool,
        #[arg(short = 'n', long = "max-count")]
        max_count: Option<usize>,
        #[arg(long, value_name = "PATH")]
        path: Option<PathBuf>,
        #[arg(long)]
        graph: bool,
    },
    #[command(about = "Show a commit with its changes")]
    Show {
        #[arg(index = 1)]
        revision: Option<String>,
    },
    #[command(about = "Show changes between trees, the index and the working tree")]
    Diff {
        #[arg(index = 1)]
        revisions: Vec<String>,
        #[arg(long, help = "Compare the index against HEAD")]
        cached: bool,
    },
    #[command(about = "Create, list or delete branches")]
    Branch {
        #[arg(index = 1)]
        name: Option<String>,
        #[arg(index = 2)]
        start_point: Option<String>,
        #[arg(short, long, help = "Delete a branch")]
        delete: bool,
    },
    #[command(about = "Switch branches or restore a detached commit")]
    Checkout {
        #[arg(index = 1)]
        target: String,
        #[arg(short = 'b', help = "Create the branch first")]
        create: bool,
    },
    #[command(about = "Switch branches")]
    Switch {
        #[arg(index = 1)]
        target: String,
        #[arg(short = 'c', help = "Create the branch first")]
        create: bool,
    },
    #[command(about = "Merge a revision into the current branch")]
    Merge {
        #[arg(index = 1)]
        target: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long, value_name = "STRATEGY", help = "Auto-resolve conflicts: ours|theirs|union|recent")]
        auto: Option<String>,
        #[arg(long, help = "Abort the in-progress merge")]
        abort: bool,
    },
    #[command(name = "cherry-pick", about = "Apply an existing commit on top of HEAD")]
    CherryPick {
        #[arg(index = 1)]
        target: Option<String>,
        #[arg(long = "continue", help = "Conclude after resolving conflicts")]
        resume: bool,
        #[arg(long, help = "Abort the in-progress cherry-pick")]
        abort: bool,
    },
    #[command(about = "Replay commits on top of another base")]
    Rebase {
        #[arg(index = 1)]
        upstream: Option<String>,
        #[arg(long = "continue", help = "Resume after resolving conflicts")]
        resume: bool,
        #[arg(long, help = "Abort and restore the original branch")]
        abort: bool,
    },
    #[command(about = "Reset HEAD to a commit")]
    Reset {
        #[arg(index = 1, default_value = "HEAD")]
        target: String,
        #[arg(long, conflicts_with_all = ["mixed", "hard"])]
        soft: bool,
        #[arg(long, conflicts_with = "hard")]
        mixed: bool,
        #[arg(long)]
        hard: bool,
    },
    #[command(about = "Stash working-tree changes away")]
    Stash {
        #[command(subcommand)]
        action: Option<StashAction>,
    },
    #[command(about = "Create, list or delete tags")]
    Tag {
        #[arg(index = 1)]
        name: Option<String>,
        #[arg(index = 2)]
        target: Option<String>,
        #[arg(short = 'a', help = "Create an annotated tag", requires = "message")]
        annotate: bool,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(short, long, help = "Delete the tag")]
        delete: bool,
        #[arg(short, long, help = "Replace an existing tag")]
        force: bool,
    },
    #[command(about = "Manage remote repositories")]
    Remote {
        #[command(subcommand)]
        action: Option<RemoteAction>,
    },
    #[command(about = "Download objects and refs from a remote")]
    Fetch {
        #[arg(index = 1, default_value = "origin")]
        remote: String,
        #[arg(index = 2)]
        branch: Option<String>,
    },
    #[command(about = "Fetch and merge a remote branch")]
    Pull {
        #[arg(index = 1)]
        remote: Option<String>,
        #[arg(index = 2)]
        branch: Option<String>,
    },
    #[command(about = "Upload objects and update a remote ref")]
    Push {
        #[arg(index = 1, default_value = "origin")]
        remote: String,
        #[arg(index = 2)]
        refspec: Option<String>,
        #[arg(short, long)]
        force: bool,
    },
    #[command(about = "Read or write configuration values")]
    Config {
        #[arg(index = 1)]
        key: Option<String>,
        #[arg(index = 2)]
        value: Option<String>,
        #[arg(long)]
        unset: bool,
        #[arg(short, long)]
        list: bool,
    },
    #[command(name = "show-ref", about = "List references with their targets")]
    ShowRef,
    #[command(name = "symbolic-ref", about = "Print the target of a symbolic ref")]
    SymbolicRef {
        #[arg(index = 1, default_value = "HEAD")]
        name: String,
    },
    #[command(name = "ls-tree", about = "List the contents of a tree object")]
    LsTree {
        #[arg(index = 1)]
        revision: String,
        #[arg(short, help = "Recurse into subtrees")]
        recursive: bool,
    },
    #[command(name = "cat-file", about = "Print an object's content or type")]
    CatFile {
        #[arg(index = 1)]
        revision: String,
        #[arg(short = 't', help = "Print the object type only")]
        type_only: bool,
    },
    #[command(name = "hash-object", about = "Hash a file, optionally storing the blob")]
    HashObject {
        #[arg(index = 1)]
        file: PathBuf,
        #[arg(short, help = "Write the blob to the object store")]
        write: bool,
    },
    #[command(name = "count-objects", about = "Count stored objects")]
    CountObjects,
}

#[derive(Subcommand)]
enum StashAction {
    Push {
        #[arg(short, long)]
        message: Option<String>,
    },
    List,
    Show {
        #[arg(index = 1, default_value_t = 0)]
        index: usize,
    },
    Apply {
        #[arg(index = 1, default_value_t = 0)]
        index: usize,
    },
    Pop {
        #[arg(index = 1, default_value_t = 0)]
        index: usize,
    },
    Drop {
        #[arg(index = 1, default_value_t = 0)]
        index: usize,
    },
    Clear,
}

#[derive(Subcommand)]
enum RemoteAction {
    Add {
        #[arg(index = 1)]
        name: String,
        #[arg(index = 2)]
        url: String,
    },
    Remove {
        #[arg(index = 1)]
        name: String,
    },
}

fn open_repository() -> Result<Repository> {
    let pwd = std::env::current_dir()?;
    Repository::open(&pwd, Box::new(std::io::stdout()))
}

fn run(command: Commands) -> Result<i32> {
    match command {
        Commands::Init { path, bare } => {
            let target = match path {
                Some(path) => path,
                None => std::env::current_dir()?,
            };
            lit::commands::init::run(&target, bare, Box::new(std::io::stdout()))?;
        }
        Commands::Clone { url, directory, bare } => {
            Repository::clone_repository(&url, &directory, bare, Box::new(std::io::stdout()))?;
        }
        Commands::Add { paths } => open_repository()?.add(&paths)?,
        Commands::Rm { paths, cached } => open_repository()?.remove_path(&paths, cached)?,
        Commands::Commit { message } => {
            open_repository()?.commit(&message)?;
        }
        Commands::Status => open_repository()?.print_status()?,
        Commands::Log {
            revisions,
            oneline,
            max_count,
            path,
            graph,
        } => {
            open_repository()?.log(&LogOptions {
                revisions,
                oneline,
                max_count,
                path,
                graph,
            })?;
        }
        Commands::Show { revision } => open_repository()?.show(revision.as_deref())?,
        Commands::Diff { revisions, cached } => open_repository()?.diff(cached, &revisions)?,
        Commands::Branch {
            name,
            start_point,
            delete,
        } => {
            let repository = open_repository()?;
            match name {
                None => repository.list_branches()?,
                Some(name) if delete => repository.delete_branch(&name)?,
                Some(name) => repository.create_branch(&name, start_point.as_deref())?,
            }
        }
        Commands::Checkout { target, create } | Commands::Switch { target, create } => {
            open_repository()?.checkout(&target, create)?;
        }
        Commands::Merge {
            target,
            message,
            auto,
            abort,
        } => {
            let repository = open_repository()?;
            if abort {
                repository.merge_abort()?;
                return Ok(0);
            }

            let target = target.ok_or_else(|| anyhow::anyhow!("merge requires a revision"))?;
            let strategy = match auto.as_deref() {
                Some(name) => Some(
                    lit::artifacts::merge::text_merge::Strategy::parse(name)
                        .ok_or_else(|| anyhow::anyhow!("unknown strategy {name:?}"))?,
                ),
                None => None,
            };
            if let MergeOutcome::Conflicted(_) = repository.merge(&target, strategy, message.as_deref())? {
                return Ok(1);
            }
        }
        Commands::CherryPick {
            target,
            resume,
            abort,
        } => {
            let repository = open_repository()?;
            if abort {
                repository.cherry_pick_abort()?;
            } else if resume {
                repository.cherry_pick_continue()?;
            } else {
                let target =
                    target.ok_or_else(|| anyhow::anyhow!("cherry-pick requires a revision"))?;
                if repository.cherry_pick(&target)?.is_conflicted() {
                    return Ok(1);
                }
            }
        }
        Commands::Rebase {
            upstream,
            resume,
            abort,
        } => {
            let repository = open_repository()?;
            let outcome = if abort {
                repository.rebase_abort()?;
                return Ok(0);
            } else if resume {
                repository.rebase_continue()?
            } else {
                let upstream =
                    upstream.ok_or_else(|| anyhow::anyhow!("rebase requires an upstream"))?;
                repository.rebase(&upstream)?
            };
            if matches!(outcome, RebaseOutcome::Stopped { .. }) {
                return Ok(1);
            }
        }
        Commands::Reset {
            target,
            soft,
            mixed: _,
            hard,
        } => {
            let mode = if soft {
                ResetMode::Soft
            } else if hard {
                ResetMode::Hard
            } else {
                ResetMode::Mixed
            };
            open_repository()?.reset(&target, mode)?;
        }
        Commands::Stash { action } => {
            let repository = open_repository()?;
            match action.unwrap_or(StashAction::Push { message: None }) {
                StashAction::Push { message } => {
                    repository.stash_push(message.as_deref())?;
                }
                StashAction::List => repository.stash_list()?,
                StashAction::Show { index } => repository.stash_show(index)?,
                StashAction::Apply { index } => {
                    if repository.stash_apply(index)?.is_conflicted() {
                        return Ok(1);
                    }
                }
                StashAction::Pop { index } => {
                    if repository.stash_pop(index)?.is_conflicted() {
                        return Ok(1);
                    }
                }
                StashAction::Drop { index } => repository.stash_drop(index)?,
                StashAction::Clear => repository.stash_clear()?,
            }
        }
        Commands::Tag {
            name,
            target,
            annotate: _,
            message,
            delete,
            force,
        } => {
            let repository = open_repository()?;
            match name {
                None => repository.list_tags()?,
                Some(name) if delete => repository.delete_tag(&name)?,
                Some(name) => repository.create_tag(
                    &name,
                    target.as_deref(),
                    message.as_deref(),
                    force,
                )?,
            }
        }
        Commands::Remote { action } => {
            let repository = open_repository()?;
            match action {
                None => repository.remote_list(true)?,
                Some(RemoteAction::Add { name, url }) => repository.remote_add(&name, &url)?,
                Some(RemoteAction::Remove { name }) => repository.remote_remove(&name)?,
            }
        }
        Commands::Fetch { remote, branch } => {
            open_repository()?.fetch(&remote, branch.as_deref())?;
        }
        Commands::Pull { remote, branch } => {
            open_repository()?.pull(remote.as_deref(), branch.as_deref())?;
        }
        Commands::Push {
            remote,
            refspec,
            force,
        } => {
            open_repository()?.push(&remote, refspec.as_deref(), force)?;
        }
        Commands::Config {
            key,
            value,
            unset,
            list,
        } => {
            let repository = open_repository()?;
            if list {
                repository.config_list()?;
            } else {
                let key = key.ok_or_else(|| anyhow::anyhow!("config requires a key"))?;
                repository.config_command(&key, value.as_deref(), unset)?;
            }
        }
        Commands::ShowRef => open_repository()?.show_ref()?,
        Commands::SymbolicRef { name } => open_repository()?.symbolic_ref(&name)?,
        Commands::LsTree {
            revision,
            recursive,
        } => open_repository()?.ls_tree(&revision, recursive)?,
        Commands::CatFile {
            revision,
            type_only,
        } => open_repository()?.cat_file(&revision, type_only)?,
        Commands::HashObject { file, write } => {
            open_repository()?.hash_object(&file, write)?;
        }
        Commands::CountObjects => open_repository()?.count_objects()?,
    }

    Ok(0)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LIT_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            // known conditions exit 1, everything else is fatal
            let code = error
                .downcast_ref::<LitError>()
                .map(LitError::exit_code)
                .unwrap_or(128);
            if code == 128 {
                eprintln!("fatal: {error:#}");
            } else {
                eprintln!("error: {error:#}");
            }
            std::process::exit(code);
        }
    }
}
