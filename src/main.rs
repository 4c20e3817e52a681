//! RepoPool - a pool of git repositories
//!
//! This is the main entry point for the repopool command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use repopool::archive;
use repopool::pool::{Manifest, PoolError, RepositoryPool};

#[derive(Debug, Parser)]
#[command(name = "repopool", version, about = "Treat many git repositories as one pool")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Count the commit objects of every repository in the pool
    Count {
        /// Plain repository directories
        paths: Vec<PathBuf>,

        /// Archive files
        #[arg(short, long = "archive")]
        archives: Vec<PathBuf>,

        /// Directories to search for repositories and archives
        #[arg(short, long)]
        discover: Vec<PathBuf>,

        /// JSON manifest listing repositories
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Directory for archive scratch directories
        #[arg(long)]
        scratch_root: Option<PathBuf>,

        /// Number of workers pulling from the pool
        #[arg(short = 'j', long, default_value_t = 4)]
        workers: usize,
    },

    /// Pack a repository directory into a siva archive
    Pack {
        /// Repository directory (bare or with .git)
        src: PathBuf,

        /// Archive to create
        dest: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<ExitCode, Box<dyn std::error::Error>> = match cli.command {
        Command::Count {
            paths,
            archives,
            discover,
            manifest,
            scratch_root,
            workers,
        } => build_pool(paths, archives, discover, manifest, scratch_root)
            .map(|pool| count_commits(&pool, workers))
            .map_err(Into::into),
        Command::Pack { src, dest } => pack(src, dest),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    builder.parse_default_env();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn build_pool(
    paths: Vec<PathBuf>,
    archives: Vec<PathBuf>,
    discover: Vec<PathBuf>,
    manifest: Option<PathBuf>,
    scratch_root: Option<PathBuf>,
) -> Result<RepositoryPool, PoolError> {
    let manifest = match manifest {
        Some(path) => Manifest::load(path)?,
        None => Manifest::default(),
    };
    let mut config = manifest.config.clone();
    if let Some(root) = scratch_root {
        config = config.scratch_root(root);
    }

    let mut pool = RepositoryPool::with_config(config);
    pool.register_manifest(&manifest)?;

    for path in paths {
        pool.register_plain(path)?;
    }
    for path in archives {
        pool.register_archive(path)?;
    }
    for root in discover {
        pool.discover(root)?;
    }
    Ok(pool)
}

/// Fan the pool out over `workers` threads sharing one iterator.
fn count_commits(pool: &RepositoryPool, workers: usize) -> ExitCode {
    let iter = pool.iter();
    let failures = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..workers.max(1) {
            s.spawn(|| loop {
                match iter.next() {
                    Ok(Some(repo)) => match repo.commit_count() {
                        Ok(count) => println!("{}\t{}", repo.id(), count),
                        Err(e) => {
                            eprintln!("{}: {}", repo.id(), e);
                            failures.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        eprintln!("{}", e);
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    if failures.into_inner() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn pack(src: PathBuf, dest: PathBuf) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let files = archive::pack_directory(&src, &dest)?;
    println!("{} files packed into {}", files, dest.display());
    Ok(ExitCode::SUCCESS)
}
