//! # Link trees
//!
//! `tree create` materializes repositories as a directory of symlinks;
//! `tree refresh` and `tree status` find (and prune) links whose
//! repositories have gone away.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use repoindex_config::path::normalize_nonexistent;
use repoindex_linktree::{
    refresh, status, LinkTreeMaterializer, Provenance, RefreshReport, TreeOptions, TreeResult,
};
use repoindex_vfs::builder::effective_tags;
use repoindex_vfs::tag::match_hierarchical;
use repoindex_vfs::{DefaultImplicitTags, Repository};

use crate::session::Session;

#[derive(Subcommand, Debug)]
pub enum TreeCommands {
    /// Materialize repositories as a tree of symlinks
    Create(CreateArgs),

    /// Scan a tree for broken links, optionally removing them
    Refresh(RefreshArgs),

    /// Report link health without changing anything
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Destination root (defaults to [tree].root)
    #[arg(value_name = "DIR")]
    root: Option<PathBuf>,

    /// tag, language, created-year, modified-year or owner
    #[arg(long)]
    organize_by: Option<String>,

    /// Directory levels kept below the root
    #[arg(long)]
    max_depth: Option<usize>,

    /// rename or skip
    #[arg(long)]
    collision: Option<String>,

    /// Only include repositories with a tag matching this prefix pattern
    /// (e.g. `topic:ml` or `topic:*`)
    #[arg(long = "tag", value_name = "PATTERN")]
    tags: Vec<String>,

    /// Compute everything but do not touch the filesystem
    #[arg(long)]
    dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    #[arg(value_name = "DIR")]
    root: Option<PathBuf>,

    /// Remove broken links
    #[arg(long)]
    prune: bool,

    /// Report what pruning would remove
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(value_name = "DIR")]
    root: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

pub fn run(session: &Session, command: TreeCommands) -> Result<()> {
    match command {
        TreeCommands::Create(args) => cmd_create(session, args),
        TreeCommands::Refresh(args) => {
            let root = tree_root(session, args.root)?;
            let report = refresh(&root, args.prune, args.dry_run)
                .with_context(|| format!("Failed to scan {}", root.display()))?;
            print_report(&root, &report, args.json, args.prune && !args.dry_run)
        }
        TreeCommands::Status(args) => {
            let root = tree_root(session, args.root)?;
            let report =
                status(&root).with_context(|| format!("Failed to scan {}", root.display()))?;
            print_report(&root, &report, args.json, false)
        }
    }
}

/// Absolute tree root: the argument, else `[tree].root`
fn tree_root(session: &Session, arg: Option<PathBuf>) -> Result<PathBuf> {
    normalize_nonexistent(arg.unwrap_or_else(|| session.config.tree.root.clone()))
}

fn cmd_create(session: &Session, args: CreateArgs) -> Result<()> {
    let mut opts = TreeOptions::from_config(&session.config.tree)?;
    opts.root = tree_root(session, args.root)?;
    if let Some(organize_by) = &args.organize_by {
        opts.organize_by = organize_by.parse()?;
    }
    if let Some(collision) = &args.collision {
        opts.collision = collision.parse()?;
    }
    if let Some(max_depth) = args.max_depth {
        opts.max_depth = max_depth;
    }
    opts.dry_run = args.dry_run;

    let selected: Vec<Repository> = session
        .repos
        .iter()
        .filter(|repo| {
            args.tags.is_empty() || {
                let tags = effective_tags(repo, &session.store, &DefaultImplicitTags);
                args.tags
                    .iter()
                    .all(|pattern| tags.iter().any(|tag| match_hierarchical(tag, pattern)))
            }
        })
        .cloned()
        .collect();

    let materializer = LinkTreeMaterializer::new(&session.store, &DefaultImplicitTags);
    let result = materializer
        .create_tree(&selected, &opts)
        .with_context(|| format!("Failed to materialize {}", opts.root.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&opts, selected.len(), &result);
    }

    if !result.is_success() {
        bail!("{} link(s) could not be created", result.errors.len());
    }
    Ok(())
}

fn print_result(opts: &TreeOptions, repos: usize, result: &TreeResult) {
    println!();
    if opts.dry_run {
        println!("  Link tree (dry run): {}", opts.root.display());
    } else {
        println!("  Link tree: {}", opts.root.display());
    }
    println!("    Repositories:  {} (by {})", repos, opts.organize_by);
    println!("    Created:       {}", result.links_created);
    println!("    Updated:       {}", result.links_updated);
    println!("    Skipped:       {}", result.links_skipped);
    println!("    Directories:   {}", result.dirs_created);

    if !result.errors.is_empty() {
        println!();
        println!("  Errors:");
        for failure in &result.errors {
            println!("      {} - {}", failure.destination.display(), failure.message);
        }
    }
}

fn print_report(root: &std::path::Path, report: &RefreshReport, json: bool, pruned: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!();
    println!("  Link tree: {}", root.display());
    match &report.provenance {
        Provenance::Known(manifest) => println!(
            "    Created {} by {} ({} repositories, v{})",
            manifest.created_at.to_rfc3339(),
            manifest.organize_by,
            manifest.repos_count,
            manifest.repoindex_version
        ),
        Provenance::Unknown => println!("    Provenance:    unknown (no readable manifest)"),
    }
    println!("    Links:         {}", report.total_links);
    println!("    Valid:         {}", report.valid_links);
    println!("    Broken:        {}", report.broken_links);
    if pruned {
        println!("    Removed:       {}", report.removed_links);
    }

    if !report.broken_paths.is_empty() {
        println!();
        println!("  Broken links:");
        for path in &report.broken_paths {
            println!("      {}", path.display());
        }
        if !pruned {
            println!();
            println!("  Run `repoindex tree refresh --prune` to remove them.");
        }
    }
    for path in &report.prune_failures {
        eprintln!("  Could not remove {}", path.display());
    }
    Ok(())
}
