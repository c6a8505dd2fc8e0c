//! Subcommand implementations

use crate::{Commands, SortKey};
use anyhow::{bail, Context, Result};
use app_core::{AppState, OperationResult};
use app_fs::{display_label, Entity, FileOperations, SortBy, SortOrder, VfsPath};
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::PathBuf;

pub struct Runner<'a> {
    state: &'a AppState,
    config_path: PathBuf,
}

/// Absolute virtual path for a command-line argument; relative ones start at the working directory
fn vfs_path(arg: &str) -> Result<VfsPath> {
    if arg.starts_with('/') {
        return Ok(VfsPath::new(arg)?);
    }
    let cwd = std::env::current_dir().context("cannot read the working directory")?;
    Ok(VfsPath::from_os(cwd.join(arg))?)
}

fn format_time(modified: Option<i64>) -> String {
    modified
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn kind_marker(entity: &Entity) -> &'static str {
    match entity {
        Entity::File(_) => "-",
        Entity::Directory(_) => "d",
        Entity::Archive(_) => "a",
        Entity::Drive(_) => "D",
        Entity::Root(_) => "/",
    }
}

impl<'a> Runner<'a> {
    pub fn new(state: &'a AppState, config_path: PathBuf) -> Self {
        Self { state, config_path }
    }

    fn resolve(&self, arg: &str) -> Result<Entity> {
        let path = vfs_path(arg)?;
        self.state
            .fs
            .resolve(&path)
            .map_err(|e| anyhow::anyhow!(app_core::AppError::from(e).user_message()))
    }

    fn save_config(&self) -> Result<()> {
        self.state.config.read().save_to(&self.config_path)
    }

    pub fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Ls { path, all, sort, reverse } => self.ls(&path, all, sort, reverse),
            Commands::Tree { path } => {
                let folder = self.resolve(&path)?;
                println!("{}", folder.path());
                self.tree(&folder, "")
            }
            Commands::Info { path } => self.info(&path),
            Commands::Cat { path } => {
                let file = self.resolve(&path)?;
                let Some(file) = file.as_file() else {
                    bail!("{} is not a file", file.path());
                };
                let mut reader = file.open()?;
                io::copy(&mut reader, &mut io::stdout().lock())?;
                Ok(())
            }
            Commands::Extract { path, output } => {
                let file = self.resolve(&path)?;
                let written = self.state.fs.extract_to(&file, &output)?;
                println!("{} bytes written to {}", written, output.display());
                Ok(())
            }
            Commands::Cp { sources, destination } => {
                let (selection, destination) = self.selection(&sources, &destination)?;
                let results = self.state.copy_selection(&selection, &destination);
                self.report("copied", &results)
            }
            Commands::Mv { sources, destination } => {
                let (selection, destination) = self.selection(&sources, &destination)?;
                let results = self.state.move_selection(&selection, &destination);
                self.save_config()?;
                self.report("moved", &results)
            }
            Commands::Rm { paths } => {
                let selection = paths.iter().map(|p| self.resolve(p)).collect::<Result<Vec<_>>>()?;
                let results = self.state.delete_selection(&selection);
                self.save_config()?;
                self.report("deleted", &results)
            }
            Commands::Rename { path, new_name } => {
                let target = self.resolve(&path)?;
                let renamed = self.state.rename(&target, &new_name).map_err(|e| anyhow::anyhow!(e.user_message()))?;
                self.save_config()?;
                println!("{}", renamed);
                Ok(())
            }
            Commands::Mkdir { parent, name } => {
                let parent = self.resolve(&parent)?;
                println!("{}", self.state.fs.create_directory(&parent, &name)?);
                Ok(())
            }
            Commands::Touch { parent, name } => {
                let parent = self.resolve(&parent)?;
                println!("{}", self.state.fs.create_file(&parent, &name)?);
                Ok(())
            }
            Commands::Pin { path } => {
                let folder = self.resolve(&path)?;
                if !self.state.pin(&folder).map_err(|e| anyhow::anyhow!(e.user_message()))? {
                    println!("{} is already pinned", folder.path());
                }
                self.save_config()
            }
            Commands::Unpin { path } => {
                if !self.state.unpin(&vfs_path(&path)?) {
                    bail!("{} is not pinned", path);
                }
                self.save_config()
            }
            Commands::Pins => {
                for folder in self.state.pinned_folders() {
                    println!("{}\t{}", folder.display_name(), folder.path());
                }
                Ok(())
            }
        }
    }

    fn selection(&self, sources: &[String], destination: &str) -> Result<(Vec<Entity>, Entity)> {
        let selection = sources.iter().map(|s| self.resolve(s)).collect::<Result<Vec<_>>>()?;
        let destination = self.resolve(destination)?;
        if !destination.is_folder() {
            bail!("{} is not a folder", destination.path());
        }
        Ok((selection, destination))
    }

    fn report(&self, verb: &str, results: &[OperationResult]) -> Result<()> {
        let mut failed = 0;
        for result in results {
            match &result.outcome {
                Ok(Some(to)) => println!("{} {} -> {}", verb, result.source, to),
                Ok(None) => println!("{} {}", verb, result.source),
                Err(e) => {
                    failed += 1;
                    eprintln!("{}: {}", result.source, e.user_message());
                }
            }
        }
        if failed > 0 {
            bail!("{} of {} items failed", failed, results.len());
        }
        Ok(())
    }

    fn ls(&self, path: &str, all: bool, sort: Option<SortKey>, reverse: bool) -> Result<()> {
        let folder = self.resolve(path)?;
        let (mut options, show_extensions) = {
            let config = self.state.config.read();
            (config.filer.list_options(), config.filer.show_file_extensions)
        };
        options.show_hidden |= all;
        if let Some(key) = sort {
            options.sort_by = match key {
                SortKey::Name => SortBy::Name,
                SortKey::Size => SortBy::Size,
                SortKey::Modified => SortBy::Modified,
                SortKey::Type => SortBy::Type,
            };
        }
        if reverse {
            options.sort_order = match options.sort_order {
                SortOrder::Ascending => SortOrder::Descending,
                SortOrder::Descending => SortOrder::Ascending,
            };
        }

        let entries = app_fs::list_directory(&self.state.fs, &folder, &options)?;
        let mut out = io::stdout().lock();
        for entry in &entries {
            let size = entry.size().map(|s| s.to_string()).unwrap_or_else(|| "-".into());
            writeln!(
                out,
                "{} {:>12} {} {}",
                kind_marker(entry),
                size,
                format_time(entry.modified()),
                display_label(entry, show_extensions)
            )?;
        }
        Ok(())
    }

    fn tree(&self, folder: &Entity, indent: &str) -> Result<()> {
        let children = self.state.fs.files(folder)?;
        for (i, child) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            println!("{}{} {}", indent, if last { "`--" } else { "|--" }, child.display_name());
            if child.is_folder() && !matches!(child, Entity::Drive(_)) {
                let deeper = format!("{}{}", indent, if last { "    " } else { "|   " });
                self.tree(child, &deeper)?;
            }
        }
        Ok(())
    }

    fn info(&self, path: &str) -> Result<()> {
        let entity = self.resolve(path)?;
        println!("path:       {}", entity.path());
        println!("kind:       {:?}", entity.kind());
        if let Some(archive) = entity.as_archive() {
            println!("format:     {}", archive.format());
        }
        if let Some(size) = entity.size() {
            println!("size:       {}", size);
        }
        if let Some(compressed) = entity.compressed_size() {
            println!("compressed: {}", compressed);
        }
        println!("modified:   {}", format_time(entity.modified()));
        println!("hidden:     {}", entity.is_hidden());
        if let Some(owner) = self.state.fs.parent_archive_of(entity.path())? {
            println!("inside:     {}", owner.path());
        }
        if entity.is_folder() && !matches!(entity, Entity::Root(_)) {
            let stats = self.state.fs.contents_statistics(&entity)?;
            println!(
                "contents:   {} files, {} folders, {} bytes",
                stats.files, stats.directories, stats.total_size
            );
        }
        Ok(())
    }
}
