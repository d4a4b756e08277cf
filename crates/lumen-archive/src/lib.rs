//! JAR-level orchestration: enumerate entries, rewrite them in parallel,
//! assemble the output archive.
//!
//! Entries are independent; the only shared state is the read-only symbol
//! table and the inheritance provider. The first per-entry error aborts the
//! whole run so a partially rewritten archive is never produced.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use lumen_mappings::SymbolTable;
use lumen_remap::{
    generated_resources, rewrite_entry, EntryOutcome, InheritanceProvider, JarEntry, Remapper,
};

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Inject synthetic constructors into classes that lost theirs.
    pub inject_constructors: bool,
    /// Emit the abstract-method parameter-name listing for decompilers.
    pub parameter_metadata: bool,
    /// Worker threads for the per-entry stage; `None` uses the rayon default.
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessStats {
    pub entries_read: usize,
    pub entries_written: usize,
    pub entries_dropped: usize,
    pub resources_generated: usize,
}

pub fn process_jar(
    input: &Path,
    output: &Path,
    table: &SymbolTable,
    inheritance: &dyn InheritanceProvider,
    options: &ProcessOptions,
) -> Result<ProcessStats> {
    let entries = read_entries(input)?;
    let entries_read = entries.len();
    info!("{entries_read} entries in {}", input.display());

    let remapper = Remapper::new(table, inheritance);
    let rewrite_all = || -> Result<Vec<EntryOutcome>> {
        entries
            .into_par_iter()
            .map(|(name, bytes)| {
                let entry = JarEntry::read(&name, bytes)
                    .with_context(|| format!("failed to read entry {name}"))?;
                rewrite_entry(&remapper, entry, options.inject_constructors)
                    .with_context(|| format!("failed to rewrite entry {name}"))
            })
            .collect()
    };
    let outcomes = match options.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("failed to build worker pool")?
            .install(rewrite_all),
        None => rewrite_all(),
    }?;

    let mut abstract_params = BTreeSet::new();
    for outcome in &outcomes {
        abstract_params.extend(outcome.abstract_params.iter().cloned());
    }

    let mut stats = ProcessStats {
        entries_read,
        ..ProcessStats::default()
    };
    let file = File::create(output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    let mut writer = ZipWriter::new(file);
    let file_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for outcome in outcomes {
        match outcome.entry {
            Some(entry) => {
                let (name, bytes) = entry.into_named_bytes();
                writer
                    .start_file(&*name, file_options)
                    .with_context(|| format!("failed to start entry {name}"))?;
                writer.write_all(&bytes)?;
                stats.entries_written += 1;
            }
            None => stats.entries_dropped += 1,
        }
    }

    if options.parameter_metadata {
        for (name, bytes) in generated_resources(&abstract_params) {
            debug!("generated resource {name} ({} bytes)", bytes.len());
            writer
                .start_file(&*name, file_options)
                .with_context(|| format!("failed to start entry {name}"))?;
            writer.write_all(&bytes)?;
            stats.entries_written += 1;
            stats.resources_generated += 1;
        }
    }

    writer.finish().context("failed to finish output jar")?;
    info!(
        "wrote {} entries to {} ({} dropped, {} generated)",
        stats.entries_written,
        output.display(),
        stats.entries_dropped,
        stats.resources_generated
    );
    Ok(stats)
}

/// Reads every file entry of the input archive into memory, in archive order.
fn read_entries(input: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let file =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", input.display()))?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read entry #{index}"))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read entry {name}"))?;
        entries.push((name, bytes));
    }
    Ok(entries)
}
