use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use bmt_core::{
    commit_write_set_with_config, compute_root_with_config, BmtConfig, BucketDb, BucketIndex,
    IndexManifest, WriteSet,
};
use bmt_store::FileObjectStore;
use bmt_tx::Transactions;
use bmt_types::Digest;
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.capacity)?;
    let format = cli.format;
    match cli.command {
        Command::Root(args) => cmd_root(args, &config, &format),
        Command::Commit(args) => cmd_commit(args, &config, &format),
        Command::Get(args) => cmd_get(args, &config, &format),
        Command::Inspect(args) => cmd_inspect(args, &config, &format),
        Command::TxRoot(args) => cmd_tx_root(args, &config, &format),
    }
}

/// Config file (if any) with the `--capacity` override applied.
fn load_config(path: Option<&Path>, capacity: Option<usize>) -> anyhow::Result<BmtConfig> {
    let mut config = match path {
        Some(path) => BmtConfig::load(path)?,
        None => BmtConfig::default(),
    };
    if let Some(capacity) = capacity {
        config.capacity = capacity;
    }
    config.validate()?;
    debug!(capacity = config.capacity, "configuration loaded");
    Ok(config)
}

/// Read a JSON object of key → hex value.
fn load_write_set(path: &Path) -> anyhow::Result<WriteSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading write set {}", path.display()))?;
    let raw: BTreeMap<String, String> = serde_json::from_str(&text)
        .with_context(|| format!("parsing write set {}", path.display()))?;
    raw.into_iter()
        .map(|(key, value)| -> anyhow::Result<(String, Vec<u8>)> {
            let hex_value = value.strip_prefix("0x").unwrap_or(&value);
            let bytes = hex::decode(hex_value)
                .with_context(|| format!("value of {key:?} is not valid hex"))?;
            Ok((key, bytes))
        })
        .collect()
}

fn open_store(path: &Path, config: &BmtConfig, read_only: bool) -> anyhow::Result<Arc<FileObjectStore>> {
    if read_only && !path.exists() {
        bail!("store {} does not exist", path.display());
    }
    let mut store_config = config.store.clone();
    store_config.read_only |= read_only;
    let store = FileObjectStore::open(path, store_config)
        .with_context(|| format!("opening store {}", path.display()))?;
    Ok(Arc::new(store))
}

fn parse_root(root: &str) -> anyhow::Result<Digest> {
    Digest::from_hex(root).with_context(|| format!("invalid root digest {root:?}"))
}

fn print_root(root: &Digest, entries: usize, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", root.to_hex().yellow()),
        OutputFormat::Json => println!(
            "{}",
            json!({ "root": root.to_hex(), "entries": entries })
        ),
    }
}

fn cmd_root(args: RootArgs, config: &BmtConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let write_set = load_write_set(&args.write_set)?;
    let root = compute_root_with_config(&write_set, config)?;
    print_root(&root, write_set.len(), format);
    Ok(())
}

fn cmd_commit(args: CommitArgs, config: &BmtConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let write_set = load_write_set(&args.write_set)?;
    let store = open_store(&args.store, config, false)?;
    let root = commit_write_set_with_config(&write_set, store, config)?;
    if let OutputFormat::Text = format {
        println!(
            "{} Committed {} entries to {}",
            "✓".green().bold(),
            write_set.len(),
            args.store.display()
        );
    }
    print_root(&root, write_set.len(), format);
    Ok(())
}

fn cmd_get(args: GetArgs, config: &BmtConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let root = parse_root(&args.root)?;
    let store = open_store(&args.store, config, true)?;
    let index = BucketIndex::open_root(store, &root)?;
    let value = index.get(&args.key)?;
    match format {
        OutputFormat::Text => match std::str::from_utf8(&value) {
            Ok(text) => println!("{text}"),
            Err(_) => println!("{}", hex::encode(&value)),
        },
        OutputFormat::Json => println!(
            "{}",
            json!({ "key": args.key, "value": hex::encode(&value) })
        ),
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, config: &BmtConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let root = parse_root(&args.root)?;
    let store = open_store(&args.store, config, true)?;
    let manifest = BucketDb::new(store).get_manifest(&root)?;
    match format {
        OutputFormat::Text => print_manifest(&root, &manifest),
        OutputFormat::Json => {
            let occupied: Vec<_> = occupied_slots(&manifest)
                .map(|(i, d)| json!({ "slot": i, "digest": d.to_hex() }))
                .collect();
            println!(
                "{}",
                json!({
                    "root": root.to_hex(),
                    "capacity": manifest.capacity,
                    "occupied": manifest.occupied(),
                    "buckets": occupied,
                })
            );
        }
    }
    Ok(())
}

fn print_manifest(root: &Digest, manifest: &IndexManifest) {
    println!("Root: {}", root.to_hex().yellow().bold());
    println!(
        "Buckets: {} of {} slots occupied",
        manifest.occupied().to_string().bold(),
        manifest.capacity
    );
    for (slot, digest) in occupied_slots(manifest) {
        println!("  {:>6}  {}", slot, digest.short_hex().cyan());
    }
}

fn occupied_slots(manifest: &IndexManifest) -> impl Iterator<Item = (usize, &Digest)> {
    manifest
        .bucket_digests
        .iter()
        .enumerate()
        .filter(|(_, d)| !d.is_zero())
}

fn load_transactions(path: &Path) -> anyhow::Result<Transactions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading transactions {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing transactions {}", path.display()))
}

fn cmd_tx_root(args: TxRootArgs, config: &BmtConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let txs = load_transactions(&args.transactions)?;
    for (i, tx) in txs.iter().enumerate() {
        tx.check_size().with_context(|| format!("transaction {i}"))?;
        if args.verify {
            tx.verify().with_context(|| format!("transaction {i}"))?;
        }
    }
    let root = match &args.store {
        Some(path) => txs.commit_with_config(open_store(path, config, false)?, config)?,
        None => txs.root_with_config(config)?,
    };
    print_root(&root, txs.len(), format);
    Ok(())
}
