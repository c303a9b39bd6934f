//! CLI entrypoint for `ldap-inventory`.
//!
//! Implements the Ansible dynamic inventory protocol over LDIF exports of a
//! directory search: `--list` prints the whole inventory document and
//! `--host NAME` prints one host's variables. Configuration comes from the
//! environment with explicit arguments taking precedence. Optionally prints a
//! colored summary on stderr and writes JSON/CSV exports to a directory.
use std::fs;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{ArgGroup, Parser, ValueEnum};
use log::{LevelFilter, error, warn};
use ldap_inventory::{
    config::{ConfigOverrides, InventoryConfig},
    engine::Engine,
    export::{save_hosts_csv, save_inventory_json},
    filter::{RecordFilter, SearchScope},
    io::{DEFAULT_MMAP_THRESHOLD_BYTES, is_stdin},
    report::render_summary_with_top,
};

#[derive(Parser, Debug)]
#[command(
    name = "ldap-inventory",
    version,
    about = "Populate an Ansible inventory from an LDAP OU hierarchy export"
)]
#[command(group(ArgGroup::new("mode").args(["list", "host"])))]
struct Args {
    /// DN of the OU that was searched (default: $LDAP_INVENTORY_BASEDN)
    basedn: Option<String>,

    /// LDIF export(s) of the directory search; '-' reads stdin
    #[arg(short = 'i', long = "input", env = "LDAP_INVENTORY_INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// List all hosts and groups (default)
    #[arg(long)]
    list: bool,

    /// Print the variables of a single host
    #[arg(long, value_name = "NAME")]
    host: Option<String>,

    /// Recursively include hosts in sub-OUs
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Don't link child OUs as children in the inventory (stops inheritance)
    #[arg(short = 'c', long = "no-children")]
    no_children: bool,

    /// List hosts by FQDN instead of common name
    #[arg(long)]
    fqdn: bool,

    /// Only include hosts whose operatingSystem matches (LDAP wildcards, e.g. '*windows*')
    #[arg(long = "os", value_name = "PATTERN")]
    os: Option<String>,

    /// Prefix all group names
    #[arg(long = "group-prefix", value_name = "PREFIX")]
    group_prefix: Option<String>,

    /// Directory to write JSON and CSV exports to
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Override mmap threshold in bytes. If zero, disable mmap.
    #[arg(long = "mmap-threshold", default_value_t = DEFAULT_MMAP_THRESHOLD_BYTES)]
    mmap_threshold: u64,

    /// Read and normalize input files in parallel
    #[arg(long = "parallel")]
    parallel: bool,

    /// Print a summary of the inventory on stderr
    #[arg(long = "summary")]
    summary: bool,

    /// Limit number of entries in the operating system breakdown
    #[arg(long = "top", default_value_t = 10)]
    top_limit: usize,

    /// Control color output (auto, always, never)
    #[arg(long = "color", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log counts of skipped records and malformed lines
    #[arg(long = "log-parse-stats")]
    log_parse_stats: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

fn verify_inputs(args: &Args) -> Result<()> {
    if args.inputs.iter().filter(|p| is_stdin(p)).count() > 1 {
        bail!("stdin ('-') can only be given once");
    }
    for p in &args.inputs {
        if !is_stdin(p) && !p.exists() {
            bail!("LDIF file not found: {}", p.display());
        }
    }
    Ok(())
}

fn build_config(args: &Args) -> Result<InventoryConfig> {
    let overrides = ConfigOverrides {
        search_root: args.basedn.clone(),
        use_fqdn_display: args.fqdn.then_some(true),
        link_children: args.no_children.then_some(false),
        group_prefix: args.group_prefix.clone(),
    };
    Ok(InventoryConfig::from_env()?.with_overrides(overrides))
}

fn build_filter(args: &Args) -> Result<RecordFilter> {
    let scope = if args.recursive {
        SearchScope::Subtree
    } else {
        SearchScope::OneLevel
    };
    let filter = RecordFilter::new(scope);
    Ok(match &args.os {
        Some(pattern) => filter.with_os_pattern(pattern)?,
        None => filter,
    })
}

fn setup(args: &Args) -> Result<Engine> {
    verify_inputs(args)?;
    let config = build_config(args)?;
    let filter = build_filter(args)?;
    Ok(Engine::new(config, filter)?)
}

fn main() {
    let args = Args::parse();
    init_logger(args.verbose);
    match args.color {
        ColorChoice::Always => {
            colored::control::set_override(true);
        }
        ColorChoice::Never => {
            colored::control::set_override(false);
        }
        ColorChoice::Auto => {}
    }
    let mut engine = match setup(&args) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(2);
        }
    };
    let threshold = if args.mmap_threshold == 0 {
        u64::MAX
    } else {
        args.mmap_threshold
    };

    let load_res = if args.parallel {
        engine.load_from_file_paths_parallel_with_threshold(&args.inputs, threshold)
    } else {
        engine.load_from_file_paths_with_threshold(&args.inputs, threshold)
    };
    if let Err(e) = load_res {
        error!("failed to build inventory: {:#}", e);
        std::process::exit(3);
    }
    let inventory = engine.inventory();

    let document = match &args.host {
        Some(name) => match inventory.host_vars(name) {
            Some(vars) => serde_json::to_string_pretty(vars),
            None => {
                warn!("host {} not found in inventory", name);
                Ok("{}".to_string())
            }
        },
        None => inventory.to_json_pretty(),
    };
    match document {
        Ok(doc) => println!("{}", doc),
        Err(e) => {
            error!("failed to serialize inventory: {}", e);
            std::process::exit(3);
        }
    }

    if args.summary {
        eprintln!("{}", render_summary_with_top(&inventory, args.top_limit));
    }

    if let Some(outdir) = args.output {
        if let Err(e) = fs::create_dir_all(&outdir) {
            error!(
                "failed to create output directory {}: {}",
                outdir.display(),
                e
            );
            std::process::exit(4);
        }
        let ts = chrono::Local::now().format("%Y.%m.%d_%H.%M.%S");
        let json = outdir.join(format!("ldap_inventory_{}.json", ts));
        let csv = outdir.join(format!("ldap_inventory_hosts_{}.csv", ts));
        if let Err(e) = save_inventory_json(&inventory, &json) {
            error!("failed to write {}: {}", json.display(), e);
            std::process::exit(5);
        }
        if let Err(e) = save_hosts_csv(&inventory, &csv) {
            error!("failed to write {}: {}", csv.display(), e);
            std::process::exit(5);
        }
    }

    if args.log_parse_stats {
        if let Some(stats) = engine.parse_stats {
            log::info!(
                "parse stats: records={}, registered={}, not_computer={}, out_of_scope={}, os_mismatch={}, ldif_malformed={}, ldif_without_dn={}, binary_values={}",
                stats.records,
                stats.registered,
                stats.not_computer,
                stats.out_of_scope,
                stats.os_mismatch,
                stats.ldif.malformed_lines,
                stats.ldif.records_without_dn,
                stats.ldif.binary_values
            );
        } else {
            log::info!("parse stats: (not collected for this run)");
        }
    }
}
