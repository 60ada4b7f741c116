use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::{error, info};

mod config;

use refit_core::SchemaConvention;
use refit_engine::catalog::build_catalog;
use refit_engine::mapfile::load_cmd_id_map;
use refit_engine::reconcile::{reconcile, ReconcileSettings};
use refit_engine::report::save_name_table;
use refit_schema::snapshot::{load_module_from_path, save_module_to_path};

use crate::config::ToolConfig;

#[derive(Parser)]
#[command(
    name = "refit-cli",
    about = "Reconciles an obfuscated schema module with its readable counterpart"
)]
struct Cli {
    /// Optional TOML settings file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full reconciliation pass and write the outputs.
    Reconcile {
        /// Obfuscated module snapshot (JSON).
        #[arg(long)]
        obfuscated: PathBuf,
        /// Readable module snapshot (JSON).
        #[arg(long)]
        readable: PathBuf,
        /// Legacy command-id mapping (CSV: name, readable id, obfuscated id).
        #[arg(long)]
        cmd_id_map: PathBuf,
        /// Output path for the name-translation table.
        #[arg(long)]
        out_table: PathBuf,
        /// Output path for the patched readable module snapshot.
        #[arg(long)]
        out_module: PathBuf,
        /// Obfuscated base-class name; overrides settings.
        #[arg(long)]
        obf_base_class: Option<String>,
        /// Obfuscated command-id member name; overrides settings.
        #[arg(long)]
        obf_cmd_id_field: Option<String>,
        /// Run the pass and print the summary without writing outputs.
        #[arg(long)]
        dry_run: bool,
    },
    /// List one module snapshot's packet catalog.
    Packets {
        /// Module snapshot (JSON).
        #[arg(long)]
        module: PathBuf,
        /// Base-class name; defaults to the readable convention.
        #[arg(long)]
        base_class: Option<String>,
        /// Command-id member name; defaults to the readable convention.
        #[arg(long)]
        cmd_id_field: Option<String>,
    },
}

fn main() {
    let filter = std::env::var("REFIT_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let settings = match ToolConfig::new(cli.config.clone()) {
        Ok(settings) => settings,
        Err(err) => {
            error!("settings load failed: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli, settings) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, settings: ToolConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Reconcile {
            obfuscated,
            readable,
            cmd_id_map,
            out_table,
            out_module,
            obf_base_class,
            obf_cmd_id_field,
            dry_run,
        } => {
            let base_class = obf_base_class.unwrap_or_else(|| settings.obf_base_class.clone());
            let cmd_id_field =
                obf_cmd_id_field.unwrap_or_else(|| settings.obf_cmd_id_field.clone());
            if base_class.is_empty() || cmd_id_field.is_empty() {
                bail!(
                    "the obfuscated base class and command-id member names are required \
                     (flags or settings)"
                );
            }
            let obf_conv = SchemaConvention::new(base_class, cmd_id_field);
            let readable_conv = settings.readable_convention();

            let obf_module = load_module_from_path(&obfuscated)
                .with_context(|| format!("loading {}", obfuscated.display()))?;
            let readable_module = load_module_from_path(&readable)
                .with_context(|| format!("loading {}", readable.display()))?;
            let map = load_cmd_id_map(&cmd_id_map)
                .with_context(|| format!("loading {}", cmd_id_map.display()))?;

            let well_known = settings.well_known();
            let filter = settings.filter();
            let report = reconcile(
                &obf_module,
                &readable_module,
                &map,
                &ReconcileSettings {
                    obf_conv: &obf_conv,
                    readable_conv: &readable_conv,
                    well_known: &well_known,
                    filter: &filter,
                },
            )?;

            let stats = report.stats;
            info!(
                packets = stats.packets_total,
                reconciled = stats.packets_reconciled,
                unmapped = stats.packets_unmapped,
                names = stats.names_recorded,
                constants = stats.constants_patched,
                warnings = stats.warnings,
                "reconciliation pass finished"
            );
            if stats.warnings > 0 {
                eprint!("{}", report.diagnostics.render());
            }

            if dry_run {
                println!(
                    "dry run: {} names, {} constant rewrites, {} warnings",
                    stats.names_recorded, stats.constants_patched, stats.warnings
                );
                return Ok(());
            }

            let mut patched = readable_module;
            patched.apply_patches(&report.patches)?;
            patched.name = settings.patched_module_name.clone();
            let mut rng = rand::thread_rng();
            patched.version = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
            save_module_to_path(&out_module, &patched)
                .with_context(|| format!("writing {}", out_module.display()))?;
            save_name_table(
                &out_table,
                &report.table,
                &obf_conv.base_class,
                &readable_conv.base_class,
                SystemTime::now(),
            )
            .with_context(|| format!("writing {}", out_table.display()))?;

            println!(
                "wrote {} ({} names) and {}",
                out_table.display(),
                stats.names_recorded,
                out_module.display()
            );
            Ok(())
        }
        Commands::Packets {
            module,
            base_class,
            cmd_id_field,
        } => {
            let readable_conv = settings.readable_convention();
            let conv = SchemaConvention::new(
                base_class.unwrap_or(readable_conv.base_class),
                cmd_id_field.unwrap_or(readable_conv.cmd_id_field),
            );
            let loaded = load_module_from_path(&module)
                .with_context(|| format!("loading {}", module.display()))?;
            let catalog = build_catalog(&loaded, &conv)?;
            for (cmd_id, entry) in catalog.iter() {
                println!("{cmd_id}\t{}", loaded.type_def(entry.type_id).qualified);
            }
            info!(packets = catalog.len(), "listed packet catalog");
            Ok(())
        }
    }
}
