//! Hatless CLI - command-line tool for inspecting and rewriting compiled
//! model and particle containers.
//!
//! This is the main entry point for the Hatless command-line application.

use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hatless::prelude::*;

/// Hatless - compiled game asset inspection and rewriting tool
#[derive(Parser)]
#[command(name = "hatless")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump a compiled model's header, sequences and skin table
    MdlDump {
        /// Input MDL file
        #[arg(short, long)]
        input: PathBuf,

        /// Emit the full decoded document as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Rewrite a model's skin table so every family matches family 0
    MdlFlattenSkins {
        /// MDL file to patch in place
        #[arg(short, long)]
        input: PathBuf,
    },

    /// List the particle system definitions in a particle file
    PcfList {
        /// Input PCF file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Drop every element unreachable from a particle file's root
    PcfMinimize {
        /// Input PCF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (defaults to rewriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace a particle system's attributes with those from a donor file
    PcfImport {
        /// PCF file to modify
        #[arg(short, long)]
        input: PathBuf,

        /// PCF file to take the definition from
        #[arg(short, long)]
        donor: PathBuf,

        /// Name of the particle system to replace
        #[arg(short, long)]
        system: String,

        /// Output file (defaults to rewriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::MdlDump { input, json } => {
            cmd_mdl_dump(&input, json)?;
        }
        Commands::MdlFlattenSkins { input } => {
            cmd_mdl_flatten_skins(&input)?;
        }
        Commands::PcfList { input } => {
            cmd_pcf_list(&input)?;
        }
        Commands::PcfMinimize { input, output } => {
            cmd_pcf_minimize(&input, output.as_deref())?;
        }
        Commands::PcfImport {
            input,
            donor,
            system,
            output,
        } => {
            cmd_pcf_import(&input, &donor, &system, output.as_deref())?;
        }
    }

    Ok(())
}

fn cmd_mdl_dump(input: &Path, json: bool) -> Result<()> {
    let data = fs::read(input).context("Failed to read input file")?;
    let mdl = Mdl::decode(&data).context("Failed to decode model")?;

    if json {
        println!("{}", serde_json::to_string_pretty(mdl.document())?);
        return Ok(());
    }

    println!("Model: {}", mdl.name()?);

    let sequences = mdl.sequences()?;
    println!("\nSequences: {}", sequences.len());
    for sequence in &sequences {
        println!(
            "  {:<24} activity: {}",
            sequence.label()?.unwrap_or("-"),
            sequence.activity_name()?.unwrap_or("-")
        );
        for (offset, text) in sequence.modifiers()? {
            println!("    modifier @{:#x}: {}", offset, text);
        }
    }

    let families = mdl.skin_families()?;
    println!("\nSkin families: {}", families.len());
    for (i, family) in families.iter().enumerate() {
        println!("  [{}] {:?}", i, family);
    }

    Ok(())
}

fn cmd_mdl_flatten_skins(input: &Path) -> Result<()> {
    println!("Flattening skin families: {}", input.display());

    let data = fs::read(input).context("Failed to read input file")?;
    let mut mdl = Mdl::decode(&data).context("Failed to decode model")?;

    if !mdl.flatten_skin_families()? {
        println!("Skin table already flat, nothing to do");
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(input)
        .context("Failed to open file for patching")?;
    mdl.patch_skin_table(&mut file)
        .context("Failed to patch skin table")?;

    println!("Patched {} skin families", mdl.num_skin_families()?);

    Ok(())
}

fn cmd_pcf_list(input: &Path) -> Result<()> {
    let data = fs::read(input).context("Failed to read input file")?;
    let names = Pcf::particle_system_names(&data).context("Failed to decode particle file")?;

    for name in &names {
        println!("{}", name);
    }
    println!("\nTotal: {} systems", names.len());

    Ok(())
}

fn cmd_pcf_minimize(input: &Path, output: Option<&Path>) -> Result<()> {
    let data = fs::read(input).context("Failed to read input file")?;
    let mut pcf = Pcf::decode(&data).context("Failed to decode particle file")?;

    let before = pcf.elements().len();
    let changed = minimize(&mut pcf).context("Failed to minimize")?;
    let after = pcf.elements().len();

    let target = output.unwrap_or(input);
    if changed {
        fs::write(target, pcf.encode_to_vec()?).context("Failed to write output file")?;
        println!(
            "Dropped {} of {} elements -> {}",
            before - after,
            before,
            target.display()
        );
    } else if output.is_some() {
        fs::write(target, data).context("Failed to write output file")?;
        println!("Nothing unreachable, copied {} elements", before);
    } else {
        println!("Nothing unreachable, file left untouched");
    }

    Ok(())
}

fn cmd_pcf_import(input: &Path, donor: &Path, system: &str, output: Option<&Path>) -> Result<()> {
    println!(
        "Importing '{}' from {} into {}",
        system,
        donor.display(),
        input.display()
    );

    let host_data = fs::read(input).context("Failed to read input file")?;
    let donor_data = fs::read(donor).context("Failed to read donor file")?;
    let mut host = Pcf::decode(&host_data).context("Failed to decode particle file")?;
    let donor = Pcf::decode(&donor_data).context("Failed to decode donor file")?;

    replace_system_attributes(&mut host, &donor, system).context("Failed to import system")?;
    minimize(&mut host).context("Failed to minimize")?;

    let target = output.unwrap_or(input);
    fs::write(target, host.encode_to_vec()?).context("Failed to write output file")?;
    println!(
        "Wrote {} elements -> {}",
        host.elements().len(),
        target.display()
    );

    Ok(())
}
