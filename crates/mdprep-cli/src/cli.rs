use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "mdprep CLI - Builds complete, solvated and ionized molecular systems from force-field topology templates.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble the topology of a structure, then optionally solvate and ionize it.
    Prepare(PrepareArgs),
}

/// Arguments for the `prepare` subcommand.
#[derive(Args, Debug, Default)]
pub struct PrepareArgs {
    // --- Core Arguments ---
    /// Path to the input structure snapshot (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the prepared system snapshot (TOML).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a job file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Residue topology library; overrides `inputs.topology` from the job file.
    #[arg(short, long, value_name = "PATH")]
    pub topology: Option<PathBuf>,

    /// Force-field parameter file; overrides `inputs.parameters` from the job file.
    #[arg(short, long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Residue and atom rename rules applied to the input before assembly.
    #[arg(long, value_name = "PATH")]
    pub rules: Option<PathBuf>,

    /// Bond file listing disulfide bridges; replaces automatic detection.
    #[arg(long, value_name = "PATH")]
    pub bonds: Option<PathBuf>,

    // --- Assembly Overrides ---
    /// Leave CMAP cross terms out of the topology.
    #[arg(long)]
    pub no_cmap: bool,

    /// Disable disulfide detection.
    #[arg(long, conflicts_with = "disulfide_cutoff")]
    pub no_disulfides: bool,

    /// Bridge cysteines whose SG atoms are closer than this distance (Angstroms).
    #[arg(long, value_name = "FLOAT")]
    pub disulfide_cutoff: Option<f64>,

    // --- Solvation Overrides ---
    /// Pre-equilibrated solvent box coordinates (CSV); overrides `inputs.solvent-box`.
    #[arg(long, value_name = "PATH")]
    pub solvent_box: Option<PathBuf>,

    /// Skip solvation and ionization, even if the job file enables them.
    #[arg(long)]
    pub no_solvate: bool,

    /// Distance between the solute and the box faces (Angstroms).
    #[arg(long, value_name = "FLOAT")]
    pub padding: Option<f64>,

    /// Solvent molecules closer than this to the solute are removed (Angstroms).
    #[arg(long, value_name = "FLOAT")]
    pub solvent_cutoff: Option<f64>,

    // --- Ionization Overrides ---
    /// Skip ionization while still solvating.
    #[arg(long)]
    pub no_ions: bool,

    /// Cation species, by catalogue key or alias (e.g., SOD, Na+).
    #[arg(long, value_name = "NAME")]
    pub cation: Option<String>,

    /// Anion species, by catalogue key or alias (e.g., CLA, Cl-).
    #[arg(long, value_name = "NAME")]
    pub anion: Option<String>,

    /// Exact number of cations; with `--anion-count` disables neutralization.
    #[arg(long, value_name = "INT")]
    pub cation_count: Option<usize>,

    /// Exact number of anions.
    #[arg(long, value_name = "INT")]
    pub anion_count: Option<usize>,

    /// Bulk salt concentration in mol/L added on top of neutralization.
    #[arg(long, value_name = "MOLAR")]
    pub salt: Option<f64>,

    /// Minimum distance between an ion and the solute (Angstroms).
    #[arg(long, value_name = "FLOAT")]
    pub ion_solute_distance: Option<f64>,

    /// Minimum distance between two ions (Angstroms).
    #[arg(long, value_name = "FLOAT")]
    pub ion_ion_distance: Option<f64>,
}
