use crate::cli::PrepareArgs;
use crate::config::{JobConfig, PartialJobConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use mdprep::core::diagnostics::Diagnostics;
use mdprep::core::forcefield::params::ParameterTables;
use mdprep::core::io::rules::{BondFile, RenameRules};
use mdprep::core::io::snapshot::{PreparedSnapshot, StructureFile};
use mdprep::core::io::solvent::SolventBoxTemplate;
use mdprep::core::topology::library::TopologyLibrary;
use mdprep::engine::progress::ProgressReporter;
use mdprep::engine::summary::SystemSummary;
use mdprep::workflows::prepare::{self, ForceFieldData, PreparedSystem};
use tracing::info;

pub fn run(args: PrepareArgs) -> Result<()> {
    let mut input_diagnostics = Diagnostics::new();

    let partial = match &args.config {
        Some(path) => PartialJobConfig::from_file(path)?,
        None => PartialJobConfig::default(),
    };
    let bonds = args
        .bonds
        .as_deref()
        .map(|path| {
            BondFile::load(path, &mut input_diagnostics).map_err(|e| CliError::file(path, e))
        })
        .transpose()?;
    info!("Merging configuration from job file and CLI arguments...");
    let job = partial.merge_with_cli(&args, bonds)?;

    info!("Loading input structure from {:?}", &args.input);
    let mut structure_file =
        StructureFile::load(&args.input).map_err(|e| CliError::file(&args.input, e))?;
    if let Some(path) = &args.rules {
        let rules =
            RenameRules::load(path, &mut input_diagnostics).map_err(|e| CliError::file(path, e))?;
        let renamed = rules.apply(&mut structure_file);
        info!(renamed, "Applied rename rules from {:?}", path);
    }
    let structure = structure_file.into_structure();

    let (library, params, solvent_box) = load_force_field(&job)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting structure preparation...");
    info!("Invoking the core preparation workflow...");
    let prepared = prepare::run(
        &structure,
        ForceFieldData {
            library: &library,
            params: &params,
        },
        solvent_box.as_ref(),
        &job.preparation,
        &reporter,
    )?;

    PreparedSnapshot::new(&prepared.structure, &prepared.topology)
        .save(&args.output)
        .map_err(|e| CliError::file(&args.output, e))?;

    print_report(&prepared, &input_diagnostics);
    println!("✓ Prepared system written to: {}", args.output.display());
    Ok(())
}

fn load_force_field(
    job: &JobConfig,
) -> Result<(TopologyLibrary, ParameterTables, Option<SolventBoxTemplate>)> {
    info!("Loading topology library from {:?}", &job.topology_path);
    let library = TopologyLibrary::load(&job.topology_path)
        .map_err(|e| CliError::file(&job.topology_path, e))?;

    info!("Loading parameters from {:?}", &job.params_path);
    let params = ParameterTables::load(&job.params_path)
        .map_err(|e| CliError::file(&job.params_path, e))?;

    let solvent_box = match (&job.solvent_box_path, &job.preparation.solvation) {
        (Some(path), Some(solvation)) => {
            info!("Loading solvent box template from {:?}", path);
            let names = solvation.model.atom_names();
            Some(SolventBoxTemplate::load(path, &names).map_err(|e| CliError::file(path, e))?)
        }
        _ => None,
    };
    Ok((library, params, solvent_box))
}

fn summary_lines(summary: &SystemSummary) -> Vec<String> {
    let mut lines = vec![
        format!("Atoms:       {}", summary.atom_count),
        format!("Total mass:  {:.3} Da", summary.total_mass),
        format!("Net charge:  {:.4} e", summary.net_charge),
    ];
    if let Some(b) = &summary.box_summary {
        lines.push(format!(
            "Box size:    {:.3} x {:.3} x {:.3} A",
            b.lengths.x, b.lengths.y, b.lengths.z
        ));
        lines.push(format!(
            "Box center:  ({:.3}, {:.3}, {:.3})",
            b.center.x, b.center.y, b.center.z
        ));
        lines.push(format!("Volume:      {:.1} A^3", b.volume));
        lines.push(format!("Density:     {:.4} g/cm^3", b.density));
    }
    lines
}

fn print_report(prepared: &PreparedSystem, input_diagnostics: &Diagnostics) {
    println!("\nSystem summary");
    for line in summary_lines(&prepared.summary) {
        println!("  {line}");
    }
    if !prepared.bridges.is_empty() {
        println!("  Disulfides:  {}", prepared.bridges.len());
    }
    if !prepared.ions.is_empty() {
        println!("  Ions:        {}", prepared.ions.len());
    }

    let warnings = input_diagnostics.len() + prepared.diagnostics.len();
    if warnings > 0 {
        println!("\n{warnings} warning(s):");
        for diagnostic in input_diagnostics
            .entries()
            .iter()
            .chain(prepared.diagnostics.entries())
        {
            println!("  - {diagnostic}");
        }
    }
}
