use crate::core::diagnostics::Diagnostics;
use crate::core::forcefield::params::ParameterTables;
use crate::core::io::solvent::SolventBoxTemplate;
use crate::core::models::structure::Structure;
use crate::core::models::topology::TopologyOutput;
use crate::core::topology::library::TopologyLibrary;
use crate::engine::assembly;
use crate::engine::config::{ConfigError, DEFAULT_ION_SEGMENT, PlacementMethod, PreparationConfig};
use crate::engine::disulfide::{self, DisulfideBridge};
use crate::engine::error::EngineError;
use crate::engine::ionization::{self, PlacedIon};
use crate::engine::progress::ProgressReporter;
use crate::engine::solvation::{self, BoxInfo};
use crate::engine::solvent;
use crate::engine::summary::SystemSummary;
use tracing::{info, instrument};

/// Force-field data shared by every stage of a run.
#[derive(Clone, Copy)]
pub struct ForceFieldData<'a> {
    pub library: &'a TopologyLibrary,
    pub params: &'a ParameterTables,
}

/// The outcome of a preparation run.
#[derive(Debug)]
pub struct PreparedSystem {
    /// The assembled structure, extended by solvent and ion segments when solvated.
    pub structure: Structure,
    pub topology: TopologyOutput,
    pub box_info: Option<BoxInfo>,
    pub bridges: Vec<DisulfideBridge>,
    pub ions: Vec<PlacedIon>,
    pub summary: SystemSummary,
    pub diagnostics: Diagnostics,
}

/// Prepares a structure for simulation.
///
/// # Arguments
///
/// * `input` - The parsed structure, possibly with missing atoms.
/// * `force_field` - Residue templates, patches, masses and parameters.
/// * `solvent_box` - The pre-equilibrated box tiled around the solute; required when
///   `config.solvation` is set.
/// * `config` - Stage configuration.
/// * `reporter` - Receives phase and task events.
///
/// # Errors
///
/// Fails before any work if the configuration asks for an unavailable stage, and
/// otherwise on the first fatal error of a stage.
#[instrument(skip_all, name = "preparation_workflow")]
pub fn run(
    input: &Structure,
    force_field: ForceFieldData,
    solvent_box: Option<&SolventBoxTemplate>,
    config: &PreparationConfig,
    reporter: &ProgressReporter,
) -> Result<PreparedSystem, EngineError> {
    // === Phase 0: Validate stage selection ===
    if let Some(ionization) = &config.ionization {
        if ionization.method == PlacementMethod::Random {
            return Err(EngineError::NotImplemented("random ion placement"));
        }
        if config.solvation.is_none() {
            return Err(ConfigError::MissingParameter("solvation").into());
        }
    }
    let solvation_stage = match &config.solvation {
        Some(solvation) => {
            let template =
                solvent_box.ok_or(ConfigError::MissingParameter("solvent box template"))?;
            Some((solvation, template))
        }
        None => None,
    };

    let mut diagnostics = Diagnostics::new();
    info!(
        segments = input.segment_count(),
        residues = input.residue_count(),
        "Starting structure preparation."
    );

    // === Phase 1: Disulfide bridges ===
    let bridges = reporter.phase("Disulfide Detection", || {
        disulfide::detect(input, &config.disulfide, &mut diagnostics)
    })?;

    // === Phase 2: Topology assembly ===
    let assembled = reporter.phase("Topology Assembly", || {
        assembly::assemble(
            input,
            force_field.library,
            force_field.params,
            &config.assembly,
            &bridges,
            reporter,
            &mut diagnostics,
        )
    })?;
    let mut structure = assembled.structure;
    let mut topology = assembled.topology;

    reporter.phase("Parameter Check", || {
        let coverage = topology.parameterize(force_field.params, &mut diagnostics);
        if !coverage.is_complete() {
            info!(
                unparameterized = coverage.total(),
                "Some bonded terms have no parameters."
            );
        }
    });

    // === Phase 3: Solvation and ionization ===
    let mut box_info = None;
    let mut ions = Vec::new();
    if let Some((solvation_config, template)) = solvation_stage {
        let solute = structure.resolved_positions();
        let mut solvated = reporter.phase("Solvation", || {
            solvation::solvate(&solute, template, solvation_config, reporter)
        })?;

        if let Some(ionization_config) = &config.ionization {
            let charges: Vec<f64> = topology.atoms.iter().map(|a| a.charge).collect();
            ions = reporter.phase("Ionization", || {
                ionization::ionize(
                    &solute,
                    &charges,
                    &mut solvated,
                    ionization_config,
                    reporter,
                    &mut diagnostics,
                )
            })?;
        }

        // === Phase 4: Solvent topology ===
        let ion_segment = config
            .ionization
            .as_ref()
            .map_or(DEFAULT_ION_SEGMENT, |c| c.segment_name.as_str());
        let extension = reporter.phase("Solvent Topology", || {
            solvent::extend_with_solvent(
                &mut structure,
                &solvated,
                solvation_config.model,
                &solvation_config.segment_name,
                &ions,
                ion_segment,
            )
        })?;
        topology.extend(extension);
        box_info = Some(solvated.box_info);
    }

    // === Phase 5: Summary ===
    let summary = SystemSummary::compute(&topology, box_info.as_ref());
    info!(
        atoms = summary.atom_count,
        total_mass = summary.total_mass,
        net_charge = summary.net_charge,
        diagnostics = diagnostics.len(),
        "Preparation complete."
    );

    Ok(PreparedSystem {
        structure,
        topology,
        box_info,
        bridges,
        ions,
        summary,
        diagnostics,
    })
}
