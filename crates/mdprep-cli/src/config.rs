use crate::cli::PrepareArgs;
use crate::error::{CliError, Result};
use mdprep::core::io::rules::BondFile;
use mdprep::engine::config as core_config;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialResidueSpecifier {
    segment_index: usize,
    residue_number: isize,
}

impl From<PartialResidueSpecifier> for core_config::ResidueSpecifier {
    fn from(p: PartialResidueSpecifier) -> Self {
        Self::new(p.segment_index, p.residue_number)
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(deny_unknown_fields)]
struct PartialBridge {
    first: PartialResidueSpecifier,
    second: PartialResidueSpecifier,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialInputs {
    topology: Option<PathBuf>,
    parameters: Option<PathBuf>,
    solvent_box: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialAssemblyConfig {
    include_cmap: Option<bool>,
    /// Segment name to FIRST patch name.
    #[serde(default)]
    first_patch: HashMap<String, String>,
    #[serde(default)]
    last_patch: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialDisulfideMode {
    Off,
    #[default]
    Auto,
    Manual,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialDisulfideConfig {
    mode: Option<PartialDisulfideMode>,
    cutoff: Option<f64>,
    #[serde(default)]
    bridges: Vec<PartialBridge>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSolvationConfig {
    enabled: Option<bool>,
    model: Option<String>,
    cutoff: Option<f64>,
    padding: Option<f64>,
    segment_name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialIonizationConfig {
    enabled: Option<bool>,
    cation: Option<String>,
    anion: Option<String>,
    cation_count: Option<usize>,
    anion_count: Option<usize>,
    salt_concentration: Option<f64>,
    ion_solute_distance: Option<f64>,
    ion_ion_distance: Option<f64>,
    method: Option<String>,
    segment_name: Option<String>,
}

/// A job file as written by the user; every field may be left out.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialJobConfig {
    inputs: Option<PartialInputs>,
    assembly: Option<PartialAssemblyConfig>,
    disulfide: Option<PartialDisulfideConfig>,
    solvation: Option<PartialSolvationConfig>,
    ionization: Option<PartialIonizationConfig>,
}

/// Everything a `prepare` run needs once file and command line have been merged.
#[derive(Debug)]
pub struct JobConfig {
    pub topology_path: PathBuf,
    pub params_path: PathBuf,
    pub solvent_box_path: Option<PathBuf>,
    pub preparation: core_config::PreparationConfig,
}

fn config_error(e: core_config::ConfigError) -> CliError {
    CliError::Config(e.to_string())
}

impl PartialJobConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading job configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::file(path, e))
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merges the job file with command-line overrides; the command line wins.
    ///
    /// A bond file, when given, replaces the disulfide mode with its manual bridge list.
    pub fn merge_with_cli(self, args: &PrepareArgs, bonds: Option<BondFile>) -> Result<JobConfig> {
        let inputs = self.inputs.unwrap_or_default();
        let required = |cli: &Option<PathBuf>, file: Option<PathBuf>, key: &str| {
            cli.clone().or(file).ok_or_else(|| {
                CliError::Config(format!(
                    "A value for '{key}' is required either in the job file or via CLI argument."
                ))
            })
        };
        let topology_path = required(&args.topology, inputs.topology, "inputs.topology")?;
        let params_path = required(&args.params, inputs.parameters, "inputs.parameters")?;

        let assembly = Self::merge_assembly(self.assembly.unwrap_or_default(), args);
        let disulfide = Self::merge_disulfide(self.disulfide.unwrap_or_default(), args, bonds)?;

        let solvation_file = self.solvation.unwrap_or_default();
        let solvate = !args.no_solvate && solvation_file.enabled.unwrap_or(true);
        let ionization_file = self.ionization.unwrap_or_default();
        let ionize = solvate && !args.no_ions && ionization_file.enabled.unwrap_or(true);

        let mut builder = core_config::PreparationConfigBuilder::new()
            .assembly(assembly)
            .disulfide(disulfide);
        let mut solvent_box_path = None;
        if solvate {
            solvent_box_path = Some(required(
                &args.solvent_box,
                inputs.solvent_box,
                "inputs.solvent-box",
            )?);
            builder = builder.solvation(Self::merge_solvation(solvation_file, args)?);
        }
        if ionize {
            builder = builder.ionization(Self::merge_ionization(ionization_file, args)?);
        }

        Ok(JobConfig {
            topology_path,
            params_path,
            solvent_box_path,
            preparation: builder.build().map_err(config_error)?,
        })
    }

    fn merge_assembly(file: PartialAssemblyConfig, args: &PrepareArgs) -> core_config::AssemblyConfig {
        let include_cmap = !args.no_cmap && file.include_cmap.unwrap_or(true);
        let mut builder = core_config::AssemblyConfigBuilder::new().include_cmap(include_cmap);
        for (segment, patch) in &file.first_patch {
            builder = builder.first_patch(segment, patch);
        }
        for (segment, patch) in &file.last_patch {
            builder = builder.last_patch(segment, patch);
        }
        builder.build()
    }

    fn merge_disulfide(
        file: PartialDisulfideConfig,
        args: &PrepareArgs,
        bonds: Option<BondFile>,
    ) -> Result<core_config::DisulfideMode> {
        if args.no_disulfides {
            return Ok(core_config::DisulfideMode::Off);
        }
        if let Some(bonds) = bonds {
            return Ok(core_config::DisulfideMode::Manual(bonds.disulfides));
        }

        let mode = if args.disulfide_cutoff.is_some() {
            PartialDisulfideMode::Auto
        } else {
            file.mode.unwrap_or_default()
        };
        Ok(match mode {
            PartialDisulfideMode::Off => core_config::DisulfideMode::Off,
            PartialDisulfideMode::Auto => core_config::DisulfideMode::Auto {
                cutoff: args
                    .disulfide_cutoff
                    .or(file.cutoff)
                    .unwrap_or(core_config::DEFAULT_DISULFIDE_CUTOFF),
            },
            PartialDisulfideMode::Manual => {
                if file.bridges.is_empty() {
                    return Err(CliError::Config(
                        "`disulfide.mode = \"manual\"` requires at least one entry in `disulfide.bridges`."
                            .to_string(),
                    ));
                }
                core_config::DisulfideMode::Manual(
                    file.bridges
                        .iter()
                        .map(|b| (b.first.into(), b.second.into()))
                        .collect(),
                )
            }
        })
    }

    fn merge_solvation(
        file: PartialSolvationConfig,
        args: &PrepareArgs,
    ) -> Result<core_config::SolvationConfig> {
        let mut builder = core_config::SolvationConfigBuilder::new();
        if let Some(model) = &file.model {
            builder = builder.model(model.parse().map_err(CliError::Config)?);
        }
        if let Some(cutoff) = args.solvent_cutoff.or(file.cutoff) {
            builder = builder.cutoff(cutoff);
        }
        if let Some(padding) = args.padding.or(file.padding) {
            builder = builder.padding(padding);
        }
        if let Some(name) = &file.segment_name {
            builder = builder.segment_name(name);
        }
        builder.build().map_err(config_error)
    }

    fn merge_ionization(
        file: PartialIonizationConfig,
        args: &PrepareArgs,
    ) -> Result<core_config::IonizationConfig> {
        let mut builder = core_config::IonizationConfigBuilder::new();
        if let Some(cation) = args.cation.as_ref().or(file.cation.as_ref()) {
            builder = builder.cation(cation);
        }
        if let Some(anion) = args.anion.as_ref().or(file.anion.as_ref()) {
            builder = builder.anion(anion);
        }
        if let Some(n) = args.cation_count.or(file.cation_count) {
            builder = builder.cation_count(n);
        }
        if let Some(n) = args.anion_count.or(file.anion_count) {
            builder = builder.anion_count(n);
        }
        if let Some(molar) = args.salt.or(file.salt_concentration) {
            builder = builder.salt_concentration(molar);
        }
        if let Some(d) = args.ion_solute_distance.or(file.ion_solute_distance) {
            builder = builder.ion_solute_distance(d);
        }
        if let Some(d) = args.ion_ion_distance.or(file.ion_ion_distance) {
            builder = builder.ion_ion_distance(d);
        }
        if let Some(method) = &file.method {
            builder = builder.method(method.parse().map_err(config_error)?);
        }
        if let Some(name) = &file.segment_name {
            builder = builder.segment_name(name);
        }
        builder.build().map_err(config_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdprep::engine::config::{DisulfideMode, PlacementMethod, ResidueSpecifier};
    use mdprep::engine::solvation::SolventModel;

    fn args() -> PrepareArgs {
        PrepareArgs {
            input: PathBuf::from("in.toml"),
            output: PathBuf::from("out.toml"),
            ..Default::default()
        }
    }

    const JOB: &str = r#"
[inputs]
topology = "top.toml"
parameters = "par.toml"
solvent-box = "tip3p.csv"

[assembly]
include-cmap = false
first-patch = { PROA = "NTER" }

[disulfide]
mode = "auto"
cutoff = 2.3

[solvation]
model = "tip3p"
padding = 12.0

[ionization]
cation = "POT"
salt-concentration = 0.15
method = "electrostatic"
"#;

    #[test]
    fn job_file_is_merged_into_preparation_config() {
        let job = PartialJobConfig::from_toml_str(JOB)
            .unwrap()
            .merge_with_cli(&args(), None)
            .unwrap();

        assert_eq!(job.topology_path, PathBuf::from("top.toml"));
        assert_eq!(job.solvent_box_path, Some(PathBuf::from("tip3p.csv")));

        let config = job.preparation;
        assert!(!config.assembly.include_cmap);
        assert_eq!(
            config.assembly.first_patch_overrides.get("PROA").map(String::as_str),
            Some("NTER")
        );
        assert_eq!(config.disulfide, DisulfideMode::Auto { cutoff: 2.3 });

        let solvation = config.solvation.unwrap();
        assert_eq!(solvation.model, SolventModel::Tip3p);
        assert_eq!(solvation.padding, 12.0);

        let ionization = config.ionization.unwrap();
        assert_eq!(ionization.cation.residue_name, "POT");
        assert_eq!(ionization.salt_concentration, 0.15);
        assert_eq!(ionization.method, PlacementMethod::Electrostatic);
    }

    #[test]
    fn command_line_overrides_job_file() {
        let mut args = args();
        args.cation = Some("Na+".to_string());
        args.padding = Some(10.0);
        args.disulfide_cutoff = Some(2.0);
        args.topology = Some(PathBuf::from("other.toml"));

        let job = PartialJobConfig::from_toml_str(JOB)
            .unwrap()
            .merge_with_cli(&args, None)
            .unwrap();

        assert_eq!(job.topology_path, PathBuf::from("other.toml"));
        assert_eq!(job.preparation.disulfide, DisulfideMode::Auto { cutoff: 2.0 });
        assert_eq!(job.preparation.solvation.unwrap().padding, 10.0);
        assert_eq!(job.preparation.ionization.unwrap().cation.residue_name, "SOD");
    }

    #[test]
    fn no_solvate_drops_solvation_and_ionization() {
        let mut args = args();
        args.no_solvate = true;

        let job = PartialJobConfig::from_toml_str(JOB)
            .unwrap()
            .merge_with_cli(&args, None)
            .unwrap();

        assert!(job.solvent_box_path.is_none());
        assert!(job.preparation.solvation.is_none());
        assert!(job.preparation.ionization.is_none());
    }

    #[test]
    fn bond_file_replaces_automatic_detection() {
        let bonds = BondFile {
            disulfides: vec![(ResidueSpecifier::new(1, 3), ResidueSpecifier::new(1, 40))],
        };

        let job = PartialJobConfig::from_toml_str(JOB)
            .unwrap()
            .merge_with_cli(&args(), Some(bonds))
            .unwrap();

        assert_eq!(
            job.preparation.disulfide,
            DisulfideMode::Manual(vec![(ResidueSpecifier::new(1, 3), ResidueSpecifier::new(1, 40))])
        );
    }

    #[test]
    fn manual_bridges_are_read_from_job_file() {
        let content = r#"
[inputs]
topology = "top.toml"
parameters = "par.toml"

[disulfide]
mode = "manual"
bridges = [
    { first = { segment-index = 1, residue-number = 3 }, second = { segment-index = 2, residue-number = 8 } },
]

[solvation]
enabled = false
"#;
        let job = PartialJobConfig::from_toml_str(content)
            .unwrap()
            .merge_with_cli(&args(), None)
            .unwrap();

        assert_eq!(
            job.preparation.disulfide,
            DisulfideMode::Manual(vec![(ResidueSpecifier::new(1, 3), ResidueSpecifier::new(2, 8))])
        );
        assert!(job.preparation.solvation.is_none());
    }

    #[test]
    fn missing_inputs_are_reported() {
        let result = PartialJobConfig::default().merge_with_cli(&args(), None);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("inputs.topology")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PartialJobConfig::from_toml_str("[solvation]\nwater = 1\n").is_err());
    }

    #[test]
    fn unknown_ion_is_a_configuration_error() {
        let mut args = args();
        args.anion = Some("XYZ".to_string());
        let result = PartialJobConfig::from_toml_str(JOB)
            .unwrap()
            .merge_with_cli(&args, None);
        assert!(matches!(result, Err(CliError::Config(msg)) if msg.contains("XYZ")));
    }
}
