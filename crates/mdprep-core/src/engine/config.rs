use super::ionization::{IonSpecies, lookup_ion};
use super::solvation::SolventModel;
pub use crate::core::models::structure::ResidueSpecifier;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_DISULFIDE_CUTOFF: f64 = 2.1;
pub const DEFAULT_SOLVATION_CUTOFF: f64 = 2.4;
pub const DEFAULT_SOLVATION_PADDING: f64 = 9.0;
pub const DEFAULT_ION_SOLUTE_DISTANCE: f64 = 5.0;
pub const DEFAULT_ION_ION_DISTANCE: f64 = 5.0;
pub const DEFAULT_SOLVENT_SEGMENT: &str = "WAT";
pub const DEFAULT_ION_SEGMENT: &str = "ION";
pub const DEFAULT_CATION: &str = "SOD";
pub const DEFAULT_ANION: &str = "CLA";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Parameter '{parameter}' is out of range: {value}")]
    InvalidRange { parameter: &'static str, value: f64 },
    #[error("Unknown ion: {0}")]
    UnknownIon(String),
    #[error("Ion '{name}' does not carry a {expected} charge")]
    WrongIonCharge { name: String, expected: &'static str },
    #[error("Unknown ion placement method: {0}")]
    UnknownMethod(String),
}

fn positive(parameter: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidRange { parameter, value })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    pub include_cmap: bool,
    /// Chain-start patch per segment name, overriding the template choice.
    pub first_patch_overrides: HashMap<String, String>,
    /// Chain-end patch per segment name, overriding the template choice.
    pub last_patch_overrides: HashMap<String, String>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            include_cmap: true,
            first_patch_overrides: HashMap::new(),
            last_patch_overrides: HashMap::new(),
        }
    }
}

#[derive(Default)]
pub struct AssemblyConfigBuilder {
    include_cmap: Option<bool>,
    first_patch_overrides: HashMap<String, String>,
    last_patch_overrides: HashMap<String, String>,
}

impl AssemblyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_cmap(mut self, include: bool) -> Self {
        self.include_cmap = Some(include);
        self
    }
    pub fn first_patch(mut self, segment: &str, patch: &str) -> Self {
        self.first_patch_overrides
            .insert(segment.to_string(), patch.to_string());
        self
    }
    pub fn last_patch(mut self, segment: &str, patch: &str) -> Self {
        self.last_patch_overrides
            .insert(segment.to_string(), patch.to_string());
        self
    }

    pub fn build(self) -> AssemblyConfig {
        AssemblyConfig {
            include_cmap: self.include_cmap.unwrap_or(true),
            first_patch_overrides: self.first_patch_overrides,
            last_patch_overrides: self.last_patch_overrides,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DisulfideMode {
    #[default]
    Off,
    /// Bridge every cysteine pair whose SG atoms are within `cutoff` Angstroms.
    Auto { cutoff: f64 },
    /// Bridge exactly the listed residue pairs.
    Manual(Vec<(ResidueSpecifier, ResidueSpecifier)>),
}

impl DisulfideMode {
    pub fn auto() -> Self {
        Self::Auto {
            cutoff: DEFAULT_DISULFIDE_CUTOFF,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Self::Auto { cutoff } = self {
            positive("disulfide_cutoff", *cutoff)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvationConfig {
    pub model: SolventModel,
    pub cutoff: f64,
    pub padding: f64,
    pub segment_name: String,
}

#[derive(Default)]
pub struct SolvationConfigBuilder {
    model: Option<SolventModel>,
    cutoff: Option<f64>,
    padding: Option<f64>,
    segment_name: Option<String>,
}

impl SolvationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: SolventModel) -> Self {
        self.model = Some(model);
        self
    }
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn padding(mut self, padding: f64) -> Self {
        self.padding = Some(padding);
        self
    }
    pub fn segment_name(mut self, name: &str) -> Self {
        self.segment_name = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<SolvationConfig, ConfigError> {
        Ok(SolvationConfig {
            model: self.model.unwrap_or_default(),
            cutoff: positive(
                "solvation_cutoff",
                self.cutoff.unwrap_or(DEFAULT_SOLVATION_CUTOFF),
            )?,
            padding: positive(
                "solvation_padding",
                self.padding.unwrap_or(DEFAULT_SOLVATION_PADDING),
            )?,
            segment_name: self
                .segment_name
                .unwrap_or_else(|| DEFAULT_SOLVENT_SEGMENT.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMethod {
    /// Greedy placement at electrostatic potential extrema.
    #[default]
    Electrostatic,
    /// Unbiased placement; declared but not available.
    Random,
}

impl FromStr for PlacementMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "electrostatic" | "potential" => Ok(Self::Electrostatic),
            "random" | "randomly" => Ok(Self::Random),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IonizationConfig {
    pub cation: &'static IonSpecies,
    pub anion: &'static IonSpecies,
    /// Requested cation count; together with `anion_count` zero means neutralize.
    pub cation_count: usize,
    pub anion_count: usize,
    /// Target bulk salt concentration in mol/L, applied on top of neutralization.
    pub salt_concentration: f64,
    pub ion_solute_distance: f64,
    pub ion_ion_distance: f64,
    pub method: PlacementMethod,
    pub segment_name: String,
}

impl IonizationConfig {
    pub fn is_automatic(&self) -> bool {
        self.cation_count == 0 && self.anion_count == 0
    }
}

#[derive(Default)]
pub struct IonizationConfigBuilder {
    cation: Option<String>,
    anion: Option<String>,
    cation_count: Option<usize>,
    anion_count: Option<usize>,
    salt_concentration: Option<f64>,
    ion_solute_distance: Option<f64>,
    ion_ion_distance: Option<f64>,
    method: Option<PlacementMethod>,
    segment_name: Option<String>,
}

impl IonizationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cation(mut self, name: &str) -> Self {
        self.cation = Some(name.to_string());
        self
    }
    pub fn anion(mut self, name: &str) -> Self {
        self.anion = Some(name.to_string());
        self
    }
    pub fn cation_count(mut self, n: usize) -> Self {
        self.cation_count = Some(n);
        self
    }
    pub fn anion_count(mut self, n: usize) -> Self {
        self.anion_count = Some(n);
        self
    }
    pub fn salt_concentration(mut self, molar: f64) -> Self {
        self.salt_concentration = Some(molar);
        self
    }
    pub fn ion_solute_distance(mut self, distance: f64) -> Self {
        self.ion_solute_distance = Some(distance);
        self
    }
    pub fn ion_ion_distance(mut self, distance: f64) -> Self {
        self.ion_ion_distance = Some(distance);
        self
    }
    pub fn method(mut self, method: PlacementMethod) -> Self {
        self.method = Some(method);
        self
    }
    pub fn segment_name(mut self, name: &str) -> Self {
        self.segment_name = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<IonizationConfig, ConfigError> {
        let cation_name = self.cation.as_deref().unwrap_or(DEFAULT_CATION);
        let cation =
            lookup_ion(cation_name).ok_or_else(|| ConfigError::UnknownIon(cation_name.to_string()))?;
        if cation.charge <= 0 {
            return Err(ConfigError::WrongIonCharge {
                name: cation_name.to_string(),
                expected: "positive",
            });
        }

        let anion_name = self.anion.as_deref().unwrap_or(DEFAULT_ANION);
        let anion =
            lookup_ion(anion_name).ok_or_else(|| ConfigError::UnknownIon(anion_name.to_string()))?;
        if anion.charge >= 0 {
            return Err(ConfigError::WrongIonCharge {
                name: anion_name.to_string(),
                expected: "negative",
            });
        }

        let salt_concentration = self.salt_concentration.unwrap_or(0.0);
        if !(salt_concentration.is_finite() && salt_concentration >= 0.0) {
            return Err(ConfigError::InvalidRange {
                parameter: "salt_concentration",
                value: salt_concentration,
            });
        }

        Ok(IonizationConfig {
            cation,
            anion,
            cation_count: self.cation_count.unwrap_or(0),
            anion_count: self.anion_count.unwrap_or(0),
            salt_concentration,
            ion_solute_distance: positive(
                "ion_solute_distance",
                self.ion_solute_distance
                    .unwrap_or(DEFAULT_ION_SOLUTE_DISTANCE),
            )?,
            ion_ion_distance: positive(
                "ion_ion_distance",
                self.ion_ion_distance.unwrap_or(DEFAULT_ION_ION_DISTANCE),
            )?,
            method: self.method.unwrap_or_default(),
            segment_name: self
                .segment_name
                .unwrap_or_else(|| DEFAULT_ION_SEGMENT.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PreparationConfig {
    pub assembly: AssemblyConfig,
    pub disulfide: DisulfideMode,
    pub solvation: Option<SolvationConfig>,
    pub ionization: Option<IonizationConfig>,
}

#[derive(Default)]
pub struct PreparationConfigBuilder {
    assembly: Option<AssemblyConfig>,
    disulfide: Option<DisulfideMode>,
    solvation: Option<SolvationConfig>,
    ionization: Option<IonizationConfig>,
}

impl PreparationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assembly(mut self, config: AssemblyConfig) -> Self {
        self.assembly = Some(config);
        self
    }
    pub fn disulfide(mut self, mode: DisulfideMode) -> Self {
        self.disulfide = Some(mode);
        self
    }
    pub fn solvation(mut self, config: SolvationConfig) -> Self {
        self.solvation = Some(config);
        self
    }
    pub fn ionization(mut self, config: IonizationConfig) -> Self {
        self.ionization = Some(config);
        self
    }

    /// Assembles the configuration; ionization needs a solvation stage to draw sites from.
    pub fn build(self) -> Result<PreparationConfig, ConfigError> {
        let disulfide = self.disulfide.unwrap_or_default();
        disulfide.validate()?;
        if self.ionization.is_some() && self.solvation.is_none() {
            return Err(ConfigError::MissingParameter("solvation"));
        }
        Ok(PreparationConfig {
            assembly: self.assembly.unwrap_or_default(),
            disulfide,
            solvation: self.solvation,
            ionization: self.ionization,
        })
    }
}
