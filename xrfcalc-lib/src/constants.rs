/// Euler-Mascheroni constant
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Binding energy (keV) assumed for an origin level without tabulated value
pub const DEFAULT_ORIGIN_BINDING_ENERGY: f64 = 0.003;

/// Two grid energies closer than this (keV) collapse an interpolation bracket
pub const COLLAPSED_BRACKET: f64 = 5.0e-10;

/// Shift (keV) applied to split duplicated energies above a binding energy
pub const EDGE_SPLIT: f64 = 1.0e-6;

/// Largest distance (keV) between a tabulated edge and a binding energy
/// for the two to be matched
pub const EDGE_MATCH_TOLERANCE: f64 = 0.100;

/// Default capacity of the per-element memoisation caches
pub const DEFAULT_CACHE_CAPACITY: usize = 5000;

/// Relative convergence criterion of the Lentz continued fraction
pub const CONTINUED_FRACTION_TOLERANCE: f64 = 1.0e-5;

/// Iteration cap of the Lentz continued fraction
pub const CONTINUED_FRACTION_MAX_ITERATIONS: usize = 50;

/// Minimum mass fraction for a line to feed tertiary excitation
pub const TERTIARY_MASS_FRACTION: f64 = 5.0e-3;

/// Minimum secondary enhancement ((p + s) / p) for a line to feed tertiary excitation
pub const TERTIARY_ENHANCEMENT: f64 = 1.01;

/// Exciting layers whose beam weight is below this fraction of the
/// fluorescing layer's are ignored
pub const LAYER_WEIGHT_CUTOFF: f64 = 1.0e-4;

/// Fluorescence transmission through the fluorescing layer below which an
/// underlying exciting layer is ignored
pub const LAYER_TRANSMISSION_CUTOFF: f64 = 1.0e-3;

/// Excitation rates below this are ignored in secondary excitation
pub const MINIMUM_EXCITATION_RATE: f64 = 1.0e-30;

/// Nudge applied to an attenuation coefficient that makes a de Boer
/// argument vanish
pub const SINGULARITY_NUDGE: f64 = 0.99999;
