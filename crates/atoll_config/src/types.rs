//! Typed configuration for the placement flow.
//!
//! The placer is configured through a flat string map (the shape the
//! synthesis-side tooling dumps). [`PlacerConfig::from_map`] validates the
//! map: required keys fail fast with [`ConfigError::MissingKey`], optional
//! keys fall back to documented defaults, and the dump directory is created
//! eagerly so later dump sinks only ever hit transient I/O errors.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Key for the extracted device description dump.
pub const KEY_DEVICE_FILE: &str = "vivado extracted device information file";
/// Key for the per-type special pin offset table.
pub const KEY_PIN_OFFSET_FILE: &str = "special pin offset info file";
/// Key for the extracted design netlist dump.
pub const KEY_DESIGN_FILE: &str = "vivado extracted design information file";
/// Key for the per-type fixed-resource counts.
pub const KEY_FIXED_AMOUNT_FILE: &str = "cellType2fixedAmo file";
/// Key for the packing equivalence classes.
pub const KEY_SHARED_TYPE_FILE: &str = "cellType2sharedCellType file";
/// Key for the shared-type to basic-element mapping.
pub const KEY_BEL_TYPE_FILE: &str = "sharedCellType2BELtype file";
/// Key for the total outer-iteration budget.
pub const KEY_ITERATIONS: &str = "GlobalPlacementIteration";
/// Key for the worker-thread count.
pub const KEY_JOBS: &str = "jobs";
/// Optional key for the vertical/horizontal distance weighting.
pub const KEY_Y2X_RATIO: &str = "y2xRatio";
/// Optional key for the checkpoint/output directory.
pub const KEY_DUMP_DIRECTORY: &str = "dumpDirectory";
/// Optional key enabling verbose timing-optimizer reporting.
pub const KEY_TIMING_VERBOSE: &str = "PlacementTimingOptimizerVerbose";
/// Optional key for the per-net enhancement dump path.
pub const KEY_NET_WEIGHT_LOG: &str = "PlacementTimingOptimizer_EnhanceNetWeightLevelBasedLog";
/// Optional key for the per-edge delay dump path.
pub const KEY_EDGE_DELAY_LOG: &str = "PlacementTimingOptimizer_EdgesDelayLog";
/// Optional key for the cluster highlight script prefix.
pub const KEY_CLUSTER_DUMP: &str = "Dump Cluster file";

/// Validated placer configuration.
///
/// The ingestion file paths are carried verbatim for the external loaders;
/// the core only interprets the iteration budget, worker count, distance
/// weighting, and dump settings.
#[derive(Debug, Clone)]
pub struct PlacerConfig {
    /// Path to the extracted device description.
    pub device_file: PathBuf,
    /// Path to the per-type pin offset table.
    pub pin_offset_file: PathBuf,
    /// Path to the extracted design netlist.
    pub design_file: PathBuf,
    /// Path to the per-type fixed-resource counts.
    pub fixed_amount_file: PathBuf,
    /// Path to the packing equivalence classes.
    pub shared_type_file: PathBuf,
    /// Path to the shared-type to basic-element mapping.
    pub bel_type_file: PathBuf,
    /// Total outer-iteration budget for global placement.
    pub global_placement_iterations: usize,
    /// Number of worker threads for the parallel phases.
    pub jobs: usize,
    /// Vertical vs. horizontal distance weighting (default 1.0).
    pub y2x_ratio: f64,
    /// Checkpoint/output directory, created at construction time.
    pub dump_directory: Option<PathBuf>,
    /// Verbose timing-optimizer reporting.
    pub timing_verbose: bool,
    /// Per-net enhancement dump path.
    pub net_weight_log: Option<PathBuf>,
    /// Per-edge delay dump path.
    pub edge_delay_log: Option<PathBuf>,
    /// Cluster highlight script prefix.
    pub cluster_dump_prefix: Option<PathBuf>,
}

impl PlacerConfig {
    /// Builds a validated configuration from a raw string map.
    ///
    /// Required keys are checked first so the caller learns about every
    /// missing input by name. If `dumpDirectory` is set and absent on disk
    /// it is created; failure to create it is fatal.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let required = |key: &str| -> Result<&String, ConfigError> {
            map.get(key).ok_or_else(|| ConfigError::MissingKey(key.to_string()))
        };

        let device_file = PathBuf::from(required(KEY_DEVICE_FILE)?);
        let pin_offset_file = PathBuf::from(required(KEY_PIN_OFFSET_FILE)?);
        let design_file = PathBuf::from(required(KEY_DESIGN_FILE)?);
        let fixed_amount_file = PathBuf::from(required(KEY_FIXED_AMOUNT_FILE)?);
        let shared_type_file = PathBuf::from(required(KEY_SHARED_TYPE_FILE)?);
        let bel_type_file = PathBuf::from(required(KEY_BEL_TYPE_FILE)?);

        let global_placement_iterations =
            parse_usize(KEY_ITERATIONS, required(KEY_ITERATIONS)?)?;
        let jobs = parse_usize(KEY_JOBS, required(KEY_JOBS)?)?.max(1);

        let y2x_ratio = match map.get(KEY_Y2X_RATIO) {
            Some(v) => parse_f64(KEY_Y2X_RATIO, v)?,
            None => 1.0,
        };

        let dump_directory = map.get(KEY_DUMP_DIRECTORY).map(PathBuf::from);
        if let Some(dir) = &dump_directory {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .map_err(|_| ConfigError::DumpDirectory(dir.display().to_string()))?;
            }
        }

        Ok(Self {
            device_file,
            pin_offset_file,
            design_file,
            fixed_amount_file,
            shared_type_file,
            bel_type_file,
            global_placement_iterations,
            jobs,
            y2x_ratio,
            dump_directory,
            timing_verbose: map
                .get(KEY_TIMING_VERBOSE)
                .map(|v| v == "true")
                .unwrap_or(false),
            net_weight_log: map.get(KEY_NET_WEIGHT_LOG).map(PathBuf::from),
            edge_delay_log: map.get(KEY_EDGE_DELAY_LOG).map(PathBuf::from),
            cluster_dump_prefix: map.get(KEY_CLUSTER_DUMP).map(PathBuf::from),
        })
    }

    /// Returns the path for a named artifact inside the dump directory, or
    /// `None` when no dump directory is configured.
    pub fn dump_path(&self, name: &str) -> Option<PathBuf> {
        self.dump_directory.as_ref().map(|d| d.join(name))
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected an unsigned integer, got '{value}'"),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("expected a number, got '{value}'"),
    })
}
