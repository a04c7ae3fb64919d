//! Output destinations, fixed before any unit runs.
//!
//! Every path a run may write is derived from the input stem and checked up
//! front: no two units may share a destination, and no destination may be an
//! input or a reference table.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{PipelineConfig, StepConfig};
use crate::error::{PipelineError, Result};

/// Where one unit's rows go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SinkTarget {
    File(PathBuf),
    /// Fan-out directory; file names come from partition values.
    Directory(PathBuf),
}

/// Destinations for one processing unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnitTarget {
    pub sink: SinkTarget,
    pub mapping_table: Option<PathBuf>,
}

/// Derives and checks the destinations of every input, in input order.
///
/// `reference` is the runner-level reference override.
pub(crate) fn plan_targets(
    config: &PipelineConfig,
    inputs: &[PathBuf],
    reference: Option<&Path>,
) -> Result<Vec<UnitTarget>> {
    let output = &config.output;
    let nested = inputs.len() > 1;
    let targets: Vec<UnitTarget> = inputs
        .iter()
        .map(|input| {
            let stem = input_stem(input);
            let sink = if output.partition_column.is_some() {
                SinkTarget::Directory(if nested {
                    output.dir.join(&stem)
                } else {
                    output.dir.clone()
                })
            } else {
                SinkTarget::File(output.dir.join(format!("{stem}{}.csv", output.suffix)))
            };
            let mapping_table = config
                .writes_mapping_table()
                .then(|| output.dir.join(format!("{stem}_encoding.csv")));
            UnitTarget {
                sink,
                mapping_table,
            }
        })
        .collect();

    let mut sources: BTreeMap<PathBuf, String> = BTreeMap::new();
    for input in inputs {
        sources.insert(resolve(input), format!("input {}", input.display()));
    }
    for path in reference_paths(config, reference) {
        sources.insert(resolve(&path), format!("reference {}", path.display()));
    }

    let mut claimed: BTreeMap<PathBuf, &Path> = BTreeMap::new();
    for (input, target) in inputs.iter().zip(&targets) {
        let mut destinations = Vec::with_capacity(2);
        match &target.sink {
            SinkTarget::File(path) => destinations.push(path.as_path()),
            SinkTarget::Directory(dir) => {
                let resolved = resolve(dir);
                if let Some(source) = sources
                    .iter()
                    .find_map(|(path, name)| (path.parent() == Some(resolved.as_path())).then_some(name))
                {
                    return Err(PipelineError::invalid(format!(
                        "fan-out directory {} holds {source}",
                        dir.display()
                    )));
                }
                destinations.push(dir.as_path());
            }
        }
        destinations.extend(target.mapping_table.as_deref());

        for destination in destinations {
            let resolved = resolve(destination);
            if let Some(source) = sources.get(&resolved) {
                return Err(PipelineError::invalid(format!(
                    "output {} would overwrite {source}",
                    destination.display()
                )));
            }
            if let Some(previous) = claimed.insert(resolved, input.as_path()) {
                return Err(PipelineError::invalid(format!(
                    "inputs {} and {} both write {}",
                    previous.display(),
                    input.display(),
                    destination.display()
                )));
            }
        }
    }
    Ok(targets)
}

/// Reference paths the enrich steps will read.
fn reference_paths(config: &PipelineConfig, reference: Option<&Path>) -> Vec<PathBuf> {
    config
        .steps
        .iter()
        .filter_map(|step| match step {
            StepConfig::Enrich {
                reference: step_reference,
                ..
            } => reference
                .map(Path::to_path_buf)
                .or_else(|| step_reference.clone()),
            _ => None,
        })
        .collect()
}

/// Canonical form of `path`, even when the file does not exist yet.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map_or_else(|_| absolute.clone(), |parent| parent.join(name)),
        _ => absolute,
    }
}

pub(crate) fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .map_or_else(|| "input".to_string(), |s| s.to_string_lossy().into_owned())
}
