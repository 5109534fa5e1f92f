//! Parsers for `zfs list -H -p` output.
//!
//! `-H` gives tab separated fields with no header, `-p` gives exact numeric values.

use crate::types::{DatasetRecord, SnapshotRecord};

/// Parses `name<TAB>mounted` rows.
pub fn parse_datasets(output: &str) -> Result<Vec<DatasetRecord>, String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split('\t');
            match (fields.next(), fields.next()) {
                (Some(name), Some(mounted)) if !name.is_empty() => Ok(DatasetRecord {
                    name: name.to_string(),
                    mounted: parse_mounted(mounted)?,
                }),
                _ => Err(format!("malformed dataset row: {:?}", line)),
            }
        })
        .collect()
}

/// Parses `dataset@label<TAB>creation` rows.
pub fn parse_snapshots(output: &str) -> Result<Vec<SnapshotRecord>, String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split('\t');
            let (Some(name), Some(creation)) = (fields.next(), fields.next()) else {
                return Err(format!("malformed snapshot row: {:?}", line));
            };

            let (dataset, label) = name
                .split_once('@')
                .ok_or_else(|| format!("snapshot name without '@': {}", name))?;

            let creation = creation
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("bad creation time for {}: {}", name, e))?;

            Ok(SnapshotRecord {
                dataset: dataset.to_string(),
                label: label.to_string(),
                creation,
            })
        })
        .collect()
}

fn parse_mounted(value: &str) -> Result<bool, String> {
    match value.trim() {
        "yes" => Ok(true),
        // "-" is reported for datasets that cannot be mounted at all
        "no" | "-" => Ok(false),
        other => Err(format!("unknown mounted value: {}", other)),
    }
}
