//! Text scene descriptions.
//!
//! Partitions are records of six integers (start x y z, size w h d) and
//! sources records of three integers (x y z), all in physical units and
//! separated by any whitespace. Lines starting with `#` are ignored.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    config::SimulationConfig,
    grid::{GridPoint, GridRegion, GridShape},
    ArdError, Result,
};

/// A partition placement in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    pub start: [i64; 3],
    pub size: [i64; 3],
}

impl PartitionDescriptor {
    /// Converts to grid units by dividing by `dh` and truncating.
    pub fn to_region(&self, config: &SimulationConfig) -> Result<GridRegion> {
        let cells = |v: i64| config.to_cells(v as f64);
        let start = GridPoint::new(
            cells(self.start[0]),
            cells(self.start[1]),
            cells(self.start[2]),
        );
        let shape = GridShape::try_new(cells(self.size[0]), cells(self.size[1]), cells(self.size[2]))?;
        Ok(GridRegion::new(start, shape))
    }
}

/// A source position in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub position: [i64; 3],
}

impl SourceDescriptor {
    pub fn to_point(&self, config: &SimulationConfig) -> GridPoint {
        let cells = |v: i64| config.to_cells(v as f64);
        GridPoint::new(
            cells(self.position[0]),
            cells(self.position[1]),
            cells(self.position[2]),
        )
    }
}

/// Partitions and sources as read from the scene files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDescription {
    pub partitions: Vec<PartitionDescriptor>,
    pub sources: Vec<SourceDescriptor>,
}

impl SceneDescription {
    pub fn new(partitions: Vec<PartitionDescriptor>, sources: Vec<SourceDescriptor>) -> Self {
        Self {
            partitions,
            sources,
        }
    }

    /// Reads the partition and source files.
    pub fn load(partitions: impl AsRef<Path>, sources: impl AsRef<Path>) -> Result<Self> {
        let partitions = Self::parse_partitions(&std::fs::read_to_string(partitions)?)?;
        let sources = Self::parse_sources(&std::fs::read_to_string(sources)?)?;
        Ok(Self::new(partitions, sources))
    }

    pub fn parse_partitions(text: &str) -> Result<Vec<PartitionDescriptor>> {
        Ok(parse_records::<6>(text)?
            .into_iter()
            .map(|r| PartitionDescriptor {
                start: [r[0], r[1], r[2]],
                size: [r[3], r[4], r[5]],
            })
            .collect())
    }

    pub fn parse_sources(text: &str) -> Result<Vec<SourceDescriptor>> {
        Ok(parse_records::<3>(text)?
            .into_iter()
            .map(|position| SourceDescriptor { position })
            .collect())
    }
}

/// Splits whitespace-separated integers into fixed-size records.
fn parse_records<const N: usize>(text: &str) -> Result<Vec<[i64; N]>> {
    let mut records = Vec::new();
    let mut current = [0_i64; N];
    let mut filled = 0;
    let mut last_line = 0;

    for (number, line) in text.lines().enumerate() {
        let line_no = number + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        last_line = line_no;
        for token in line.split_whitespace() {
            current[filled] = token.parse().map_err(|_| ArdError::Parse {
                line: line_no,
                message: format!("expected an integer, found `{token}`"),
            })?;
            filled += 1;
            if filled == N {
                records.push(current);
                filled = 0;
            }
        }
    }

    if filled != 0 {
        return Err(ArdError::Parse {
            line: last_line,
            message: format!("incomplete record: {filled} of {N} values"),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partition_records() {
        let text = "# hall\n0 0 0 4 3 2\n4 0 0\n2 3 2\n";
        let partitions = SceneDescription::parse_partitions(text).unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[1].start, [4, 0, 0]);
        assert_eq!(partitions[1].size, [2, 3, 2]);
    }

    #[test]
    fn reports_incomplete_records() {
        let err = SceneDescription::parse_sources("1 2 3\n4 5\n").unwrap_err();
        assert!(matches!(err, ArdError::Parse { line: 2, .. }));
    }

    #[test]
    fn reports_bad_tokens() {
        let err = SceneDescription::parse_sources("1 x 3\n").unwrap_err();
        assert!(format!("{err}").contains("`x`"));
    }

    #[test]
    fn converts_to_grid_units() {
        let config = SimulationConfig::default();
        let descriptor = PartitionDescriptor {
            start: [1, 0, 2],
            size: [4, 3, 2],
        };
        let region = descriptor.to_region(&config).unwrap();
        assert_eq!(region.start, GridPoint::new(10, 0, 20));
        assert_eq!(region.shape, GridShape::new(40, 30, 20));

        let source = SourceDescriptor { position: [2, 1, 1] };
        assert_eq!(source.to_point(&config), GridPoint::new(20, 10, 10));
    }

    #[test]
    fn rejects_empty_partitions() {
        let descriptor = PartitionDescriptor {
            start: [0, 0, 0],
            size: [4, 0, 2],
        };
        assert!(descriptor.to_region(&SimulationConfig::default()).is_err());
    }
}
