//! Source angle table and the frame cache derived from it.
//!
//! The table file is plain text with two degree values per source:
//! - flat layout: one `latitude longitude` pair per line;
//! - grid layout: a leading `grid <rows> <cols>` line followed by exactly `rows` lines, each
//!   holding `cols` pairs. Sources are taken row by row.
//!
//! Blank lines and lines starting with `#` are ignored in both layouts.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SourceError};
use crate::Scalar;

/// Angular position of one emitter on the emission sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceAngle {
    pub latitude_deg: Scalar,
    pub longitude_deg: Scalar,
}

impl SourceAngle {
    pub fn new(latitude_deg: Scalar, longitude_deg: Scalar) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }
}

impl From<(Scalar, Scalar)> for SourceAngle {
    fn from((latitude_deg, longitude_deg): (Scalar, Scalar)) -> Self {
        Self::new(latitude_deg, longitude_deg)
    }
}

/// Precomputed rotation data for one emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceFrame {
    pub sin_lat: Scalar,
    pub cos_lat: Scalar,
    pub longitude_rad: Scalar,
}

impl SourceFrame {
    pub fn from_angle(angle: SourceAngle) -> Self {
        let (sin_lat, cos_lat) = angle.latitude_deg.to_radians().sin_cos();
        Self {
            sin_lat,
            cos_lat,
            longitude_rad: angle.longitude_deg.to_radians(),
        }
    }
}

/// Active source set. Angles and frames always have the same length and order; the only way
/// to change either is to replace both through [`SourceTable::load`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    angles: Vec<SourceAngle>,
    frames: Vec<SourceFrame>,
}

impl SourceTable {
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SourceAngle>,
    {
        let mut table = Self::default();
        table.load(records);
        table
    }

    /// Reads and parses an angle table file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let angles = read_angle_table(path)?;
        Ok(Self::new(angles))
    }

    /// Replaces the active set. An empty sequence is a valid, zero-source table.
    pub fn load<I>(&mut self, records: I)
    where
        I: IntoIterator,
        I::Item: Into<SourceAngle>,
    {
        let angles: Vec<SourceAngle> = records.into_iter().map(Into::into).collect();
        let frames = angles.iter().copied().map(SourceFrame::from_angle).collect();
        self.angles = angles;
        self.frames = frames;
    }

    /// Parses `path` and swaps it in. On error the current set stays untouched.
    pub fn reload_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let angles = read_angle_table(path)?;
        info!(path = %path.display(), sources = angles.len(), "loaded source table");
        self.load(angles);
        Ok(())
    }

    pub fn angles(&self) -> &[SourceAngle] {
        &self.angles
    }

    pub fn frames(&self) -> &[SourceFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Opens and parses an angle table file.
pub fn read_angle_table(path: impl AsRef<Path>) -> Result<Vec<SourceAngle>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_angle_table(BufReader::new(file))
}

/// Parses either table layout into an ordered list of angles.
pub fn parse_angle_table<R: BufRead>(reader: R) -> Result<Vec<SourceAngle>> {
    let mut layout: Option<Layout> = None;
    let mut angles = Vec::new();
    let mut rows_seen = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        let layout = match layout {
            Some(layout) => layout,
            None => {
                let detected = Layout::detect(&tokens, line_no)?;
                layout = Some(detected);
                if matches!(detected, Layout::Grid { .. }) {
                    continue;
                }
                detected
            }
        };

        match layout {
            Layout::Flat => {
                if tokens.len() != 2 {
                    return Err(malformed(
                        line_no,
                        format!("expected 2 values per line, found {}", tokens.len()),
                    ));
                }
            }
            Layout::Grid { rows, cols } => {
                if rows_seen == rows {
                    return Err(malformed(
                        line_no,
                        format!("grid declared {rows} rows but more data follows"),
                    ));
                }
                if tokens.len() != 2 * cols {
                    return Err(malformed(
                        line_no,
                        format!(
                            "expected {} values ({cols} pairs) per grid row, found {}",
                            2 * cols,
                            tokens.len()
                        ),
                    ));
                }
                rows_seen += 1;
            }
        }

        for pair in tokens.chunks_exact(2) {
            let latitude = parse_degrees(pair[0], line_no)?;
            let longitude = parse_degrees(pair[1], line_no)?;
            angles.push(SourceAngle::new(latitude, longitude));
        }
    }

    if let Some(Layout::Grid { rows, .. }) = layout {
        if rows_seen != rows {
            return Err(malformed(
                0,
                format!("grid declared {rows} rows but {rows_seen} were found"),
            ));
        }
    }

    Ok(angles)
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    Flat,
    Grid { rows: usize, cols: usize },
}

impl Layout {
    fn detect(tokens: &[&str], line_no: usize) -> Result<Self> {
        if tokens.first() != Some(&"grid") {
            return Ok(Layout::Flat);
        }
        if tokens.len() != 3 {
            return Err(malformed(line_no, "grid header must be 'grid <rows> <cols>'".into()));
        }
        let rows = parse_count(tokens[1], line_no)?;
        let cols = parse_count(tokens[2], line_no)?;
        Ok(Layout::Grid { rows, cols })
    }
}

fn parse_count(token: &str, line_no: usize) -> Result<usize> {
    token
        .parse()
        .map_err(|_| malformed(line_no, format!("invalid grid dimension '{token}'")))
}

fn parse_degrees(token: &str, line_no: usize) -> Result<Scalar> {
    let value: Scalar = token
        .parse()
        .map_err(|_| malformed(line_no, format!("invalid angle '{token}'")))?;
    if !value.is_finite() {
        return Err(malformed(line_no, format!("non-finite angle '{token}'")));
    }
    Ok(value)
}

fn malformed(line: usize, reason: String) -> SourceError {
    SourceError::MalformedRow { line, reason }
}
