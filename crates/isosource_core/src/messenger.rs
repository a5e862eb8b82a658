//! Text command surface for the source assembly (`/GP/source/...`) and macro file runner.
//!
//! ```text
//! /GP/source/iso_radius 40 cm
//! /GP/source/src_angle 2.5 deg
//! /GP/source/rot_start 0
//! /GP/source/rot_stop 360 deg
//! /GP/source/shift_x 1.5 mm
//! /GP/source/src_fname sources.txt
//! ```
//!
//! Lengths default to millimetres and angles to degrees when no unit is given.

use std::{io::BufRead, path::PathBuf};

use tracing::{debug, info};

use crate::angles::SourceTable;
use crate::config::AssemblyConfig;
use crate::error::{Result, SourceError};
use crate::Scalar;

pub const DIRECTORY: &str = "/GP/source/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One parsed source command, values already converted to mm / degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    IsoRadius(Scalar),
    SrcAngle(Scalar),
    RotStart(Scalar),
    RotStop(Scalar),
    Shift(Axis, Scalar),
    SourceTable(PathBuf),
}

/// Outcome of running one macro line.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroLine {
    Applied(Command),
    /// A command for another directory, left for the caller.
    Foreign(String),
    Skipped,
}

#[derive(Debug, Clone, Copy)]
enum Quantity {
    Length,
    Angle,
}

impl Quantity {
    fn default_unit(self) -> &'static str {
        match self {
            Quantity::Length => "mm",
            Quantity::Angle => "deg",
        }
    }

    /// Factor converting `unit` into the internal unit (mm or degree).
    fn factor(self, unit: &str) -> Option<Scalar> {
        match (self, unit) {
            (Quantity::Length, "um") => Some(1e-3),
            (Quantity::Length, "mm") => Some(1.0),
            (Quantity::Length, "cm") => Some(10.0),
            (Quantity::Length, "m") => Some(1000.0),
            (Quantity::Angle, "deg" | "degree" | "degrees") => Some(1.0),
            (Quantity::Angle, "rad" | "radian" | "radians") => Some(180.0 / std::f64::consts::PI),
            (Quantity::Angle, "mrad" | "milliradian") => Some(0.18 / std::f64::consts::PI),
            _ => None,
        }
    }
}

/// Holds the configuration and source table being built by commands.
#[derive(Debug, Clone, Default)]
pub struct SourceMessenger {
    config: AssemblyConfig,
    sources: SourceTable,
}

impl SourceMessenger {
    pub fn new(config: AssemblyConfig) -> Self {
        Self {
            config,
            sources: SourceTable::default(),
        }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn sources(&self) -> &SourceTable {
        &self.sources
    }

    pub fn into_parts(self) -> (AssemblyConfig, SourceTable) {
        (self.config, self.sources)
    }

    /// Parses a `/GP/source/...` command line. `line_no` is only used in error messages.
    pub fn parse(line: &str, line_no: usize) -> Result<Command> {
        let err = |reason: String| SourceError::Command {
            line: line_no,
            reason,
        };
        let mut parts = line.split_whitespace();
        let path = parts.next().unwrap_or_default();
        let name = path
            .strip_prefix(DIRECTORY)
            .ok_or_else(|| err(format!("'{path}' is not a source command")))?;
        let args: Vec<&str> = parts.collect();

        let value = |quantity: Quantity| -> Result<Scalar> {
            let (raw, unit) = match args.as_slice() {
                [] => return Err(err(format!("'{name}' needs a value"))),
                [raw] => (*raw, quantity.default_unit()),
                [raw, unit] => (*raw, *unit),
                _ => return Err(err(format!("too many arguments for '{name}'"))),
            };
            let number: Scalar = raw
                .parse()
                .map_err(|_| err(format!("invalid number '{raw}' for '{name}'")))?;
            if !number.is_finite() {
                return Err(err(format!("non-finite value for '{name}'")));
            }
            let factor = quantity
                .factor(unit)
                .ok_or_else(|| err(format!("unknown unit '{unit}' for '{name}'")))?;
            Ok(number * factor)
        };

        let command = match name {
            "iso_radius" => {
                let radius = value(Quantity::Length)?;
                if radius <= 0.0 {
                    return Err(err(format!("iso_radius must be > 0, got {radius}")));
                }
                Command::IsoRadius(radius)
            }
            "src_angle" => Command::SrcAngle(value(Quantity::Angle)?),
            "rot_start" => Command::RotStart(value(Quantity::Angle)?),
            "rot_stop" => Command::RotStop(value(Quantity::Angle)?),
            "shift_x" => Command::Shift(Axis::X, value(Quantity::Length)?),
            "shift_y" => Command::Shift(Axis::Y, value(Quantity::Length)?),
            "shift_z" => Command::Shift(Axis::Z, value(Quantity::Length)?),
            "src_fname" | "source_table_filename" => match args.as_slice() {
                [file] => Command::SourceTable(PathBuf::from(*file)),
                _ => return Err(err(format!("'{name}' needs exactly one file name"))),
            },
            other => return Err(err(format!("unknown source command '{other}'"))),
        };
        Ok(command)
    }

    /// Applies a parsed command. Loading a source table happens immediately, so a missing
    /// file is reported at the command that named it.
    pub fn apply(&mut self, command: &Command) -> Result<()> {
        debug!(?command, "applying source command");
        match command {
            Command::IsoRadius(v) => self.config.iso_radius = Some(*v),
            Command::SrcAngle(v) => self.config.set_src_angle(*v),
            Command::RotStart(v) => self.config.rot_start = Some(*v),
            Command::RotStop(v) => self.config.rot_stop = Some(*v),
            Command::Shift(Axis::X, v) => self.config.shift_x = Some(*v),
            Command::Shift(Axis::Y, v) => self.config.shift_y = Some(*v),
            Command::Shift(Axis::Z, v) => self.config.shift_z = Some(*v),
            Command::SourceTable(path) => {
                self.sources.reload_from_path(path)?;
                self.config.source_table = Some(path.clone());
            }
        }
        Ok(())
    }

    /// Parses and applies one macro line.
    pub fn apply_line(&mut self, line: &str, line_no: usize) -> Result<MacroLine> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(MacroLine::Skipped);
        }
        if !trimmed.starts_with(DIRECTORY) {
            return Ok(MacroLine::Foreign(trimmed.to_string()));
        }
        let command = Self::parse(trimmed, line_no)?;
        self.apply(&command)?;
        Ok(MacroLine::Applied(command))
    }

    /// Runs a whole macro, stopping at the first failing command. Returns the lines that
    /// belong to other command directories.
    pub fn apply_macro<R: BufRead>(&mut self, reader: R) -> Result<Vec<String>> {
        let mut foreign = Vec::new();
        let mut applied = 0usize;
        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|source| SourceError::MacroRead {
                line: line_no,
                source,
            })?;
            match self.apply_line(&line, line_no)? {
                MacroLine::Applied(_) => applied += 1,
                MacroLine::Foreign(other) => foreign.push(other),
                MacroLine::Skipped => {}
            }
        }
        info!(applied, foreign = foreign.len(), "source macro applied");
        Ok(foreign)
    }
}
