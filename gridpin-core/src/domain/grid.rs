//! Grid domain model - the randomized 9x9 digit matrix shown at login

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Number of rows and columns in the grid
pub const GRID_SIZE: usize = 9;

/// Total number of selectable cells
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// A cell position on the grid, zero-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub row: u8,
    pub col: u8,
}

impl Coordinate {
    /// Create a coordinate, rejecting positions outside the grid
    pub fn new(row: u8, col: u8) -> Result<Self> {
        if (row as usize) >= GRID_SIZE || (col as usize) >= GRID_SIZE {
            return Err(Error::InvalidCoordinate(format!("{},{}", row, col)));
        }
        Ok(Self { row, col })
    }

    /// Coordinate for a row-major cell index in `0..81`
    pub fn from_index(index: usize) -> Result<Self> {
        if index >= CELL_COUNT {
            return Err(Error::InvalidCoordinate(format!("cell {}", index)));
        }
        Ok(Self {
            row: (index / GRID_SIZE) as u8,
            col: (index % GRID_SIZE) as u8,
        })
    }

    /// Row-major cell index
    pub fn index(&self) -> usize {
        self.row as usize * GRID_SIZE + self.col as usize
    }

    /// Whether both components are inside the grid
    pub fn is_valid(&self) -> bool {
        (self.row as usize) < GRID_SIZE && (self.col as usize) < GRID_SIZE
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

impl FromStr for Coordinate {
    type Err = Error;

    /// Parse the stored `"row,col"` form
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidCoordinate(s.to_string());
        let (row, col) = s.split_once(',').ok_or_else(invalid)?;
        let row: u8 = row.trim().parse().map_err(|_| invalid())?;
        let col: u8 = col.trim().parse().map_err(|_| invalid())?;
        Coordinate::new(row, col).map_err(|_| invalid())
    }
}

/// A 9x9 matrix of digits, regenerated for every login attempt
///
/// Grids are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cells: [[u8; GRID_SIZE]; GRID_SIZE],
}

impl Grid {
    /// Draw a fresh grid, each cell uniform over 0..=9
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut cells = [[0u8; GRID_SIZE]; GRID_SIZE];
        for row in cells.iter_mut() {
            for cell in row.iter_mut() {
                *cell = rng.gen_range(0..10);
            }
        }
        Self { cells }
    }

    /// Build a grid from explicit rows, validating every digit
    pub fn from_rows(cells: [[u8; GRID_SIZE]; GRID_SIZE]) -> Result<Self> {
        if let Some(bad) = cells.iter().flatten().find(|d| **d > 9) {
            return Err(Error::validation(format!("Grid cell value {} is not a digit", bad)));
        }
        Ok(Self { cells })
    }

    /// Digit at a coordinate
    pub fn digit(&self, coord: Coordinate) -> Result<u8> {
        if !coord.is_valid() {
            return Err(Error::InvalidCoordinate(coord.to_string()));
        }
        Ok(self.cells[coord.row as usize][coord.col as usize])
    }

    /// Rows of the grid, top to bottom
    pub fn rows(&self) -> &[[u8; GRID_SIZE]; GRID_SIZE] {
        &self.cells
    }
}
