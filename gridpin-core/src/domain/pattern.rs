//! Pattern domain model - the secret spatial sequence behind the dynamic PIN
//!
//! A pattern is an ordered list of exactly four grid cells. Reading the
//! digits under those cells, in order, on a fresh grid yields the one-time
//! PIN for that login. Order matters, so every structure here is a sequence
//! rather than a set.

use serde::{Deserialize, Serialize};

use super::grid::{Coordinate, Grid};
use super::result::{Error, Result};

/// Number of cells in a pattern (and digits in a PIN)
pub const PATTERN_LENGTH: usize = 4;

/// A validated enrollment pattern
///
/// Repeated cells are accepted, as they always have been, but they shrink
/// the PIN space. `has_duplicates` lets callers flag them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Pattern {
    cells: Vec<Coordinate>,
}

impl Pattern {
    pub fn new(cells: Vec<Coordinate>) -> Result<Self> {
        if cells.len() != PATTERN_LENGTH {
            return Err(Error::InvalidPattern(format!(
                "expected {} positions, got {}",
                PATTERN_LENGTH,
                cells.len()
            )));
        }
        if let Some(bad) = cells.iter().find(|c| !c.is_valid()) {
            return Err(Error::InvalidPattern(format!("position {} is off the grid", bad)));
        }
        Ok(Self { cells })
    }

    /// Parse the stored `["r,c", ...]` form
    pub fn parse<S: AsRef<str>>(positions: &[S]) -> Result<Self> {
        let cells = positions
            .iter()
            .map(|p| {
                p.as_ref()
                    .parse::<Coordinate>()
                    .map_err(|_| Error::InvalidPattern(format!("bad position '{}'", p.as_ref())))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(cells)
    }

    pub fn cells(&self) -> &[Coordinate] {
        &self.cells
    }

    /// True when the same cell appears more than once
    pub fn has_duplicates(&self) -> bool {
        self.cells
            .iter()
            .enumerate()
            .any(|(i, c)| self.cells[i + 1..].contains(c))
    }

    /// Read this pattern's PIN off a grid
    pub fn derive_pin(&self, grid: &Grid) -> Result<String> {
        derive_pin(&self.cells, grid)
    }

    /// Stored text form, one `"r,c"` per cell
    pub fn to_strings(&self) -> Vec<String> {
        self.cells.iter().map(|c| c.to_string()).collect()
    }
}

impl TryFrom<Vec<String>> for Pattern {
    type Error = Error;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Pattern::parse(&value)
    }
}

impl From<Pattern> for Vec<String> {
    fn from(pattern: Pattern) -> Self {
        pattern.to_strings()
    }
}

/// Concatenate, in order, the digit under each coordinate
pub fn derive_pin(pattern: &[Coordinate], grid: &Grid) -> Result<String> {
    let mut pin = String::with_capacity(pattern.len());
    for coord in pattern {
        let digit = grid.digit(*coord)?;
        pin.push(char::from(b'0' + digit));
    }
    Ok(pin)
}

/// Outcome of a single toggle during enrollment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "change", content = "position")]
pub enum SelectionChange {
    /// Cell appended; carries its 1-based order
    Added(usize),
    /// Cell was selected and has been removed
    Removed,
    /// Selection already full and the cell was not part of it
    Ignored,
}

/// In-progress pattern selection with toggle semantics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSelection {
    cells: Vec<Coordinate>,
}

impl PatternSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the cell if absent and there is room, remove it if present
    pub fn toggle(&mut self, coord: Coordinate) -> Result<SelectionChange> {
        if !coord.is_valid() {
            return Err(Error::InvalidCoordinate(coord.to_string()));
        }
        if let Some(index) = self.cells.iter().position(|c| *c == coord) {
            self.cells.remove(index);
            return Ok(SelectionChange::Removed);
        }
        if self.cells.len() < PATTERN_LENGTH {
            self.cells.push(coord);
            return Ok(SelectionChange::Added(self.cells.len()));
        }
        Ok(SelectionChange::Ignored)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.cells.len() == PATTERN_LENGTH
    }

    /// 1-based order of a selected cell
    pub fn position_of(&self, coord: Coordinate) -> Option<usize> {
        self.cells.iter().position(|c| *c == coord).map(|i| i + 1)
    }

    pub fn selected(&self) -> &[Coordinate] {
        &self.cells
    }

    /// Turn a complete selection into a pattern
    pub fn finish(&self) -> Result<Pattern> {
        if !self.is_complete() {
            return Err(Error::InvalidPattern(format!(
                "select {} positions on the grid ({}/{} selected)",
                PATTERN_LENGTH,
                self.cells.len(),
                PATTERN_LENGTH
            )));
        }
        Pattern::new(self.cells.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::{CELL_COUNT, GRID_SIZE};
    use proptest::prelude::*;

    fn c(row: u8, col: u8) -> Coordinate {
        Coordinate::new(row, col).unwrap()
    }

    fn diagonal_grid(values: [u8; 4]) -> Grid {
        let mut cells = [[0u8; GRID_SIZE]; GRID_SIZE];
        for (i, v) in values.iter().enumerate() {
            cells[i][i] = *v;
        }
        Grid::from_rows(cells).unwrap()
    }

    #[test]
    fn test_derive_pin_reads_in_pattern_order() {
        let grid = diagonal_grid([4, 7, 1, 9]);
        let pattern = Pattern::new(vec![c(0, 0), c(1, 1), c(2, 2), c(3, 3)]).unwrap();
        assert_eq!(pattern.derive_pin(&grid).unwrap(), "4719");

        let reversed = Pattern::new(vec![c(3, 3), c(2, 2), c(1, 1), c(0, 0)]).unwrap();
        assert_eq!(reversed.derive_pin(&grid).unwrap(), "9174");
    }

    #[test]
    fn test_derive_pin_rejects_out_of_range() {
        let grid = diagonal_grid([1, 2, 3, 4]);
        let raw = [c(0, 0), Coordinate { row: 9, col: 1 }, c(1, 1), c(2, 2)];
        assert!(matches!(derive_pin(&raw, &grid), Err(Error::InvalidCoordinate(_))));
    }

    #[test]
    fn test_pattern_length_enforced() {
        assert!(matches!(
            Pattern::new(vec![c(0, 0), c(1, 1), c(2, 2)]),
            Err(Error::InvalidPattern(_))
        ));
        assert!(Pattern::new(vec![c(0, 0); 5]).is_err());
    }

    #[test]
    fn test_duplicates_are_accepted_but_reported() {
        let pattern = Pattern::new(vec![c(0, 0), c(0, 0), c(2, 2), c(3, 3)]).unwrap();
        assert!(pattern.has_duplicates());

        let distinct = Pattern::new(vec![c(0, 0), c(1, 1), c(2, 2), c(3, 3)]).unwrap();
        assert!(!distinct.has_duplicates());
    }

    #[test]
    fn test_parse_stored_form() {
        let pattern = Pattern::parse(&["0,0", "1,1", "8,8", "4,2"]).unwrap();
        assert_eq!(pattern.to_strings(), vec!["0,0", "1,1", "8,8", "4,2"]);
        assert!(Pattern::parse(&["0,0", "1,1", "9,9", "4,2"]).is_err());
    }

    #[test]
    fn test_pattern_serde_uses_text_positions() {
        let pattern = Pattern::parse(&["0,1", "2,3", "4,5", "6,7"]).unwrap();
        let json = serde_json::to_string(&pattern).unwrap();
        assert_eq!(json, r#"["0,1","2,3","4,5","6,7"]"#);
        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pattern);
        assert!(serde_json::from_str::<Pattern>(r#"["0,1"]"#).is_err());
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut selection = PatternSelection::new();
        assert_eq!(selection.toggle(c(0, 0)).unwrap(), SelectionChange::Added(1));
        assert_eq!(selection.toggle(c(1, 1)).unwrap(), SelectionChange::Added(2));
        assert_eq!(selection.toggle(c(0, 0)).unwrap(), SelectionChange::Removed);
        assert_eq!(selection.selected(), &[c(1, 1)]);
        assert_eq!(selection.position_of(c(1, 1)), Some(1));
    }

    #[test]
    fn test_toggle_ignores_fifth_cell() {
        let mut selection = PatternSelection::new();
        for i in 0..4 {
            selection.toggle(c(i, i)).unwrap();
        }
        assert!(selection.is_complete());
        assert_eq!(selection.toggle(c(5, 5)).unwrap(), SelectionChange::Ignored);
        assert_eq!(selection.len(), 4);

        // Removing frees a slot; re-adding goes to the end
        selection.toggle(c(1, 1)).unwrap();
        assert_eq!(selection.toggle(c(5, 5)).unwrap(), SelectionChange::Added(4));
        assert_eq!(selection.selected(), &[c(0, 0), c(2, 2), c(3, 3), c(5, 5)]);
    }

    #[test]
    fn test_finish_requires_exactly_four() {
        let mut selection = PatternSelection::new();
        selection.toggle(c(0, 0)).unwrap();
        assert!(matches!(selection.finish(), Err(Error::InvalidPattern(_))));
        for i in 1..4 {
            selection.toggle(c(i, 0)).unwrap();
        }
        let pattern = selection.finish().unwrap();
        assert_eq!(pattern.cells(), &[c(0, 0), c(1, 0), c(2, 0), c(3, 0)]);
    }

    #[test]
    fn test_toggle_rejects_off_grid() {
        let mut selection = PatternSelection::new();
        assert!(selection.toggle(Coordinate { row: 0, col: 9 }).is_err());
        assert!(selection.is_empty());
    }

    fn grid_from(digits: &[u8]) -> Grid {
        let mut cells = [[0u8; GRID_SIZE]; GRID_SIZE];
        for (i, d) in digits.iter().enumerate() {
            cells[i / GRID_SIZE][i % GRID_SIZE] = *d;
        }
        Grid::from_rows(cells).unwrap()
    }

    proptest! {
        #[test]
        fn prop_derive_pin_is_four_digits_read_from_the_cells(
            digits in prop::collection::vec(0u8..=9, CELL_COUNT),
            indices in prop::collection::vec(0usize..CELL_COUNT, PATTERN_LENGTH),
        ) {
            let grid = grid_from(&digits);
            let cells: Vec<Coordinate> = indices
                .iter()
                .map(|&i| Coordinate::from_index(i).unwrap())
                .collect();
            let pattern = Pattern::new(cells).unwrap();

            let pin = pattern.derive_pin(&grid).unwrap();
            prop_assert_eq!(pin.len(), PATTERN_LENGTH);
            prop_assert_eq!(&pin, &pattern.derive_pin(&grid).unwrap());

            let expected: String = indices.iter().map(|&i| char::from(b'0' + digits[i])).collect();
            prop_assert_eq!(pin, expected);
        }
    }
}
