//! The city grid
//!
//! A fixed-size row-major array of cells. Each cell is empty or references
//! one placed entity; roads and intersections span `ROAD_UNIT` columns and
//! wide buildings span two.

use super::error::{SimError, SimResult};
use super::types::{BuildingId, GridCoord, Heading, RoadId, ROAD_UNIT};

/// What a grid cell points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellRef {
    Road(RoadId),
    Building(BuildingId),
}

#[derive(Debug, Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Option<CellRef>>,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.row < self.rows && coord.col < self.cols
    }

    /// Bounds-checked lookup with signed indices
    pub fn cell(&self, row: isize, col: isize) -> SimResult<Option<CellRef>> {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return Err(SimError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(self.cells[row as usize * self.cols + col as usize])
    }

    /// The entity at `coord`, or `None` for empty or out-of-range cells
    pub fn get(&self, coord: GridCoord) -> Option<CellRef> {
        if !self.contains(coord) {
            return None;
        }
        self.cells[coord.row * self.cols + coord.col]
    }

    /// True for in-range cells holding nothing
    pub fn is_empty(&self, coord: GridCoord) -> bool {
        self.contains(coord) && self.get(coord).is_none()
    }

    /// Occupy `span` consecutive cells of one row. Nothing is written unless
    /// every cell is in range and empty.
    pub fn place_span(&mut self, coord: GridCoord, span: usize, entity: CellRef) -> SimResult<()> {
        let last = coord.col + span.saturating_sub(1);
        if coord.row >= self.rows || last >= self.cols || span == 0 {
            return Err(SimError::OutOfBounds {
                row: coord.row as isize,
                col: last as isize,
                rows: self.rows,
                cols: self.cols,
            });
        }
        for col in coord.col..=last {
            let here = GridCoord::new(coord.row, col);
            if self.get(here).is_some() {
                return Err(SimError::Occupied(here));
            }
        }
        for col in coord.col..=last {
            self.cells[coord.row * self.cols + col] = Some(entity);
        }
        Ok(())
    }

    /// The neighbouring road-unit cell in `heading` (one row vertically, one
    /// road unit horizontally), if it is inside the grid
    pub fn step(&self, coord: GridCoord, heading: Heading) -> Option<GridCoord> {
        let (dx, dy) = heading.delta();
        let next = coord.offset(dy as isize, dx as isize * ROAD_UNIT as isize)?;
        self.contains(next).then_some(next)
    }

    /// All cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (GridCoord, Option<CellRef>)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(index, cell)| (GridCoord::new(index / self.cols, index % self.cols), *cell))
    }

    /// Number of cells referencing `entity`
    pub fn count_cells(&self, entity: CellRef) -> usize {
        self.cells.iter().filter(|c| **c == Some(entity)).count()
    }
}
