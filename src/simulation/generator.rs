//! Procedural city generator
//!
//! Fills the grid in three ordered passes:
//!
//! 1. Horizontal pass: rows separated by a random gap receive road runs and
//!    intersections. Every intersection is echoed one gap below so the next
//!    processed row already knows where its crossings are.
//! 2. Vertical pass: empty cells under an intersection or vertical road get a
//!    vertical road of the matching width.
//! 3. Building pass: empty cells directly above or below a road get a
//!    building, with the facade choice weighted toward its left neighbour.

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::error::{SimError, SimResult};
use super::grid::{CellRef, Grid};
use super::node_table::{
    IntersectionNode, IntersectionShape, IntersectionVariant, NodeRole, Orientation, RoadWidth,
};
use super::road::{Building, BuildingStyle, RoadEntity, RoadKind};
use super::types::{
    BuildingId, GridCoord, Heading, Rect, RoadId, Vec2, COLUMN_WIDTH, ROAD_UNIT, ROW_HEIGHT,
};

/// Smallest gap between generated road rows
const ROW_GAP_MIN: usize = 3;

/// Largest gap between generated road rows
const ROW_GAP_MAX: usize = 4;

/// Road units in the first run of the top row; one more with probability 1/3
const FIRST_ROW_RUN: usize = 5;

/// A candidate spawn point produced by generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnNode {
    pub cell: GridCoord,
    pub role: NodeRole,
    pub position: Vec2,
}

/// The generated city: grid, entities and spawn candidates
#[derive(Debug, Clone)]
pub struct CityMap {
    pub grid: Grid,
    pub roads: Vec<RoadEntity>,
    pub buildings: Vec<Building>,
    pub spawn_nodes: Vec<SpawnNode>,
}

impl CityMap {
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            grid: Grid::new(rows, cols),
            roads: Vec::new(),
            buildings: Vec::new(),
            spawn_nodes: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    /// World rectangle covered by the grid
    pub fn world_bounds(&self) -> Rect {
        Rect::new(
            0,
            0,
            self.cols() as i32 * COLUMN_WIDTH,
            self.rows() as i32 * ROW_HEIGHT,
        )
    }

    pub fn road(&self, id: RoadId) -> Option<&RoadEntity> {
        self.roads.get(id.0)
    }

    /// The road or intersection covering `coord`
    pub fn road_at(&self, coord: GridCoord) -> Option<&RoadEntity> {
        match self.grid.get(coord)? {
            CellRef::Road(id) => self.road(id),
            CellRef::Building(_) => None,
        }
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id.0)
    }

    pub fn intersection_count(&self) -> usize {
        self.roads.iter().filter(|r| r.is_intersection()).count()
    }

    /// Place a road or intersection with its top-left cell at `coord`
    pub fn add_road(&mut self, coord: GridCoord, width: RoadWidth, kind: RoadKind) -> SimResult<RoadId> {
        let id = RoadId(self.roads.len());
        self.grid.place_span(coord, ROAD_UNIT, CellRef::Road(id))?;
        self.roads.push(RoadEntity::new(id, coord, width, kind));
        Ok(id)
    }

    pub fn add_building(
        &mut self,
        coord: GridCoord,
        style: BuildingStyle,
        facing_up: bool,
    ) -> SimResult<BuildingId> {
        let id = BuildingId(self.buildings.len());
        self.grid.place_span(coord, style.span(), CellRef::Building(id))?;
        self.buildings
            .push(Building::new(id, coord, style, facing_up));
        Ok(id)
    }

    /// Rebuild the spawn candidates from every defined anchor
    pub fn collect_spawn_nodes(&mut self) {
        self.spawn_nodes = self
            .roads
            .iter()
            .flat_map(|road| {
                road.roles().into_iter().filter_map(move |role| {
                    road.anchor(role).map(|position| SpawnNode {
                        cell: road.coord,
                        role,
                        position,
                    })
                })
            })
            .collect();
    }

    /// Check that every cell points at an entity whose span covers it, that
    /// every entity owns exactly its span, and that every intersection has
    /// corner waypoints and stop points on each connected arm
    pub fn validate(&self) -> SimResult<()> {
        for (coord, cell) in self.grid.iter() {
            let Some(cell) = cell else { continue };
            let (origin, span) = match cell {
                CellRef::Road(id) => {
                    let road = self.road(id).ok_or_else(|| inconsistency(coord, "dangling road"))?;
                    (road.coord, ROAD_UNIT)
                }
                CellRef::Building(id) => {
                    let building = self
                        .building(id)
                        .ok_or_else(|| inconsistency(coord, "dangling building"))?;
                    (building.coord, building.span())
                }
            };
            if origin.row != coord.row || coord.col < origin.col || coord.col >= origin.col + span {
                return Err(inconsistency(coord, "cell outside its entity span"));
            }
        }

        for road in &self.roads {
            if self.grid.count_cells(CellRef::Road(road.id)) != ROAD_UNIT {
                return Err(inconsistency(road.coord, "road does not own its span"));
            }
            let RoadKind::Intersection(variant) = road.kind else {
                continue;
            };
            let roles = road.roles();
            let corners = roles
                .iter()
                .filter(|role| matches!(role, NodeRole::Intersection(IntersectionNode::Walk(_))))
                .count();
            if corners != 4 {
                return Err(inconsistency(road.coord, "intersection without four corners"));
            }
            for heading in Heading::ALL {
                if !variant.shape.connects(heading.opposite()) {
                    continue;
                }
                let stop = NodeRole::Intersection(IntersectionNode::Stop {
                    heading,
                    lane: 0,
                });
                if road.anchor(stop).is_none() {
                    return Err(inconsistency(
                        road.coord,
                        &format!("{:?} has no stop point for {:?} traffic", variant, heading),
                    ));
                }
            }
        }

        for building in &self.buildings {
            if self.grid.count_cells(CellRef::Building(building.id)) != building.span() {
                return Err(inconsistency(building.coord, "building does not own its span"));
            }
        }
        Ok(())
    }

    /// Split into the grid and entity lists
    pub fn into_parts(self) -> (Grid, Vec<RoadEntity>, Vec<Building>) {
        (self.grid, self.roads, self.buildings)
    }
}

fn inconsistency(coord: GridCoord, reason: &str) -> SimError {
    SimError::GenerationInconsistency {
        coord,
        reason: reason.to_string(),
    }
}

/// Generate a city from a seed
pub fn generate(rows: usize, cols: usize, seed: u64) -> SimResult<CityMap> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_with_rng(rows, cols, &mut rng)
}

/// Generate a city drawing every random decision from `rng`
pub fn generate_with_rng(rows: usize, cols: usize, rng: &mut StdRng) -> SimResult<CityMap> {
    let mut generator = MapGenerator {
        map: CityMap::empty(rows, cols),
        rng,
    };
    generator.horizontal_pass();
    generator.vertical_pass();
    generator.building_pass();

    let mut map = generator.map;
    map.validate()?;
    map.collect_spawn_nodes();
    Ok(map)
}

struct MapGenerator<'a> {
    map: CityMap,
    rng: &'a mut StdRng,
}

impl MapGenerator<'_> {
    fn random_road_width(&mut self) -> RoadWidth {
        if self.rng.random_range(0..5) == 0 {
            RoadWidth::FourLane
        } else {
            RoadWidth::TwoLane
        }
    }

    fn horizontal_pass(&mut self) {
        let rows = self.map.rows();
        let cols = self.map.cols();
        let mut width = self.random_road_width();
        let mut row = 0;

        while row < rows {
            let gap = self.rng.random_range(ROW_GAP_MIN..=ROW_GAP_MAX);
            let next_width = self.random_road_width();
            let mut col = 0;

            while col + ROAD_UNIT <= cols {
                let here = GridCoord::new(row, col);
                match self.map.grid.get(here) {
                    None if col == 0 => {
                        col = self.lay_road_run(here, width, true);
                        continue;
                    }
                    None => {
                        let left = self.map.road_at(GridCoord::new(row, col - ROAD_UNIT));
                        match left {
                            Some(entity) if entity.is_intersection() => {
                                let connected = entity.connects(Heading::Right);
                                col = self.lay_road_run(here, width, connected);
                                continue;
                            }
                            Some(_) => {
                                let variant = self.pick_variant(width, true);
                                if self.place_intersection(here, variant) {
                                    self.echo_down(here, variant, gap, next_width);
                                }
                            }
                            None => {
                                let variant = self.pick_variant(width, false);
                                if self.place_intersection(here, variant) {
                                    self.echo_down(here, variant, gap, next_width);
                                }
                            }
                        }
                    }
                    Some(CellRef::Road(id)) => {
                        let echoed = self.map.road(id).and_then(|road| road.variant());
                        if let Some(variant) = echoed {
                            self.echo_down(here, variant, gap, next_width);
                        }
                    }
                    Some(CellRef::Building(_)) => {}
                }
                col += ROAD_UNIT;
            }

            row += gap;
            width = next_width;
        }
    }

    /// Lay horizontal roads from `start`. On the top row the run has a random
    /// length; on later rows it fills up to the next occupied cell. When the
    /// entity on the left has no right arm the cells are skipped instead.
    /// Returns the first column after the run.
    fn lay_road_run(&mut self, start: GridCoord, width: RoadWidth, connected: bool) -> usize {
        let cols = self.map.cols();
        let length = if self.rng.random_range(0..3) == 0 {
            FIRST_ROW_RUN + 1
        } else {
            FIRST_ROW_RUN
        };
        let mut col = start.col;
        let mut units = 0;

        while col + ROAD_UNIT <= cols {
            let here = GridCoord::new(start.row, col);
            if start.row == 0 {
                if units >= length {
                    break;
                }
            } else if !self.map.grid.is_empty(here) {
                break;
            }
            if connected {
                if let Err(err) =
                    self.map
                        .add_road(here, width, RoadKind::Road(Orientation::Horizontal))
                {
                    debug!("skipping road at {}: {}", here, err);
                }
            }
            units += 1;
            col += ROAD_UNIT;
        }
        col
    }

    /// Pick an intersection for a row of `width`. The vertical road is four
    /// lanes wide with probability 1/3; two-lane rows turn into a three-way
    /// without a right arm with probability 1/3.
    fn pick_variant(&mut self, width: RoadWidth, left_connected: bool) -> IntersectionVariant {
        let vertical = if self.rng.random_range(0..3) == 0 {
            RoadWidth::FourLane
        } else {
            RoadWidth::TwoLane
        };
        let shape = self.pick_shape(width, left_connected);
        IntersectionVariant {
            horizontal: width,
            vertical,
            shape,
        }
    }

    fn pick_shape(&mut self, width: RoadWidth, left_connected: bool) -> IntersectionShape {
        if !left_connected {
            return IntersectionShape::ThreeWayNoLeft;
        }
        if width == RoadWidth::TwoLane && self.rng.random_range(0..3) == 0 {
            IntersectionShape::ThreeWayNoRight
        } else {
            IntersectionShape::FourWay
        }
    }

    fn place_intersection(&mut self, coord: GridCoord, variant: IntersectionVariant) -> bool {
        match self
            .map
            .add_road(coord, variant.horizontal, RoadKind::Intersection(variant))
        {
            Ok(_) => true,
            Err(err) => {
                warn!("could not place intersection at {}: {}", coord, err);
                false
            }
        }
    }

    /// Place the matching intersection `gap` rows below `coord`. It keeps the
    /// vertical width of the one above, takes the horizontal width of its own
    /// row, and loses its left arm when the nearest entity to its left in
    /// that row has no right arm.
    fn echo_down(
        &mut self,
        coord: GridCoord,
        above: IntersectionVariant,
        gap: usize,
        row_width: RoadWidth,
    ) {
        let target = GridCoord::new(coord.row + gap, coord.col);
        if target.row >= self.map.rows() || !self.map.grid.is_empty(target) {
            return;
        }

        let left_connected = (0..target.col)
            .rev()
            .step_by(ROAD_UNIT)
            .find_map(|col| self.map.road_at(GridCoord::new(target.row, col)))
            .map(|road| road.connects(Heading::Right))
            .unwrap_or(true);

        let shape = self.pick_shape(row_width, left_connected);
        let variant = IntersectionVariant {
            horizontal: row_width,
            vertical: above.vertical,
            shape,
        };
        self.place_intersection(target, variant);
    }

    fn vertical_pass(&mut self) {
        let rows = self.map.rows();
        let cols = self.map.cols();

        for row in 1..rows {
            for col in (0..cols).step_by(ROAD_UNIT) {
                let here = GridCoord::new(row, col);
                if !self.map.grid.is_empty(here) {
                    continue;
                }
                let width = match self.map.road_at(GridCoord::new(row - 1, col)) {
                    Some(above) => match above.kind {
                        RoadKind::Intersection(variant) => variant.vertical,
                        RoadKind::Road(Orientation::Vertical) => above.width,
                        RoadKind::Road(Orientation::Horizontal) => continue,
                    },
                    None => continue,
                };
                if let Err(err) = self
                    .map
                    .add_road(here, width, RoadKind::Road(Orientation::Vertical))
                {
                    debug!("skipping vertical road at {}: {}", here, err);
                }
            }
        }
    }

    fn building_pass(&mut self) {
        let rows = self.map.rows();
        let cols = self.map.cols();

        for row in 1..rows {
            let mut previous: Option<BuildingStyle> = None;
            let mut col = 0;

            while col < cols {
                let here = GridCoord::new(row, col);
                let road_above = self.map.road_at(GridCoord::new(row - 1, col)).is_some();
                let road_below = self.map.road_at(GridCoord::new(row + 1, col)).is_some();

                if !self.map.grid.is_empty(here) || !(road_above || road_below) {
                    previous = None;
                    col += 1;
                    continue;
                }

                let style = self.pick_style(previous, here);
                match self.map.add_building(here, style, road_above) {
                    Ok(_) => {
                        previous = Some(style);
                        col += style.span();
                    }
                    Err(err) => {
                        debug!("skipping building at {}: {}", here, err);
                        previous = None;
                        col += 1;
                    }
                }
            }
        }
    }

    /// Facade choice biased toward continuing the previous building: after a
    /// two-story facade another two-story is likely, after a double-wide
    /// another double-wide is. A double-wide that would not fit is re-rolled.
    fn pick_style(&mut self, previous: Option<BuildingStyle>, here: GridCoord) -> BuildingStyle {
        let count = BuildingStyle::ALL.len();
        let double = BuildingStyle::DoubleWide.index();
        let mut index = match previous {
            Some(BuildingStyle::GreyTwoStory) | Some(BuildingStyle::YellowTwoStory) => {
                let roll = self.rng.random_range(0..count + 2);
                if roll > double {
                    roll - 3
                } else {
                    roll
                }
            }
            Some(BuildingStyle::DoubleWide) => self.rng.random_range(0..count + 2).min(double),
            _ => self.rng.random_range(0..count),
        };

        let next = GridCoord::new(here.row, here.col + 1);
        if index == double && !self.map.grid.is_empty(next) {
            index = self.rng.random_range(0..double);
        }
        BuildingStyle::from_index(index)
    }
}
