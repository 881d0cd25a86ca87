//! Bay geometry and equipment placement.

use crate::{CranePath, Point, SpatialError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Equipment placed inside a bay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedEquipment {
    pub kind: String,
    pub position: Point,
}

/// An axis-aligned rectangular area of the plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bay {
    name: String,
    x_offset: f64,
    y_offset: f64,
    width: f64,
    height: f64,
    crane_paths: Vec<CranePath>,
    equipment: BTreeMap<String, PlacedEquipment>,
}

impl Bay {
    /// Create a bay. Width and height must both be positive.
    pub fn new(
        name: impl Into<String>,
        x_offset: f64,
        y_offset: f64,
        width: f64,
        height: f64,
    ) -> Result<Self, SpatialError> {
        let name = name.into();
        if !(width > 0.0 && height > 0.0) {
            return Err(SpatialError::InvalidGeometry {
                bay: name,
                width,
                height,
            });
        }
        Ok(Self {
            name,
            x_offset,
            y_offset,
            width,
            height,
            crane_paths: Vec::new(),
            equipment: BTreeMap::new(),
        })
    }

    /// Attach crane runways to the bay.
    pub fn with_crane_paths(mut self, paths: impl IntoIterator<Item = CranePath>) -> Self {
        self.crane_paths.extend(paths);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x_offset, self.y_offset)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x_offset + self.width / 2.0,
            self.y_offset + self.height / 2.0,
        )
    }

    /// Inclusive bounds check.
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x_offset
            && p.x <= self.x_offset + self.width
            && p.y >= self.y_offset
            && p.y <= self.y_offset + self.height
    }

    pub fn crane_paths(&self) -> &[CranePath] {
        &self.crane_paths
    }

    /// Where a crane in this bay parks between tasks: the start of the first
    /// runway, or the bay center when the bay has none.
    pub fn crane_home(&self) -> Point {
        self.crane_paths
            .first()
            .map(CranePath::start)
            .unwrap_or_else(|| self.center())
    }

    /// Record a piece of equipment. Re-adding an id moves it.
    pub fn add_equipment(
        &mut self,
        id: impl Into<String>,
        kind: impl Into<String>,
        position: Point,
    ) -> Result<(), SpatialError> {
        if !self.contains_point(position) {
            return Err(SpatialError::OutOfBounds {
                bay: self.name.clone(),
                x: position.x,
                y: position.y,
            });
        }
        self.equipment.insert(
            id.into(),
            PlacedEquipment {
                kind: kind.into(),
                position,
            },
        );
        Ok(())
    }

    pub fn equipment(&self, id: &str) -> Option<&PlacedEquipment> {
        self.equipment.get(id)
    }

    pub fn equipment_count(&self) -> usize {
        self.equipment.len()
    }
}
