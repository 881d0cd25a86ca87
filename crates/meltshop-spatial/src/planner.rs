//! Bay-to-bay path planning with a bounded memo cache.

use crate::{Bay, CarType, PathSegment, Point, SpatialError};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Ladle car speed used when the layout does not configure one.
pub const DEFAULT_LADLE_CAR_SPEED: f64 = 150.0;

/// Upper bound on memoized paths. The oldest entry is evicted first.
const MAX_CACHED_PATHS: usize = 1000;

type PathKey = (String, String, Option<CarType>);

/// Owns the bay layout and answers path queries between bays.
#[derive(Debug, Clone)]
pub struct SpatialPlanner {
    bays: BTreeMap<String, Bay>,
    car_speed: f64,
    cache: HashMap<PathKey, Vec<PathSegment>>,
    cache_order: VecDeque<PathKey>,
}

impl SpatialPlanner {
    pub fn new(bays: Vec<Bay>, car_speed: f64) -> Result<Self, SpatialError> {
        let mut planner = Self {
            bays: BTreeMap::new(),
            car_speed: DEFAULT_LADLE_CAR_SPEED,
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
        };
        planner.reconfigure(bays, car_speed)?;
        Ok(planner)
    }

    /// Replace the whole layout. On error the previous layout is kept.
    pub fn reconfigure(&mut self, bays: Vec<Bay>, car_speed: f64) -> Result<(), SpatialError> {
        validate_speed(car_speed)?;
        let mut map = BTreeMap::new();
        for bay in bays {
            let name = bay.name().to_string();
            if map.insert(name.clone(), bay).is_some() {
                return Err(SpatialError::DuplicateBay(name));
            }
        }
        self.bays = map;
        self.car_speed = car_speed;
        self.clear_cache();
        tracing::debug!(
            component = "spatial",
            bays = self.bays.len(),
            car_speed,
            "layout reconfigured"
        );
        Ok(())
    }

    /// Change the ladle car speed. Cached travel times depend on it, so the
    /// cache is dropped.
    pub fn set_car_speed(&mut self, car_speed: f64) -> Result<(), SpatialError> {
        validate_speed(car_speed)?;
        self.car_speed = car_speed;
        self.clear_cache();
        Ok(())
    }

    pub fn car_speed(&self) -> f64 {
        self.car_speed
    }

    pub fn bay(&self, name: &str) -> Option<&Bay> {
        self.bays.get(name)
    }

    /// Bays in name order.
    pub fn bays(&self) -> impl Iterator<Item = &Bay> {
        self.bays.values()
    }

    pub fn bay_names(&self) -> Vec<String> {
        self.bays.keys().cloned().collect()
    }

    pub fn bay_center(&self, name: &str) -> Option<Point> {
        self.bays.get(name).map(Bay::center)
    }

    /// Place equipment in a bay, validating bounds.
    pub fn place_equipment(
        &mut self,
        bay: &str,
        id: &str,
        kind: &str,
        position: Point,
    ) -> Result<(), SpatialError> {
        self.bays
            .get_mut(bay)
            .ok_or_else(|| SpatialError::UnknownBay(bay.to_string()))?
            .add_equipment(id, kind, position)
    }

    /// Position of a placed unit, searching every bay.
    pub fn get_unit_position(&self, id: &str) -> Option<Point> {
        self.bays
            .values()
            .find_map(|b| b.equipment(id).map(|e| e.position))
    }

    /// First bay (in name order) containing the point.
    pub fn get_bay_at_position(&self, p: Point) -> Option<&str> {
        self.bays
            .values()
            .find(|b| b.contains_point(p))
            .map(Bay::name)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cache_order.clear();
    }

    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }

    /// Path from the center of `from` to the center of `to`.
    ///
    /// Same-bay requests yield a single zero-length segment. Car classes that
    /// use L routes drive horizontally first, then vertically; everything
    /// else (including `None`) goes straight.
    pub fn get_path_between_bays(
        &mut self,
        from: &str,
        to: &str,
        car_type: Option<CarType>,
    ) -> Result<Vec<PathSegment>, SpatialError> {
        let key = (from.to_string(), to.to_string(), car_type);
        if let Some(path) = self.cache.get(&key) {
            return Ok(path.clone());
        }

        let start = self
            .bay_center(from)
            .ok_or_else(|| SpatialError::UnknownBay(from.to_string()))?;
        let end = self
            .bay_center(to)
            .ok_or_else(|| SpatialError::UnknownBay(to.to_string()))?;

        let path = if from == to {
            vec![self.segment(start, start)]
        } else if car_type.is_some_and(|c| c.uses_l_route()) {
            let corner = Point::new(end.x, start.y);
            let mut legs = Vec::with_capacity(2);
            if corner != start {
                legs.push(self.segment(start, corner));
            }
            if corner != end {
                legs.push(self.segment(corner, end));
            }
            legs
        } else {
            vec![self.segment(start, end)]
        };

        self.remember(key, path.clone());
        Ok(path)
    }

    fn segment(&self, from: Point, to: Point) -> PathSegment {
        let distance = from.distance(&to);
        PathSegment {
            from,
            to,
            distance,
            travel_time: distance / self.car_speed,
        }
    }

    fn remember(&mut self, key: PathKey, path: Vec<PathSegment>) {
        if self.cache.len() >= MAX_CACHED_PATHS {
            if let Some(oldest) = self.cache_order.pop_front() {
                self.cache.remove(&oldest);
            }
        }
        self.cache_order.push_back(key.clone());
        self.cache.insert(key, path);
    }
}

fn validate_speed(speed: f64) -> Result<(), SpatialError> {
    if speed > 0.0 && speed.is_finite() {
        Ok(())
    } else {
        Err(SpatialError::InvalidSpeed(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_distance;
    use proptest::prelude::*;

    fn two_bays() -> Vec<Bay> {
        vec![
            Bay::new("bay1", 100.0, 100.0, 200.0, 200.0).unwrap(),
            Bay::new("bay2", 300.0, 100.0, 200.0, 200.0).unwrap(),
            Bay::new("bay3", 300.0, 400.0, 200.0, 100.0).unwrap(),
        ]
    }

    fn planner() -> SpatialPlanner {
        SpatialPlanner::new(two_bays(), 150.0).unwrap()
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_bay_rejected() {
        let bays = vec![
            Bay::new("bay1", 0.0, 0.0, 10.0, 10.0).unwrap(),
            Bay::new("bay1", 20.0, 0.0, 10.0, 10.0).unwrap(),
        ];
        assert!(matches!(
            SpatialPlanner::new(bays, 150.0),
            Err(SpatialError::DuplicateBay(_))
        ));
    }

    #[test]
    fn non_positive_speed_rejected() {
        assert!(matches!(
            SpatialPlanner::new(two_bays(), 0.0),
            Err(SpatialError::InvalidSpeed(_))
        ));
        let mut p = planner();
        assert!(p.set_car_speed(-5.0).is_err());
        assert_eq!(p.car_speed(), 150.0);
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    #[test]
    fn same_bay_is_single_zero_segment() {
        let mut p = planner();
        let path = p.get_path_between_bays("bay1", "bay1", Some(CarType::Tapping)).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].distance, 0.0);
        assert_eq!(path[0].travel_time, 0.0);
    }

    #[test]
    fn l_route_goes_horizontal_then_vertical() {
        let mut p = planner();
        let path = p
            .get_path_between_bays("bay1", "bay3", Some(CarType::Treatment))
            .unwrap();
        assert_eq!(path.len(), 2);
        // bay1 center (200,200), bay3 center (400,450)
        assert_eq!(path[0].to, Point::new(400.0, 200.0));
        assert_eq!(path[0].distance, 200.0);
        assert_eq!(path[1].distance, 250.0);
        assert!((path[0].travel_time - 200.0 / 150.0).abs() < 1e-12);
    }

    #[test]
    fn l_route_on_same_row_has_one_leg() {
        let mut p = planner();
        let path = p
            .get_path_between_bays("bay1", "bay2", Some(CarType::Tapping))
            .unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].distance, 200.0);
    }

    #[test]
    fn rh_and_untyped_paths_are_straight() {
        let mut p = planner();
        let rh = p.get_path_between_bays("bay1", "bay3", Some(CarType::Rh)).unwrap();
        let none = p.get_path_between_bays("bay1", "bay3", None).unwrap();
        assert_eq!(rh.len(), 1);
        assert_eq!(none.len(), 1);
        let expected = (200.0f64 * 200.0 + 250.0 * 250.0).sqrt();
        assert!((rh[0].distance - expected).abs() < 1e-9);
    }

    #[test]
    fn unknown_bay_is_error() {
        let mut p = planner();
        assert!(matches!(
            p.get_path_between_bays("bay1", "nowhere", None),
            Err(SpatialError::UnknownBay(_))
        ));
        assert_eq!(p.cached_paths(), 0);
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    #[test]
    fn paths_are_memoized_per_car_type() {
        let mut p = planner();
        p.get_path_between_bays("bay1", "bay2", Some(CarType::Tapping)).unwrap();
        p.get_path_between_bays("bay1", "bay2", Some(CarType::Tapping)).unwrap();
        assert_eq!(p.cached_paths(), 1);
        p.get_path_between_bays("bay1", "bay2", Some(CarType::Rh)).unwrap();
        assert_eq!(p.cached_paths(), 2);
    }

    #[test]
    fn reconfigure_invalidates_cache() {
        let mut p = planner();
        p.get_path_between_bays("bay1", "bay2", None).unwrap();
        p.reconfigure(
            vec![
                Bay::new("bay1", 0.0, 0.0, 100.0, 100.0).unwrap(),
                Bay::new("bay2", 500.0, 0.0, 100.0, 100.0).unwrap(),
            ],
            100.0,
        )
        .unwrap();
        assert_eq!(p.cached_paths(), 0);
        let path = p.get_path_between_bays("bay1", "bay2", None).unwrap();
        assert_eq!(path[0].distance, 500.0);
        assert_eq!(path[0].travel_time, 5.0);
    }

    #[test]
    fn failed_reconfigure_keeps_layout() {
        let mut p = planner();
        let bad = vec![
            Bay::new("a", 0.0, 0.0, 1.0, 1.0).unwrap(),
            Bay::new("a", 0.0, 0.0, 1.0, 1.0).unwrap(),
        ];
        assert!(p.reconfigure(bad, 150.0).is_err());
        assert!(p.bay("bay1").is_some());
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    #[test]
    fn place_and_locate_equipment() {
        let mut p = planner();
        p.place_equipment("bay2", "bay2_LMF_1", "LMF", Point::new(350.0, 150.0))
            .unwrap();
        assert_eq!(p.get_unit_position("bay2_LMF_1"), Some(Point::new(350.0, 150.0)));
        assert_eq!(p.get_unit_position("missing"), None);
        assert!(matches!(
            p.place_equipment("bay2", "x", "LMF", Point::new(0.0, 0.0)),
            Err(SpatialError::OutOfBounds { .. })
        ));
        assert!(matches!(
            p.place_equipment("bay9", "x", "LMF", Point::new(0.0, 0.0)),
            Err(SpatialError::UnknownBay(_))
        ));
    }

    #[test]
    fn bay_at_position_prefers_first_by_name() {
        let p = planner();
        // x = 300 is on the shared edge of bay1 and bay2
        assert_eq!(p.get_bay_at_position(Point::new(300.0, 150.0)), Some("bay1"));
        assert_eq!(p.get_bay_at_position(Point::new(450.0, 150.0)), Some("bay2"));
        assert_eq!(p.get_bay_at_position(Point::new(0.0, 0.0)), None);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn arb_car_type() -> impl Strategy<Value = Option<CarType>> {
        prop_oneof![
            Just(None),
            Just(Some(CarType::Tapping)),
            Just(Some(CarType::Treatment)),
            Just(Some(CarType::Rh)),
        ]
    }

    fn arb_bay(name: &'static str) -> impl Strategy<Value = Bay> {
        (0.0f64..1000.0, 0.0f64..1000.0, 1.0f64..300.0, 1.0f64..300.0)
            .prop_map(move |(x, y, w, h)| Bay::new(name, x, y, w, h).unwrap())
    }

    proptest! {
        #[test]
        fn reverse_paths_have_equal_distance(
            a in arb_bay("a"),
            b in arb_bay("b"),
            car in arb_car_type(),
        ) {
            let mut p = SpatialPlanner::new(vec![a, b], 150.0).unwrap();
            let forward = path_distance(&p.get_path_between_bays("a", "b", car).unwrap());
            let back = path_distance(&p.get_path_between_bays("b", "a", car).unwrap());
            prop_assert!((forward - back).abs() < 1e-9);
        }
    }
}
