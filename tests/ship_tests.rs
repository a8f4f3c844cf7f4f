use armada::{random_fleet, Coord, Orientation, Ship, ShipType, FLEET};
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[test]
fn test_ship_ids_are_stable() {
    assert_eq!(Ship::make_id("p1", FLEET[2], 2), "p1-Cruiser-2");
}

#[test]
fn test_ship_cells_follow_orientation() {
    let kind = ShipType::new("Destroyer", 3);
    let h = Ship::new("h", kind, "p", Orientation::Horizontal, Coord::new(1, 1));
    let v = Ship::new("v", kind, "p", Orientation::Vertical, Coord::new(1, 1));
    assert_eq!(
        h.coordinates,
        vec![Coord::new(1, 1), Coord::new(1, 2), Coord::new(1, 3)]
    );
    assert_eq!(
        v.coordinates,
        vec![Coord::new(1, 1), Coord::new(2, 1), Coord::new(3, 1)]
    );
    assert_eq!(h.position(), Some(Coord::new(1, 1)));
}

#[test]
fn test_hits_and_sinking() {
    let kind = ShipType::new("Frigate", 2);
    let mut ship = Ship::new("f", kind, "p", Orientation::Horizontal, Coord::new(0, 0));
    assert!(!ship.record_hit(Coord::new(4, 4)));
    assert!(ship.record_hit(Coord::new(0, 0)));
    assert!(ship.record_hit(Coord::new(0, 0)));
    assert_eq!(ship.hits.len(), 1);
    assert!(!ship.is_sunk());
    assert!(ship.record_hit(Coord::new(0, 1)));
    assert!(ship.is_sunk());
}

#[test]
fn test_ship_serializes_with_type_field() {
    let ship = Ship::new("p-Carrier-0", FLEET[0], "p", Orientation::Vertical, Coord::new(2, 3));
    let value = serde_json::to_value(&ship).unwrap();
    assert_eq!(value["type"], "Carrier");
    assert_eq!(value["orientation"], "vertical");
    assert_eq!(value["coordinates"][0]["x"], 2);
    assert_eq!(value["coordinates"][0]["y"], 3);
}

#[test]
fn test_random_fleet_places_every_ship() {
    let mut rng = SmallRng::seed_from_u64(42);
    for size in [5, 7, 10, 12] {
        let fleet = random_fleet(&mut rng, size, "p", &FLEET, 1000);
        assert_eq!(fleet.len(), FLEET.len());
        let mut cells: Vec<Coord> = fleet.iter().flat_map(|s| s.coordinates.clone()).collect();
        assert!(cells.iter().all(|c| c.x < size && c.y < size));
        let total = cells.len();
        cells.sort_by_key(|c| (c.x, c.y));
        cells.dedup();
        assert_eq!(cells.len(), total);
    }
}

#[test]
fn test_random_fleet_drops_ships_that_do_not_fit() {
    let mut rng = SmallRng::seed_from_u64(7);
    assert!(random_fleet(&mut rng, 0, "p", &FLEET, 100).is_empty());
    let cramped = random_fleet(&mut rng, 1, "p", &FLEET, 100);
    assert_eq!(cramped.len(), 1);
    assert_eq!(cramped[0].coordinates, vec![Coord::new(0, 0)]);
}

#[test]
fn test_random_fleet_is_seeded() {
    let a = random_fleet(&mut SmallRng::seed_from_u64(5), 10, "p", &FLEET, 1000);
    let b = random_fleet(&mut SmallRng::seed_from_u64(5), 10, "p", &FLEET, 1000);
    assert_eq!(a, b);
}
