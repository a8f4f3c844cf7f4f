use armada::{Board, CellState, Coord, GameError, Orientation, Ship, ShipType, FLEET};

fn ship(id: &str, owner: &str, kind: ShipType, orientation: Orientation, at: Coord) -> Ship {
    Ship::new(id, kind, owner, orientation, at)
}

#[test]
fn test_neighbors_are_clipped_to_the_board() {
    assert_eq!(Coord::new(0, 0).neighbors(5).count(), 3);
    assert_eq!(Coord::new(0, 2).neighbors(5).count(), 5);
    assert_eq!(Coord::new(2, 2).neighbors(5).count(), 8);
    assert_eq!(Coord::new(4, 4).neighbors(5).count(), 3);
    assert!(Coord::new(2, 2).neighbors(5).all(|n| n.chebyshev(Coord::new(2, 2)) == 1));
}

#[test]
fn test_with_ships_rejects_bad_fleets() {
    let outside = ship("a-0", "a", FLEET[0], Orientation::Horizontal, Coord::new(5, 0));
    assert_eq!(
        Board::with_ships(5, vec![outside]).unwrap_err(),
        GameError::OutOfBounds(Coord::new(5, 0))
    );

    let twin = ship("a-0", "a", FLEET[0], Orientation::Horizontal, Coord::new(0, 0));
    let again = ship("a-0", "a", FLEET[1], Orientation::Horizontal, Coord::new(1, 1));
    assert!(matches!(
        Board::with_ships(5, vec![twin, again]),
        Err(GameError::InvalidSnapshot(_))
    ));
}

#[test]
fn test_cell_state_derivation() {
    let long = ShipType::new("Frigate", 2);
    let ships = vec![
        ship("a-0", "a", long, Orientation::Horizontal, Coord::new(0, 0)),
        ship("b-0", "b", FLEET[0], Orientation::Horizontal, Coord::new(3, 3)),
    ];
    let mut board = Board::with_ships(5, ships).unwrap();
    assert_eq!(board.state_at(Coord::new(0, 1)), Some(CellState::Ship));
    assert_eq!(board.state_at(Coord::new(2, 2)), Some(CellState::Empty));
    assert_eq!(board.state_at(Coord::new(5, 5)), None);

    let strike = board.strike(Coord::new(0, 0), "b", 0).unwrap();
    assert!(strike.hit);
    assert!(strike.ships_sunk.is_empty());
    assert_eq!(board.state_at(Coord::new(0, 0)), Some(CellState::Hit));
    assert_eq!(board.state_at(Coord::new(0, 1)), Some(CellState::Ship));

    board.strike(Coord::new(0, 1), "b", 1).unwrap();
    assert_eq!(board.state_at(Coord::new(0, 0)), Some(CellState::Sunk));
    assert_eq!(board.state_at(Coord::new(0, 1)), Some(CellState::Sunk));
    assert_eq!(board.remaining_ships("a"), 0);

    board.strike(Coord::new(1, 4), "a", 2).unwrap();
    assert_eq!(board.state_at(Coord::new(1, 4)), Some(CellState::Miss));
    assert_eq!(
        board.strike(Coord::new(1, 4), "a", 3).unwrap_err(),
        GameError::CellResolved(Coord::new(1, 4))
    );
    assert_eq!(
        board.strike(Coord::new(7, 0), "a", 3).unwrap_err(),
        GameError::OutOfBounds(Coord::new(7, 0))
    );
}

#[test]
fn test_shared_cell_hits_every_occupant() {
    let ships = vec![
        ship("a-0", "a", FLEET[0], Orientation::Horizontal, Coord::new(2, 2)),
        ship("b-0", "b", FLEET[0], Orientation::Horizontal, Coord::new(2, 2)),
    ];
    let mut board = Board::with_ships(5, ships).unwrap();
    let strike = board.strike(Coord::new(2, 2), "c", 0).unwrap();
    assert_eq!(strike.ships_sunk, vec!["a-0".to_string(), "b-0".to_string()]);
    assert_eq!(strike.affected_players, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn test_splash_reports_each_enemy_ship_once() {
    let long = ShipType::new("Frigate", 2);
    let ships = vec![ship("b-0", "b", long, Orientation::Vertical, Coord::new(1, 3))];
    let mut board = Board::with_ships(5, ships).unwrap();
    let strike = board.strike(Coord::new(2, 2), "a", 4).unwrap();
    assert!(!strike.hit);
    assert_eq!(strike.splash_cells, vec![Coord::new(1, 3), Coord::new(2, 3)]);
    assert_eq!(strike.splash_ships.len(), 1);
    let splashes = board.cell(Coord::new(2, 2)).unwrap().splashes();
    assert_eq!(splashes[0].turn, 4);
    assert_eq!(splashes[0].attack_coord, Coord::new(2, 2));
}

#[test]
fn test_relocate_keeps_shape_and_hits() {
    let long = ShipType::new("Frigate", 2);
    let ships = vec![ship("a-0", "a", long, Orientation::Horizontal, Coord::new(0, 0))];
    let mut board = Board::with_ships(5, ships).unwrap();
    board.strike(Coord::new(0, 0), "b", 0).unwrap();

    let from = board.relocate("a-0", Coord::new(3, 0)).unwrap();
    assert_eq!(from, Coord::new(0, 0));
    let moved = board.ship("a-0").unwrap();
    assert_eq!(moved.coordinates, vec![Coord::new(3, 0), Coord::new(3, 1)]);
    assert!(moved.hits.is_empty());
    assert_eq!(board.state_at(Coord::new(0, 0)), Some(CellState::Empty));
    assert!(board.cell(Coord::new(3, 1)).unwrap().has_ship_of("a"));

    assert_eq!(
        board.relocate("a-0", Coord::new(3, 4)).unwrap_err(),
        GameError::OutOfBounds(Coord::new(3, 4))
    );
    assert!(matches!(
        board.relocate("nope", Coord::new(1, 1)),
        Err(GameError::UnknownShip(_))
    ));
}

#[test]
fn test_snapshot_matches_board() {
    let ships = vec![ship("a-0", "a", FLEET[0], Orientation::Horizontal, Coord::new(1, 2))];
    let mut board = Board::with_ships(4, ships).unwrap();
    board.strike(Coord::new(0, 0), "b", 0).unwrap();
    let snapshot = board.snapshot();
    assert_eq!(snapshot.size, 4);
    assert_eq!(snapshot.cells.len(), 4);
    assert!(snapshot.cells.iter().all(|row| row.len() == 4));
    assert_eq!(snapshot.cells[1][2].state, CellState::Ship);
    assert_eq!(snapshot.cells[1][2].ships[0].id, "a-0");
    assert_eq!(snapshot.cells[0][0].state, CellState::Miss);
}

#[test]
fn test_wreck_does_not_shield_a_ship_afloat() {
    let ships = vec![
        ship("a-0", "a", FLEET[0], Orientation::Horizontal, Coord::new(1, 1)),
        ship("b-0", "b", FLEET[0], Orientation::Horizontal, Coord::new(1, 3)),
    ];
    let mut board = Board::with_ships(5, ships).unwrap();
    board.strike(Coord::new(1, 1), "b", 0).unwrap();
    assert_eq!(board.state_at(Coord::new(1, 1)), Some(CellState::Sunk));
    assert!(!board.has_afloat_ship_of(Coord::new(1, 1), "a"));

    board.relocate("b-0", Coord::new(1, 1)).unwrap();
    assert_eq!(board.state_at(Coord::new(1, 1)), Some(CellState::Ship));
    assert!(board.has_afloat_ship_of(Coord::new(1, 1), "b"));

    let strike = board.strike(Coord::new(1, 1), "a", 1).unwrap();
    assert_eq!(strike.ships_hit, vec!["b-0".to_string()]);
    assert_eq!(strike.affected_players, vec!["b".to_string()]);
    assert_eq!(board.state_at(Coord::new(1, 1)), Some(CellState::Sunk));
    assert_eq!(
        board.strike(Coord::new(1, 1), "a", 2).unwrap_err(),
        GameError::CellResolved(Coord::new(1, 1))
    );
}
