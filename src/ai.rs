// Randomized automated commander used by the simulator and tests.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::board::Coord;
use crate::game::GameEngine;
use crate::player::{Commander, Plan};
use crate::ship::Ship;

/// Chance that a turn is spent attacking rather than moving.
const ATTACK_BIAS: f64 = 0.7;

/// Commander that plays legal but otherwise random turns.
///
/// Attacks prefer cells next to a splash the commander's own misses have
/// revealed, then fall back to any open cell in the ship's range that is not
/// under one of its own ships.
#[derive(Debug, Default, Clone)]
pub struct AiCommander {
    leads: Vec<Coord>,
}

impl AiCommander {
    pub fn new() -> Self {
        Self::default()
    }

    fn attack_target(
        &mut self,
        rng: &mut SmallRng,
        engine: &GameEngine,
        ship: &Ship,
    ) -> Option<Coord> {
        let me = engine.local_id();
        let board = engine.board();
        let origin = ship.position()?;
        let legal = |c: &Coord| {
            engine.is_attackable(*c) && !board.has_afloat_ship_of(*c, me)
        };

        // Leads out of this ship's reach stay around for a later turn.
        self.leads.retain(|c| legal(c));
        let reachable: Vec<usize> = (0..self.leads.len())
            .filter(|&i| engine.in_attack_range(origin, self.leads[i]))
            .collect();
        if !reachable.is_empty() {
            let idx = reachable[rng.random_range(0..reachable.len())];
            return Some(self.leads.swap_remove(idx));
        }

        let candidates: Vec<Coord> = (0..board.size())
            .flat_map(|x| (0..board.size()).map(move |y| Coord::new(x, y)))
            .filter(|c| legal(c) && engine.in_attack_range(origin, *c))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.random_range(0..candidates.len())])
    }

    fn move_target(rng: &mut SmallRng, engine: &GameEngine, ship: &Ship) -> Option<Coord> {
        let from = ship.position()?;
        let size = engine.board().size();
        let candidates: Vec<Coord> = (0..size)
            .map(|x| Coord::new(x, from.y))
            .chain((0..size).map(|y| Coord::new(from.x, y)))
            .filter(|to| engine.check_move(engine.local_id(), &ship.id, *to).is_ok())
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.random_range(0..candidates.len())])
    }
}

impl Commander for AiCommander {
    fn plan(&mut self, rng: &mut SmallRng, engine: &GameEngine) -> Option<Plan> {
        if let Some(last) = engine
            .history()
            .iter()
            .rev()
            .find_map(|a| match a {
                crate::action::Action::Attack(r) if r.attacker == engine.local_id() => Some(r),
                _ => None,
            })
        {
            for c in &last.splash_cells {
                if !self.leads.contains(c) {
                    self.leads.push(*c);
                }
            }
        }

        let ships: Vec<&Ship> = engine
            .board()
            .ships_of(engine.local_id())
            .filter(|s| !s.is_sunk())
            .collect();
        if ships.is_empty() {
            return None;
        }
        let ship = ships[rng.random_range(0..ships.len())];

        if rng.random_bool(ATTACK_BIAS) {
            if let Some(target) = self.attack_target(rng, engine, ship) {
                return Some(Plan::Attack {
                    ship: ship.id.clone(),
                    target,
                });
            }
        }
        if let Some(to) = Self::move_target(rng, engine, ship) {
            return Some(Plan::Move {
                ship: ship.id.clone(),
                to,
            });
        }
        self.attack_target(rng, engine, ship).map(|target| Plan::Attack {
            ship: ship.id.clone(),
            target,
        })
    }

    fn game_started(&mut self, _engine: &GameEngine) {
        self.leads.clear();
    }
}
