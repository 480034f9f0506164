//! Integration tests for the Hoplite engine.
//!
//! These tests drive whole turns through the engine: cascades, undo/redo,
//! replay of exported histories, and level generation.

use hoplite_core::*;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Spawn `pieces` in one turn and apply it
fn spawn(engine: &mut Engine, pieces: &[(EntityRecord, HexCoord)]) -> Vec<EntityId> {
    let mut actions = Vec::new();
    let mut ids = Vec::new();
    for (record, cell) in pieces {
        let entity = engine.factory_mut().build(record.clone()).unwrap();
        ids.push(entity.id());
        actions.push(Action::spawn(entity, *cell));
    }
    engine.queue_turn(Turn::new(actions).unwrap());
    engine.fast_forward();
    ids
}

/// Full observable state: every occupant with its attributes, plus turn order
fn fingerprint(board: &Board) -> String {
    format!("{:?}", board)
}

/// Record turns until the game ends, the hero always waiting in place
fn play_out(engine: &mut Engine, max_turns: usize) {
    for _ in 0..max_turns {
        match engine.status() {
            EngineStatus::AwaitingInput { entity } => {
                let cell = engine.board().find(entity).unwrap();
                engine.supply_input(Action::null(entity, cell));
            }
            EngineStatus::Ready { .. } => engine.record().unwrap(),
            EngineStatus::Replaying => engine.fast_forward(),
            EngineStatus::Finished { .. } | EngineStatus::Empty => return,
        }
    }
}

fn hero_at(engine: &Engine) -> Option<(HexCoord, &Entity)> {
    engine
        .board()
        .occupants()
        .find(|(_, entity)| entity.kind() == EntityKind::Hero)
}

// ==================== Scenarios ====================

#[test]
fn test_stab_kills_and_removes_in_same_turn() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (
                EntityRecord::of(EntityKind::Footman)
                    .with_team("red")
                    .with_abilities(&[Ability::Stab, Ability::Move]),
                HexCoord::new(3, 0),
            ),
            (
                EntityRecord::of(EntityKind::Footman).with_health(1),
                HexCoord::new(4, 0),
            ),
        ],
    );

    let (origin, attacker) = engine.board().locate(ids[0]).unwrap();
    let decided = attacker
        .decide(origin, engine.board(), &mut None)
        .unwrap();
    assert_eq!(
        decided,
        vec![Action::new(ActionKind::Stab, ids[0], HexCoord::new(4, 0))]
    );

    engine.record().unwrap();
    let turn = engine.past().last().unwrap();
    assert_eq!(
        turn.actions(),
        &[
            Action::new(ActionKind::Stab, ids[0], HexCoord::new(4, 0)),
            Action::new(ActionKind::Die, ids[1], HexCoord::new(4, 0)),
        ]
    );
    assert!(engine.board().find(ids[1]).is_none());
    assert_eq!(
        engine.board().turn_order().iter().copied().collect::<Vec<_>>(),
        vec![ids[0]]
    );
    assert_eq!(engine.winner(), Some(Team::new("red")));
}

#[test]
fn test_slash_resolves_before_earlier_queued_actions() {
    let mut engine = Engine::new();
    // An active cooldown makes the engine queue a Recharge behind the move
    let hero: EntityRecord =
        serde_json::from_value(json!({"type": "Hero", "cooldowns": {"ThrowBomb": 1}})).unwrap();
    let ids = spawn(
        &mut engine,
        &[
            (hero, HexCoord::new(2, 0)),
            (
                EntityRecord::of(EntityKind::Footman).with_health(1),
                HexCoord::new(1, 1),
            ),
        ],
    );

    engine.supply_input(Action::new(ActionKind::Move, ids[0], HexCoord::new(2, 1)));
    engine.record().unwrap();

    let turn = engine.past().last().unwrap();
    assert_eq!(
        turn.actions(),
        &[
            Action::new(ActionKind::Move, ids[0], HexCoord::new(2, 1)),
            Action::new(ActionKind::Slash, ids[0], HexCoord::new(1, 1)),
            Action::new(ActionKind::Die, ids[1], HexCoord::new(1, 1)),
            Action::recharge(ids[0], HexCoord::new(2, 0)),
        ]
    );
    let slashes = turn
        .iter()
        .filter(|a| a.kind() == ActionKind::Slash)
        .count();
    assert_eq!(slashes, 1);
}

#[test]
fn test_lunge_after_straight_move() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(2, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(2, 2)),
        ],
    );

    engine.supply_input(Action::new(ActionKind::Move, ids[0], HexCoord::new(2, 1)));
    engine.record().unwrap();

    let kinds: Vec<ActionKind> = engine.past().last().unwrap().iter().map(Action::kind).collect();
    assert_eq!(
        kinds,
        vec![ActionKind::Move, ActionKind::Lunge, ActionKind::Die]
    );
    assert!(engine.is_finished());
}

#[test]
fn test_shot_blocked_by_ally_fails_validation() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Archer), HexCoord::new(0, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(0, 1)),
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(0, 3)),
        ],
    );

    let shot = Action::new(ActionKind::Shoot, ids[0], HexCoord::new(0, 3));
    assert!(!shot.validate(engine.board()));

    // Left to itself the archer does not shoot through its ally
    engine.record().unwrap();
    assert_ne!(
        engine.past().last().unwrap().root().kind(),
        ActionKind::Shoot
    );
}

#[test]
fn test_archer_shoots_clear_line() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Archer), HexCoord::new(0, 0)),
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(0, 3)),
        ],
    );

    engine.record().unwrap();
    assert_eq!(
        engine.past().last().unwrap().actions(),
        &[Action::new(ActionKind::Shoot, ids[0], HexCoord::new(0, 3))]
    );
    assert_eq!(engine.board().get(HexCoord::new(0, 3)).unwrap().health(), Some(2));
}

#[test]
fn test_path_to_cells_around_a_corner() {
    let board = Board::new();
    let goals: BTreeSet<HexCoord> = HexCoord::new(5, 5).neighbors().into_iter().collect();
    let path = find_path(&board, HexCoord::new(0, 0), &goals).unwrap();
    assert_eq!(
        path.len() as u32,
        HexCoord::new(0, 0).distance_to(&HexCoord::new(5, 5)) - 1
    );
    assert!(goals.contains(path.last().unwrap()));

    let mut engine = Engine::new();
    let blockers: Vec<(EntityRecord, HexCoord)> = goals
        .iter()
        .map(|cell| (EntityRecord::of(EntityKind::Footman), *cell))
        .collect();
    spawn(&mut engine, &blockers);
    assert_eq!(
        find_path(engine.board(), HexCoord::new(0, 0), &goals),
        Err(PathError::NoPathExists)
    );
}

// ==================== Area attacks ====================

#[test]
fn test_bomb_throw_hits_and_rolls_back() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Bomber), HexCoord::new(2, 0)),
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(5, 0)),
        ],
    );
    let before = fingerprint(engine.board());

    engine.record().unwrap();
    let turn = engine.past().last().unwrap();
    assert!(turn.iter().all(|a| a.kind() == ActionKind::ThrowBomb));
    assert_eq!(turn.len(), 7);
    assert_eq!(engine.board().get(HexCoord::new(5, 0)).unwrap().health(), Some(2));
    let (_, bomber) = engine.board().locate(ids[0]).unwrap();
    assert_eq!(bomber.cooldowns().remaining(Ability::ThrowBomb), 1);

    engine.step_backward();
    assert_eq!(fingerprint(engine.board()), before);
}

#[test]
fn test_bomb_explodes_and_is_restored_in_place() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Bomb), HexCoord::new(5, 0)),
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(6, 0)),
        ],
    );
    let before = fingerprint(engine.board());

    engine.record().unwrap();
    let turn = engine.past().last().unwrap();
    assert_eq!(turn.root().kind(), ActionKind::Die);
    assert!(engine.board().find(ids[0]).is_none());
    assert_eq!(engine.board().get(HexCoord::new(6, 0)).unwrap().health(), Some(2));
    assert_eq!(engine.winner(), Some(Team::new("red")));

    engine.step_backward();
    assert_eq!(fingerprint(engine.board()), before);
    assert_eq!(engine.board().head(), Some(ids[0]));
}

#[test]
fn test_bash_off_the_board_restores_queue_index() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(10, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(11, 0)),
            (EntityRecord::of(EntityKind::Archer), HexCoord::new(2, 0)),
        ],
    );
    let before = fingerprint(engine.board());

    engine.supply_input(Action::new(ActionKind::Bash, ids[0], HexCoord::new(11, 0)));
    engine.record().unwrap();
    assert!(engine.board().find(ids[1]).is_none());
    assert_eq!(
        engine.board().turn_order().iter().copied().collect::<Vec<_>>(),
        vec![ids[2], ids[0]]
    );

    engine.step_backward();
    assert_eq!(fingerprint(engine.board()), before);
}

#[test]
fn test_bash_into_occupied_cell_drops_occupant() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(5, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(6, 0)),
            (EntityRecord::of(EntityKind::Archer), HexCoord::new(7, 0)),
        ],
    );
    let before = fingerprint(engine.board());

    engine.supply_input(Action::new(ActionKind::Bash, ids[0], HexCoord::new(6, 0)));
    engine.record().unwrap();
    assert!(engine.board().find(ids[1]).is_none());
    assert_eq!(engine.board().find(ids[2]), Some(HexCoord::new(7, 0)));
    assert_eq!(
        engine.board().turn_order().iter().copied().collect::<Vec<_>>(),
        vec![ids[2], ids[0]]
    );

    engine.step_backward();
    assert_eq!(fingerprint(engine.board()), before);
    assert_eq!(
        engine.board().turn_order().iter().copied().collect::<Vec<_>>(),
        ids
    );
}

// ==================== History ====================

#[test]
fn test_every_turn_round_trips() {
    let mut engine = Engine::new();
    let mut rng = StdRng::seed_from_u64(3);
    engine
        .populate_level(&LevelConfig::default(), 2, &mut rng)
        .unwrap();
    play_out(&mut engine, 200);
    assert!(engine.is_finished());

    let total = engine.past().len();
    let mut prints = vec![fingerprint(engine.board())];
    for _ in 0..total {
        assert!(engine.step_backward());
        let here = fingerprint(engine.board());
        assert!(engine.step_forward());
        assert_eq!(&fingerprint(engine.board()), prints.last().unwrap());
        assert!(engine.step_backward());
        prints.push(here);
    }
    assert!(engine.board().is_empty());
    assert!(!engine.step_backward());

    // Replaying forward passes through the same states in reverse order
    for expected in prints.iter().rev().skip(1) {
        assert!(engine.step_forward());
        assert_eq!(&fingerprint(engine.board()), expected);
    }
    assert!(!engine.step_forward());
}

#[test]
fn test_rewind_and_fast_forward() {
    let mut engine = Engine::new();
    let mut rng = StdRng::seed_from_u64(8);
    engine
        .populate_level(&LevelConfig::default(), 1, &mut rng)
        .unwrap();
    play_out(&mut engine, 40);
    let end = fingerprint(engine.board());
    let turns = engine.past().len();

    engine.rewind();
    assert!(engine.past().is_empty());
    assert_eq!(engine.future().len(), turns);
    assert!(engine.board().turn_order().is_empty());

    engine.fast_forward();
    assert_eq!(fingerprint(engine.board()), end);
}

#[test]
fn test_replay_is_deterministic() {
    type Trace = Rc<RefCell<Vec<(String, String)>>>;
    fn traced(engine: &mut Engine) -> Trace {
        let trace: Trace = Rc::default();
        let sink = Rc::clone(&trace);
        engine.subscribe(move |board: &Board, action: &Action| {
            sink.borrow_mut()
                .push((format!("{:?}", board), action.to_string()));
        });
        trace
    }

    let mut original = Engine::new();
    let live = traced(&mut original);
    let mut rng = StdRng::seed_from_u64(21);
    original
        .populate_level(&LevelConfig::default(), 3, &mut rng)
        .unwrap();
    play_out(&mut original, 300);

    let json = history_to_json(original.past()).unwrap();
    let records: Vec<TurnRecord> = serde_json::from_str(&json).unwrap();

    let replay = |records: &[TurnRecord]| {
        let mut engine = Engine::new();
        let trace = traced(&mut engine);
        engine.load_history(records).unwrap();
        engine.fast_forward();
        let end = fingerprint(engine.board());
        let emitted = trace.borrow().clone();
        (emitted, end)
    };

    let (first, first_end) = replay(&records);
    let (second, second_end) = replay(&records);
    assert_eq!(first, second);
    assert_eq!(first_end, second_end);
    assert_eq!(first, *live.borrow());
    assert_eq!(first_end, fingerprint(original.board()));
}

#[test]
fn test_export_matches_loaded_history() {
    let json = r#"[
        [{"type": "Spawn", "element": {"type": "Hero"}, "target": [5, 0]},
         {"type": "Spawn", "element": {"type": "Footman"}, "target": [7, 0]}],
        [{"type": "Move", "element": "Hero-0", "target": [6, 0]},
         {"type": "Lunge", "element": "Hero-0", "target": [7, 0]},
         {"type": "Die", "element": "Footman-0", "target": [7, 0]}]
    ]"#;
    let records: Vec<TurnRecord> = serde_json::from_str(json).unwrap();

    let mut engine = Engine::new();
    engine.load_history(&records).unwrap();
    engine.fast_forward();
    assert_eq!(engine.winner(), Some(Team::new("red")));

    let exported = engine.export().unwrap();
    assert_eq!(exported.len(), 2);
    assert_eq!(exported[1], records[1]);

    // Ids carried by the spawns are reserved in the engine's factory
    assert_eq!(
        engine.factory_mut().create(EntityKind::Footman).unwrap().id(),
        EntityId::new(EntityKind::Footman, 1)
    );
}

#[test]
fn test_bad_record_loads_nothing() {
    let records: Vec<TurnRecord> = serde_json::from_value(json!([
        [{"type": "Spawn", "element": {"type": "Hero"}, "target": [5, 0]}],
        [{"type": "Teleport", "element": "Hero-0", "target": [6, 0]}]
    ]))
    .unwrap();

    let mut engine = Engine::new();
    assert_eq!(
        engine.load_history(&records),
        Err(RecordError::UnknownActionType("Teleport".to_string()))
    );
    assert!(engine.future().is_empty());
    assert_eq!(engine.status(), EngineStatus::Empty);
}

#[test]
fn test_spawn_off_the_board_is_rejected() {
    let records: Vec<TurnRecord> = serde_json::from_value(json!([
        [{"type": "Spawn", "element": {"type": "Hero"}, "target": [50, 50]}]
    ]))
    .unwrap();

    let mut engine = Engine::new();
    assert_eq!(
        engine.load_history(&records),
        Err(RecordError::InvalidTarget {
            kind: ActionKind::Spawn,
            target: HexCoord::new(50, 50)
        })
    );
    assert!(engine.future().is_empty());
}

#[test]
fn test_spawn_onto_occupied_cell_is_rejected() {
    let records: Vec<TurnRecord> = serde_json::from_value(json!([
        [{"type": "Spawn", "element": {"type": "Footman"}, "target": [3, 0]},
         {"type": "Spawn", "element": {"type": "Archer"}, "target": [3, 0]}]
    ]))
    .unwrap();

    let mut engine = Engine::new();
    assert_eq!(
        engine.load_history(&records),
        Err(RecordError::CellOccupied(HexCoord::new(3, 0)))
    );
    assert!(engine.future().is_empty());

    // A failed load reserves no ids
    let mut factory = engine.factory().clone();
    assert_eq!(
        factory.create(EntityKind::Footman).unwrap().id(),
        EntityId::new(EntityKind::Footman, 0)
    );

    // Cells filled by turns still waiting in the future count as occupied
    let first: Vec<TurnRecord> = serde_json::from_value(json!([
        [{"type": "Spawn", "element": {"type": "Footman"}, "target": [3, 0]}]
    ]))
    .unwrap();
    engine.load_history(&first).unwrap();
    let second: Vec<TurnRecord> = serde_json::from_value(json!([
        [{"type": "Spawn", "element": {"type": "Archer"}, "target": [3, 0]}]
    ]))
    .unwrap();
    assert_eq!(
        engine.load_history(&second),
        Err(RecordError::CellOccupied(HexCoord::new(3, 0)))
    );
    assert_eq!(engine.future().len(), 1);
}

#[test]
fn test_spawned_id_is_never_reused() {
    let first: Vec<TurnRecord> = serde_json::from_value(json!([
        [{"type": "Spawn", "element": {"type": "Hero"}, "target": [5, 0]},
         {"type": "Spawn", "element": {"type": "Footman", "id": "Footman-0"}, "target": [3, 0]}]
    ]))
    .unwrap();
    let again: Vec<TurnRecord> = serde_json::from_value(json!([
        [{"type": "Spawn", "element": {"type": "Footman", "id": "Footman-0"}, "target": [4, 0]}]
    ]))
    .unwrap();

    let mut engine = Engine::new();
    engine.load_history(&first).unwrap();
    engine.fast_forward();
    assert_eq!(
        engine.load_history(&again),
        Err(RecordError::DuplicateId(EntityId::new(EntityKind::Footman, 0)))
    );
    assert_eq!(engine.board().entity_count(), 2);
    assert_eq!(engine.board().turn_order().len(), 2);
    assert_eq!(engine.export().unwrap()[0].len(), 2);
}

// ==================== Input handling ====================

#[test]
fn test_rejected_input_never_mutates() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(5, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(1, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(5, 1)),
        ],
    );
    let before = fingerprint(engine.board());

    let illegal = [
        Action::new(ActionKind::Move, ids[0], HexCoord::new(5, 1)),
        Action::new(ActionKind::Jump, ids[0], HexCoord::new(6, 0)),
        Action::new(ActionKind::Stab, ids[0], HexCoord::new(1, 0)),
        Action::new(ActionKind::Shoot, ids[0], HexCoord::new(5, 3)),
        Action::new(ActionKind::Move, ids[0], HexCoord::new(-1, 0)),
    ];
    for action in illegal {
        engine.supply_input(action.clone());
        let err = engine.record().unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidMove {
                entity: ids[0],
                action: Box::new(action)
            }
        );
        assert_eq!(fingerprint(engine.board()), before);
        assert_eq!(engine.past().len(), 1);
    }
}

#[test]
fn test_reaction_kinds_cannot_start_a_turn() {
    let mut engine = Engine::new();
    let hero: EntityRecord =
        serde_json::from_value(json!({"type": "Hero", "cooldowns": {"ThrowBomb": 1}})).unwrap();
    let ids = spawn(
        &mut engine,
        &[
            (hero, HexCoord::new(2, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(3, 0)),
        ],
    );
    let before = fingerprint(engine.board());

    for action in [
        Action::new(ActionKind::Slash, ids[0], HexCoord::new(3, 0)),
        Action::new(ActionKind::Lunge, ids[0], HexCoord::new(3, 0)),
        Action::recharge(ids[0], HexCoord::new(2, 0)),
    ] {
        engine.supply_input(action.clone());
        assert_eq!(
            engine.record(),
            Err(EngineError::InvalidMove {
                entity: ids[0],
                action: Box::new(action)
            })
        );
        assert_eq!(fingerprint(engine.board()), before);
    }
    assert_eq!(engine.past().len(), 1);
}

#[test]
fn test_suspension_is_retryable() {
    let mut engine = Engine::new();
    let ids = spawn(
        &mut engine,
        &[
            (EntityRecord::of(EntityKind::Hero), HexCoord::new(5, 0)),
            (EntityRecord::of(EntityKind::Footman), HexCoord::new(1, 0)),
        ],
    );
    let before = fingerprint(engine.board());

    for _ in 0..3 {
        let err = engine.record().unwrap_err();
        assert!(err.is_suspension());
        assert_eq!(err, EngineError::RequiresInput { entity: ids[0] });
        assert_eq!(fingerprint(engine.board()), before);
    }

    engine.supply_input(Action::new(ActionKind::Jump, ids[0], HexCoord::new(3, 0)));
    engine.record().unwrap();
    assert_eq!(engine.board().find(ids[0]), Some(HexCoord::new(3, 0)));
    assert_eq!(engine.status(), EngineStatus::Ready { next: ids[1] });
}

// ==================== Levels ====================

#[test]
fn test_seeded_levels_reproduce() {
    let build = |seed: u64| {
        let mut engine = Engine::new();
        let mut rng = StdRng::seed_from_u64(seed);
        engine
            .populate_level(&LevelConfig::default(), 4, &mut rng)
            .unwrap();
        engine.fast_forward();
        engine.export().unwrap()
    };
    assert_eq!(build(99), build(99));

    let opening = build(99);
    assert_eq!(opening.len(), 1);
    assert_eq!(opening[0].len(), 7);
    assert_eq!(opening[0][0].target, [5, 0]);
}

#[test]
fn test_level_populates_only_once() {
    let mut engine = Engine::new();
    let mut rng = StdRng::seed_from_u64(99);
    engine
        .populate_level(&LevelConfig::default(), 4, &mut rng)
        .unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    assert_eq!(
        engine.populate_level(&LevelConfig::default(), 4, &mut rng),
        Err(LevelError::PendingTurns(1))
    );

    engine.fast_forward();
    let mut rng = StdRng::seed_from_u64(99);
    assert_eq!(
        engine.populate_level(&LevelConfig::default(), 4, &mut rng),
        Err(LevelError::StartOccupied(DEFAULT_HERO_START))
    );
    assert_eq!(engine.board().entity_count(), 7);
    assert_eq!(engine.past().iter().map(Turn::len).sum::<usize>(), 7);
}

#[test]
fn test_populated_level_starts_with_hero() {
    let mut engine = Engine::new();
    let mut rng = StdRng::seed_from_u64(5);
    engine
        .populate_level(&LevelConfig::default(), 1, &mut rng)
        .unwrap();
    assert_eq!(engine.status(), EngineStatus::Replaying);
    engine.fast_forward();

    let (cell, hero) = hero_at(&engine).unwrap();
    assert_eq!(cell, DEFAULT_HERO_START);
    assert_eq!(engine.board().head(), Some(hero.id()));
    assert_eq!(engine.board().entity_count(), 3);
    assert_eq!(
        engine.status(),
        EngineStatus::AwaitingInput { entity: hero.id() }
    );
}
