//! Pure move rules over [`GameState`].

use std::collections::{BTreeSet, HashSet};

use crate::protocol::{
    BoardItem, GameState, MediaCandidate, PersonId, PersonLink, PlayerId, RejectionReason,
};

/// Only the seated player at `players[len(media) % 2]` may move, and only
/// once both seats are taken.
pub fn check_turn(state: &GameState, player_id: &PlayerId) -> Result<(), RejectionReason> {
    if !state.is_full() {
        return Err(RejectionReason::WaitingForOpponent);
    }
    if state.player_to_move().as_ref() != Some(player_id) {
        return Err(RejectionReason::NotYourTurn);
    }
    Ok(())
}

pub fn check_unplayed(state: &GameState, key: &str) -> Result<(), RejectionReason> {
    if state.has_played(key) {
        return Err(RejectionReason::AlreadyPlayed);
    }
    Ok(())
}

/// People from `credits` who are in `pool`, first occurrence only, in credit order.
pub fn find_links(pool: &BTreeSet<PersonId>, credits: &[PersonLink]) -> Vec<PersonLink> {
    let mut seen = HashSet::new();
    credits
        .iter()
        .filter(|person| pool.contains(&person.id) && seen.insert(person.id))
        .cloned()
        .collect()
}

/// Record an accepted move: the pool becomes every person credited on the new
/// media and the move goes to the front of the board.
pub fn apply_move(
    state: &mut GameState,
    candidate: &MediaCandidate,
    links: Vec<PersonLink>,
    credits: &[PersonLink],
) {
    state.current_credit_pool = credits.iter().map(|person| person.id).collect();
    state.media.insert(
        0,
        BoardItem {
            key: candidate.key.clone(),
            label: candidate.label.clone(),
            links,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GameSeed, MediaType};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn person(id: PersonId) -> PersonLink {
        PersonLink {
            id,
            name: format!("Person {id}"),
        }
    }

    fn seeded_state(players: &[PlayerId]) -> GameState {
        let seed = GameSeed {
            key: "movie-27205".into(),
            label: "Inception (2010)".into(),
            credits: BTreeSet::from([10, 20, 30]),
        };
        let mut state = GameState::new(players[0], &seed);
        for player in &players[1..] {
            state.players.push(*player);
        }
        state
    }

    fn candidate(id: u64) -> MediaCandidate {
        MediaCandidate {
            key: MediaType::Movie.board_key(id),
            id,
            label: format!("Movie {id}"),
            media_type: MediaType::Movie,
        }
    }

    #[test]
    fn lone_player_waits_for_opponent() {
        let a = Uuid::new_v4();
        let state = seeded_state(&[a]);
        assert_eq!(
            check_turn(&state, &a),
            Err(RejectionReason::WaitingForOpponent)
        );
    }

    #[test]
    fn outsider_is_never_on_turn() {
        let state = seeded_state(&[Uuid::new_v4(), Uuid::new_v4()]);
        assert_eq!(
            check_turn(&state, &Uuid::new_v4()),
            Err(RejectionReason::NotYourTurn)
        );
    }

    #[test]
    fn seed_and_played_keys_are_duplicates() {
        let mut state = seeded_state(&[Uuid::new_v4(), Uuid::new_v4()]);
        assert_eq!(
            check_unplayed(&state, "movie-27205"),
            Err(RejectionReason::AlreadyPlayed)
        );
        apply_move(&mut state, &candidate(157336), vec![person(20)], &[person(20)]);
        assert_eq!(
            check_unplayed(&state, "movie-157336"),
            Err(RejectionReason::AlreadyPlayed)
        );
        assert_eq!(check_unplayed(&state, "tv-157336"), Ok(()));
    }

    #[test]
    fn links_keep_credit_order_without_repeats() {
        let pool = BTreeSet::from([1, 2, 3]);
        let credits = [person(3), person(9), person(1), person(3)];
        let ids: Vec<_> = find_links(&pool, &credits).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn interstellar_links_through_shared_cast() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut state = seeded_state(&[a, b]);
        let credits = [person(20), person(99), person(150)];

        let links = find_links(&state.current_credit_pool, &credits);
        assert_eq!(links, vec![person(20)]);

        let mut interstellar = candidate(157336);
        interstellar.label = "Interstellar (2014)".into();
        apply_move(&mut state, &interstellar, links, &credits);

        assert_eq!(state.current_credit_pool, BTreeSet::from([20, 99, 150]));
        assert_eq!(state.media.len(), 1);
        assert_eq!(state.media[0].key, "movie-157336");
        assert_eq!(state.player_to_move(), Some(b));
    }

    #[test]
    fn newest_move_is_first() {
        let mut state = seeded_state(&[Uuid::new_v4(), Uuid::new_v4()]);
        apply_move(&mut state, &candidate(1), vec![person(10)], &[person(10)]);
        apply_move(&mut state, &candidate(2), vec![person(10)], &[person(10)]);
        let keys: Vec<_> = state.media.iter().map(|item| item.key.as_str()).collect();
        assert_eq!(keys, vec!["movie-2", "movie-1"]);
    }

    proptest! {
        #[test]
        fn only_player_at_parity_may_move(moves in 0usize..40) {
            let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
            let mut state = seeded_state(&[a, b]);
            for id in 0..moves {
                apply_move(&mut state, &candidate(id as u64 + 1), vec![], &[]);
            }
            let expected = if moves % 2 == 0 { a } else { b };
            let other = if expected == a { b } else { a };
            prop_assert_eq!(check_turn(&state, &expected), Ok(()));
            prop_assert_eq!(check_turn(&state, &other), Err(RejectionReason::NotYourTurn));
        }

        #[test]
        fn links_are_exactly_the_unique_pool_members(
            pool in proptest::collection::btree_set(0u64..50, 0..20),
            credits in proptest::collection::vec(0u64..50, 0..40),
        ) {
            let people: Vec<_> = credits.iter().copied().map(person).collect();
            let links = find_links(&pool, &people);

            let ids: Vec<_> = links.iter().map(|p| p.id).collect();
            let unique: BTreeSet<_> = ids.iter().copied().collect();
            prop_assert_eq!(ids.len(), unique.len());
            prop_assert!(ids.iter().all(|id| pool.contains(id)));

            let shared: BTreeSet<_> = credits.iter().copied().filter(|id| pool.contains(id)).collect();
            prop_assert_eq!(unique, shared);
        }

        #[test]
        fn accepted_move_replaces_whole_pool(
            credits in proptest::collection::vec(0u64..50, 1..30),
        ) {
            let mut state = seeded_state(&[Uuid::new_v4(), Uuid::new_v4()]);
            let people: Vec<_> = credits.iter().copied().map(person).collect();
            let links = find_links(&state.current_credit_pool, &people);
            apply_move(&mut state, &candidate(777), links, &people);
            let expected: BTreeSet<_> = credits.into_iter().collect();
            prop_assert_eq!(&state.current_credit_pool, &expected);
        }
    }
}
