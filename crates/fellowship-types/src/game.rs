//! Verse matching game: children pair each scripture reference with its
//! verse text.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAIRS: usize = 6;
pub const MIN_PAIRS: usize = 2;
pub const MAX_PAIRS: usize = 12;

/// A verse available to the game.
#[derive(Debug, Clone)]
pub struct Verse {
    pub id: Uuid,
    pub reference: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseCard {
    pub id: Uuid,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerseGameRound {
    pub references: Vec<VerseCard>,
    pub texts: Vec<VerseCard>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerseMatch {
    pub reference_id: Uuid,
    pub text_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckVerseGameRequest {
    pub matches: Vec<VerseMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseGameResult {
    pub correct: usize,
    pub total: usize,
    pub perfect: bool,
}

/// Picks up to `pairs` verses and lays them out as two independently
/// shuffled columns. Returns `None` when fewer than [`MIN_PAIRS`] verses
/// exist.
pub fn deal<R: Rng + ?Sized>(verses: &[Verse], pairs: usize, rng: &mut R) -> Option<VerseGameRound> {
    if verses.len() < MIN_PAIRS {
        return None;
    }
    let pairs = pairs.clamp(MIN_PAIRS, MAX_PAIRS).min(verses.len());

    let chosen: Vec<&Verse> = verses.choose_multiple(rng, pairs).collect();

    let mut references: Vec<VerseCard> = chosen
        .iter()
        .map(|v| VerseCard { id: v.id, label: v.reference.clone() })
        .collect();
    let mut texts: Vec<VerseCard> = chosen
        .iter()
        .map(|v| VerseCard { id: v.id, label: v.text.clone() })
        .collect();

    references.shuffle(rng);
    texts.shuffle(rng);

    Some(VerseGameRound { references, texts })
}

/// Scores a submitted board. Each reference counts once; a later answer for
/// the same reference replaces the earlier one.
pub fn check(matches: &[VerseMatch]) -> VerseGameResult {
    let mut answers: HashMap<Uuid, Uuid> = HashMap::with_capacity(matches.len());
    for m in matches {
        answers.insert(m.reference_id, m.text_id);
    }

    let correct = answers.iter().filter(|(reference, text)| reference == text).count();
    let total = answers.len();

    VerseGameResult {
        correct,
        total,
        perfect: total > 0 && correct == total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn verses(n: usize) -> Vec<Verse> {
        (0..n)
            .map(|i| Verse {
                id: Uuid::new_v4(),
                reference: format!("Psalm {}:1", i + 1),
                text: format!("verse text {}", i + 1),
            })
            .collect()
    }

    #[test]
    fn deal_pairs_every_reference_with_a_text() {
        let pool = verses(10);
        let mut rng = StdRng::seed_from_u64(7);
        let round = deal(&pool, 4, &mut rng).unwrap();

        assert_eq!(round.references.len(), 4);
        assert_eq!(round.texts.len(), 4);

        let ref_ids: HashSet<Uuid> = round.references.iter().map(|c| c.id).collect();
        let text_ids: HashSet<Uuid> = round.texts.iter().map(|c| c.id).collect();
        assert_eq!(ref_ids, text_ids);

        for card in &round.texts {
            let verse = pool.iter().find(|v| v.id == card.id).unwrap();
            assert_eq!(card.label, verse.text);
        }
    }

    #[test]
    fn deal_is_capped_by_available_verses() {
        let pool = verses(3);
        let mut rng = StdRng::seed_from_u64(1);
        let round = deal(&pool, 12, &mut rng).unwrap();
        assert_eq!(round.references.len(), 3);

        assert!(deal(&verses(1), 6, &mut rng).is_none());
    }

    #[test]
    fn deal_never_goes_below_minimum() {
        let pool = verses(5);
        let mut rng = StdRng::seed_from_u64(3);
        let round = deal(&pool, 0, &mut rng).unwrap();
        assert_eq!(round.references.len(), MIN_PAIRS);
    }

    #[test]
    fn check_counts_correct_pairs() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let result = check(&[
            VerseMatch { reference_id: a, text_id: a },
            VerseMatch { reference_id: b, text_id: c },
            VerseMatch { reference_id: c, text_id: c },
        ]);
        assert_eq!(result, VerseGameResult { correct: 2, total: 3, perfect: false });
    }

    #[test]
    fn check_uses_last_answer_per_reference() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let result = check(&[
            VerseMatch { reference_id: a, text_id: b },
            VerseMatch { reference_id: a, text_id: a },
        ]);
        assert_eq!(result, VerseGameResult { correct: 1, total: 1, perfect: true });

        assert!(!check(&[]).perfect);
    }
}
