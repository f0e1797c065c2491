use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use shared::domain::Participant;

/// Shuffles a copy of `participants` uniformly (Fisher-Yates) and keeps the
/// first `winner_count`. Asking for more winners than entrants returns every
/// entrant in shuffled order.
pub fn draw_winners<R>(
    participants: &[Participant],
    winner_count: usize,
    rng: &mut R,
) -> Vec<Participant>
where
    R: Rng + ?Sized,
{
    let mut pool = participants.to_vec();
    pool.shuffle(rng);
    pool.truncate(winner_count);
    pool
}

pub(crate) fn draw_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
