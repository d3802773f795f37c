//! Card deals for sampled hands.

use rand::Rng;

use crate::cards::{Card, Deck, HoleCards};

/// Private and public cards of one sampled hand.
///
/// The whole board is dealt up front and revealed street by street, so a
/// trajectory consumes randomness in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deal {
    /// Hole cards by seat.
    pub hands: Vec<HoleCards>,
    /// Complete five-card board.
    pub board: [Card; 5],
}

impl Deal {
    /// Deal `num_players` hands and a board from a fresh shuffled deck.
    pub fn sample<R: Rng + ?Sized>(num_players: usize, rng: &mut R) -> Option<Deal> {
        let mut deck = Deck::new();
        deck.shuffle(rng);
        let hands = (0..num_players)
            .map(|_| deck.deal_hole())
            .collect::<Option<Vec<_>>>()?;
        let board = [deck.deal()?, deck.deal()?, deck.deal()?, deck.deal()?, deck.deal()?];
        Some(Deal { hands, board })
    }

    /// Complete a partially known deal.
    ///
    /// Seats with `Some` hole cards keep them, the visible `board` prefix is
    /// kept, and everything else is dealt from the remaining deck. Returns
    /// `None` if the known cards collide or the deck runs out.
    pub fn complete<R: Rng + ?Sized>(
        known_hands: &[Option<HoleCards>],
        board: &[Card],
        rng: &mut R,
    ) -> Option<Deal> {
        let mut dead: Vec<Card> = board.to_vec();
        for hole in known_hands.iter().flatten() {
            for card in hole.cards() {
                if dead.contains(&card) {
                    return None;
                }
                dead.push(card);
            }
        }
        if board.len() > 5 {
            return None;
        }
        let mut deck = Deck::without(&dead);
        deck.shuffle(rng);

        let hands = known_hands
            .iter()
            .map(|known| match known {
                Some(hole) => Some(*hole),
                None => deck.deal_hole(),
            })
            .collect::<Option<Vec<_>>>()?;
        let mut full = [Card::from_id(0); 5];
        for (i, slot) in full.iter_mut().enumerate() {
            *slot = match board.get(i) {
                Some(&card) => card,
                None => deck.deal()?,
            };
        }
        Some(Deal { hands, board: full })
    }
}
