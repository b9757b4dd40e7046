//! Quarter Engine: Card Deck
//!
//! Draw pile plus discard pile, both ordered. Cards are ids only; the hand
//! lives in `GameState`. Draw, discard and reshuffle never create or lose a
//! card: `draw + discard + held` is constant.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ResourceError};
use crate::rng::RandomStream;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardDeck {
    draw_pile: Vec<String>,
    discard_pile: Vec<String>,
}

impl CardDeck {
    /// Deck with `cards` as the draw pile, top first.
    pub fn new(cards: Vec<String>) -> Self {
        Self {
            draw_pile: cards,
            discard_pile: Vec::new(),
        }
    }

    /// Deck with `cards` shuffled into the draw pile.
    pub fn shuffled(mut cards: Vec<String>, rng: &mut RandomStream) -> Self {
        rng.shuffle(&mut cards);
        Self::new(cards)
    }

    pub fn draw_pile(&self) -> &[String] {
        &self.draw_pile
    }

    pub fn discard_pile(&self) -> &[String] {
        &self.discard_pile
    }

    /// Cards held by the deck (draw + discard).
    pub fn total_cards(&self) -> usize {
        self.draw_pile.len() + self.discard_pile.len()
    }

    /// Draw the top card. Reshuffles the discard pile first when the draw
    /// pile is empty; fails only when both piles are empty.
    pub fn draw(&self, rng: &mut RandomStream) -> Result<(String, CardDeck), EngineError> {
        let source = if self.draw_pile.is_empty() {
            if self.discard_pile.is_empty() {
                return Err(ResourceError::DeckExhausted.into());
            }
            self.reshuffle(rng)
        } else {
            self.clone()
        };

        let mut draw_pile = source.draw_pile;
        let card = draw_pile.remove(0);
        Ok((
            card,
            CardDeck {
                draw_pile,
                discard_pile: source.discard_pile,
            },
        ))
    }

    /// Draw `count` cards in order, reshuffling as needed.
    pub fn draw_many(
        &self,
        count: usize,
        rng: &mut RandomStream,
    ) -> Result<(Vec<String>, CardDeck), EngineError> {
        let mut deck = self.clone();
        let mut drawn = Vec::with_capacity(count);
        for _ in 0..count {
            let (card, next) = deck.draw(rng)?;
            drawn.push(card);
            deck = next;
        }
        Ok((drawn, deck))
    }

    /// Append one card to the discard pile.
    pub fn discard(&self, card_id: &str) -> CardDeck {
        let mut discard_pile = self.discard_pile.clone();
        discard_pile.push(card_id.to_string());
        CardDeck {
            draw_pile: self.draw_pile.clone(),
            discard_pile,
        }
    }

    /// Append several cards to the discard pile, preserving order.
    pub fn discard_multiple<I, S>(&self, card_ids: I) -> CardDeck
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut discard_pile = self.discard_pile.clone();
        discard_pile.extend(card_ids.into_iter().map(|id| id.as_ref().to_string()));
        CardDeck {
            draw_pile: self.draw_pile.clone(),
            discard_pile,
        }
    }

    /// Move the discard pile, shuffled, under the draw pile and clear it.
    pub fn reshuffle(&self, rng: &mut RandomStream) -> CardDeck {
        let mut recycled = self.discard_pile.clone();
        rng.shuffle(&mut recycled);
        let mut draw_pile = self.draw_pile.clone();
        draw_pile.extend(recycled);
        CardDeck {
            draw_pile,
            discard_pile: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_draw_reshuffles_single_discard() {
        let mut rng = RandomStream::new(1);
        let deck = CardDeck::new(ids(&["A", "B"]));

        let (first, deck) = deck.draw(&mut rng).unwrap();
        let (second, deck) = deck.draw(&mut rng).unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("A", "B"));
        assert!(deck.draw_pile().is_empty());
        assert!(deck.discard_pile().is_empty());

        let deck = deck.discard("A");
        let (again, deck) = deck.draw(&mut rng).unwrap();
        assert_eq!(again, "A");
        assert!(deck.draw_pile().is_empty());
        assert!(deck.discard_pile().is_empty());
    }

    #[test]
    fn test_draw_from_empty_deck_fails() {
        let mut rng = RandomStream::new(1);
        let err = CardDeck::default().draw(&mut rng).unwrap_err();
        assert_eq!(err, EngineError::Exhausted(ResourceError::DeckExhausted));
    }

    #[test]
    fn test_discard_multiple_preserves_order() {
        let deck = CardDeck::default().discard_multiple(["x", "y", "z"]);
        assert_eq!(deck.discard_pile(), ids(&["x", "y", "z"]).as_slice());
    }

    #[test]
    fn test_reshuffle_clears_discard() {
        let mut rng = RandomStream::new(9);
        let deck = CardDeck::new(ids(&["A"])).discard_multiple(["B", "C", "D"]);
        let shuffled = deck.reshuffle(&mut rng);
        assert_eq!(shuffled.draw_pile()[0], "A");
        assert_eq!(shuffled.draw_pile().len(), 4);
        assert!(shuffled.discard_pile().is_empty());
    }

    #[test]
    fn test_conservation_over_random_operations() {
        let mut rng = RandomStream::new(2024);
        let mut deck = CardDeck::shuffled(ids(&["a", "b", "c", "d", "e", "f"]), &mut rng);
        let mut held: Vec<String> = Vec::new();
        let total = deck.total_cards();

        for step in 0..400 {
            match rng.range(0, 2) {
                0 => {
                    if let Ok((card, next)) = deck.draw(&mut rng) {
                        held.push(card);
                        deck = next;
                    }
                }
                1 if !held.is_empty() => {
                    let card = held.remove(0);
                    deck = deck.discard(&card);
                }
                _ => deck = deck.reshuffle(&mut rng),
            }
            assert_eq!(deck.total_cards() + held.len(), total, "step {step}");
        }
    }

    #[test]
    fn test_draw_many_stops_on_exhaustion() {
        let mut rng = RandomStream::new(4);
        let deck = CardDeck::new(ids(&["a", "b"]));
        assert!(deck.draw_many(3, &mut rng).is_err());
        let (drawn, rest) = deck.draw_many(2, &mut rng).unwrap();
        assert_eq!(drawn, ids(&["a", "b"]));
        assert_eq!(rest.total_cards(), 0);
    }
}
