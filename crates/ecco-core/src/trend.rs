//! Ordinal trend labels.
//!
//! Trends are stored as text. Ranks exist only so that min, max and median
//! can be computed; every value handed back to a caller is a label.

use serde::{Deserialize, Serialize};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
  Falling = 1,
  Stable  = 2,
  Rising  = 3,
}

impl Trend {
  /// Every trend in rank order.
  pub const ALL: [Trend; 3] = [Trend::Falling, Trend::Stable, Trend::Rising];

  pub fn rank(self) -> u8 { self as u8 }

  pub fn from_rank(rank: u8) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.rank() == rank)
  }

  pub fn label(self) -> &'static str {
    match self {
      Trend::Falling => "falling",
      Trend::Stable => "stable",
      Trend::Rising => "rising",
    }
  }

  /// Parse a stored label. Empty or unrecognised text is "unset".
  pub fn parse(s: &str) -> Option<Self> {
    let s = s.trim();
    Self::ALL
      .into_iter()
      .find(|t| t.label().eq_ignore_ascii_case(s))
  }

  /// Label sequence in rank order, reported as `order` for trend measures.
  pub fn labels() -> Vec<String> {
    Self::ALL.iter().map(|t| t.label().to_owned()).collect()
  }

  /// Lower median of the given trends; `None` when there are none.
  pub fn median<I>(trends: I) -> Option<Self>
  where
    I: IntoIterator<Item = Trend>,
  {
    let mut ranks: Vec<u8> = trends.into_iter().map(Trend::rank).collect();
    if ranks.is_empty() {
      return None;
    }
    ranks.sort_unstable();
    Self::from_rank(ranks[(ranks.len() - 1) / 2])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rank_round_trip_is_identity() {
    for t in Trend::ALL {
      assert_eq!(Trend::from_rank(t.rank()), Some(t));
      assert_eq!(Trend::parse(t.label()), Some(t));
    }
    assert_eq!(Trend::from_rank(0), None);
  }

  #[test]
  fn parse_treats_empty_as_unset() {
    assert_eq!(Trend::parse(""), None);
    assert_eq!(Trend::parse("   "), None);
    assert_eq!(Trend::parse(" Rising "), Some(Trend::Rising));
  }

  #[test]
  fn ordering_follows_rank() {
    assert!(Trend::Falling < Trend::Stable);
    assert!(Trend::Stable < Trend::Rising);
  }

  #[test]
  fn median_uses_lower_middle() {
    use Trend::*;
    assert_eq!(Trend::median([Rising, Falling, Stable]), Some(Stable));
    assert_eq!(Trend::median([Rising, Falling]), Some(Falling));
    assert_eq!(Trend::median([Rising, Rising, Falling]), Some(Rising));
    assert_eq!(Trend::median(Vec::new()), None);
  }

  #[test]
  fn serialises_as_label() {
    assert_eq!(
      serde_json::to_value(Trend::Stable).unwrap(),
      serde_json::json!("stable")
    );
  }
}
