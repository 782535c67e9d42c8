use std::fmt;

use serde::{Serialize, Serializer};
use tracing::warn;

/// Website Carbon letter grade. `NotAvailable` is what the API reports when
/// it cannot grade a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rating {
    APlus,
    A,
    B,
    C,
    D,
    E,
    F,
    NotAvailable,
}

impl Rating {
    pub const SCALE: [Rating; 7] = [
        Rating::APlus,
        Rating::A,
        Rating::B,
        Rating::C,
        Rating::D,
        Rating::E,
        Rating::F,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rating::APlus => "A+",
            Rating::A => "A",
            Rating::B => "B",
            Rating::C => "C",
            Rating::D => "D",
            Rating::E => "E",
            Rating::F => "F",
            Rating::NotAvailable => "N/A",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("n/a") {
            return Some(Rating::NotAvailable);
        }
        Rating::SCALE
            .into_iter()
            .find(|rating| rating.label().eq_ignore_ascii_case(label))
    }

    /// Parses a grade reported by the estimator. Anything that is not a known
    /// grade counts as the worst one.
    pub fn from_reported(label: &str) -> Self {
        Rating::from_label(label).unwrap_or_else(|| {
            warn!(rating = label, "unrecognised rating, treating as F");
            Rating::F
        })
    }

    /// Position on the 1 (A+) ..= 7 (F) scale. Ungraded pages count as 7.
    pub fn numeric(self) -> u8 {
        match self {
            Rating::APlus => 1,
            Rating::A => 2,
            Rating::B => 3,
            Rating::C => 4,
            Rating::D => 5,
            Rating::E => 6,
            Rating::F | Rating::NotAvailable => 7,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

pub fn numeric_to_letter_rating(numeric: Option<i64>) -> Rating {
    match numeric {
        Some(value @ 1..=7) => Rating::SCALE[(value - 1) as usize],
        _ => Rating::F,
    }
}

/// Mean of summed numeric ratings, rounded half to even, as a letter.
pub fn average_rating(numeric_sum: u32, pages: usize) -> Rating {
    if pages == 0 {
        return Rating::F;
    }
    let mean = f64::from(numeric_sum) / pages as f64;
    numeric_to_letter_rating(Some(mean.round_ties_even() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_scale_maps_one_through_seven() {
        let letters = (1..=7)
            .map(|n| numeric_to_letter_rating(Some(n)).label())
            .collect::<Vec<_>>();
        assert_eq!(letters, ["A+", "A", "B", "C", "D", "E", "F"]);
    }

    #[test]
    fn out_of_range_and_absent_default_to_f() {
        for value in [Some(0), Some(8), Some(-3), Some(i64::MAX), None] {
            assert_eq!(numeric_to_letter_rating(value), Rating::F);
        }
    }

    #[test]
    fn letters_round_trip_through_numeric() {
        for rating in Rating::SCALE {
            assert_eq!(
                numeric_to_letter_rating(Some(i64::from(rating.numeric()))),
                rating
            );
        }
    }

    #[test]
    fn reported_labels_parse_case_insensitively() {
        assert_eq!(Rating::from_reported("a+"), Rating::APlus);
        assert_eq!(Rating::from_reported(" B "), Rating::B);
        assert_eq!(Rating::from_reported("N/A"), Rating::NotAvailable);
        assert_eq!(Rating::from_reported("Z"), Rating::F);
        assert_eq!(Rating::from_reported(""), Rating::F);
    }

    #[test]
    fn ungraded_pages_count_as_worst() {
        assert_eq!(Rating::NotAvailable.numeric(), 7);
        assert_eq!(average_rating(7 + 7, 2), Rating::F);
    }

    #[test]
    fn average_rounds_half_to_even() {
        // 2.5 -> 2 (A), 3.5 -> 4 (C)
        assert_eq!(average_rating(2 + 3, 2), Rating::A);
        assert_eq!(average_rating(3 + 4, 2), Rating::C);
        // off-midpoint values round to nearest
        assert_eq!(average_rating(3 + 3 + 4, 3), Rating::B);
        assert_eq!(average_rating(4 + 4 + 3, 3), Rating::C);
    }

    #[test]
    fn average_of_no_pages_is_f() {
        assert_eq!(average_rating(0, 0), Rating::F);
    }
}
