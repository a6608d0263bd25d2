//! Academic cycle codes
//!
//! A cycle is coded numerically as `<year><term>`, where the term suffix is `10`
//! (first semester) or `30` (second semester), e.g. `2410`, `2430`.

use serde::Serialize;

/// First and last year covered by the canonical cycle list.
const FIRST_YEAR: u32 = 5;
const LAST_YEAR: u32 = 30;

/// Term suffixes in chronological order within a year.
const TERMS: [u32; 2] = [10, 30];

/// A validated cycle code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Cycle(u32);

impl Cycle {
    /// Build a cycle from a numeric code, rejecting codes that do not end in 10 or 30.
    pub fn new(code: u32) -> Option<Self> {
        if TERMS.contains(&(code % 100)) {
            Some(Cycle(code))
        } else {
            None
        }
    }

    /// Parse a raw cell value ("2410", " 2410 ", "2410.0").
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let code = match trimmed.parse::<u32>() {
            Ok(code) => code,
            Err(_) => {
                let value = trimmed.parse::<f64>().ok()?;
                if value.fract() != 0.0 || value < 0.0 {
                    return None;
                }
                value as u32
            }
        };
        Cycle::new(code)
    }

    pub fn code(self) -> u32 {
        self.0
    }

    /// Position of this cycle in the canonical ordered list, if covered.
    pub fn canonical_index(self) -> Option<usize> {
        let year = self.0 / 100;
        if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
            return None;
        }
        let term = TERMS.iter().position(|t| *t == self.0 % 100)?;
        Some((year - FIRST_YEAR) as usize * TERMS.len() + term)
    }
}

impl std::fmt::Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed ordered list of valid cycle codes (510, 530, 610, ..., 3010, 3030).
pub fn canonical_cycles() -> Vec<Cycle> {
    (FIRST_YEAR..=LAST_YEAR)
        .flat_map(|year| TERMS.iter().map(move |term| Cycle(year * 100 + term)))
        .collect()
}

/// Number of canonical positions between two cycles, when both are canonical.
pub fn canonical_gap(earlier: Cycle, later: Cycle) -> Option<i64> {
    let a = earlier.canonical_index()? as i64;
    let b = later.canonical_index()? as i64;
    Some(b - a)
}
