use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const SMART_MIN_RATING: u8 = 1;
pub const SMART_MAX_RATING: u8 = 5;

/// Per-criterion quality ratings for a goal statement, each in 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartScore {
    pub specific: u8,
    pub measurable: u8,
    pub achievable: u8,
    pub realistic: u8,
    pub time_bound: u8,
}

impl SmartScore {
    pub fn new(
        specific: u8,
        measurable: u8,
        achievable: u8,
        realistic: u8,
        time_bound: u8,
    ) -> AppResult<Self> {
        let score = Self {
            specific,
            measurable,
            achievable,
            realistic,
            time_bound,
        };
        score.validate()?;
        Ok(score)
    }

    pub fn uniform(rating: u8) -> Self {
        Self {
            specific: rating,
            measurable: rating,
            achievable: rating,
            realistic: rating,
            time_bound: rating,
        }
    }

    pub fn ratings(&self) -> [(&'static str, u8); 5] {
        [
            ("specific", self.specific),
            ("measurable", self.measurable),
            ("achievable", self.achievable),
            ("realistic", self.realistic),
            ("timeBound", self.time_bound),
        ]
    }

    pub fn sum(&self) -> u32 {
        self.ratings()
            .iter()
            .map(|(_, rating)| u32::from(*rating))
            .sum()
    }

    pub fn validate(&self) -> AppResult<()> {
        for (criterion, rating) in self.ratings() {
            if !(SMART_MIN_RATING..=SMART_MAX_RATING).contains(&rating) {
                return Err(AppError::validation_with_details(
                    format!("SMART rating for {criterion} must be between 1 and 5"),
                    serde_json::json!({ "criterion": criterion, "rating": rating }),
                ));
            }
        }
        Ok(())
    }
}
