use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use chrono::Utc;
use tracing::{info, warn};

use crate::db::repositories::settings_repository::{AppSettingRow, SettingsRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::{
    CoachSettings, CoachSettingsUpdate, ProgressUpdatePolicy, REFLECTION_MIN_WORDS,
};
use crate::utils::calendar::parse_timezone;

const KEY_INITIAL_THRESHOLD: &str = "initial_smart_threshold";
const KEY_MAX_THRESHOLD: &str = "max_smart_threshold";
const KEY_THRESHOLD_INCREMENT: &str = "threshold_increment";
const KEY_DAYS_BETWEEN_INCREASES: &str = "days_between_increases";
const KEY_REFLECTION_MIN_WORDS: &str = "reflection_min_words";
const KEY_AT_RISK_MISSED_GOALS: &str = "at_risk_missed_goals";
const KEY_AT_RISK_MIN_DEPTH: &str = "at_risk_min_reflection_depth";
const KEY_AT_RISK_MIN_CONSISTENCY: &str = "at_risk_min_consistency";
const KEY_AT_RISK_LIMIT: &str = "at_risk_limit";
const KEY_TIMEZONE: &str = "timezone";
const KEY_PROGRESS_POLICY: &str = "progress_update_policy";

pub struct SettingsService {
    db: DbPool,
    cache: RwLock<Option<CoachSettings>>,
}

impl SettingsService {
    pub fn new(db: DbPool) -> AppResult<Self> {
        Ok(Self {
            db,
            cache: RwLock::new(None),
        })
    }

    pub fn get(&self) -> AppResult<CoachSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: CoachSettingsUpdate) -> AppResult<CoachSettings> {
        let mut next = self.get()?;

        if let Some(value) = input.initial_smart_threshold {
            next.initial_smart_threshold = value;
        }
        if let Some(value) = input.max_smart_threshold {
            next.max_smart_threshold = value;
        }
        if let Some(value) = input.threshold_increment {
            next.threshold_increment = value;
        }
        if let Some(value) = input.days_between_increases {
            next.days_between_increases = value;
        }
        if let Some(value) = input.reflection_min_words {
            next.reflection_min_words = value;
        }
        if let Some(value) = input.at_risk_missed_goals {
            next.at_risk_missed_goals = value;
        }
        if let Some(value) = input.at_risk_min_reflection_depth {
            next.at_risk_min_reflection_depth = value;
        }
        if let Some(value) = input.at_risk_min_consistency {
            next.at_risk_min_consistency = value;
        }
        if let Some(value) = input.at_risk_limit {
            next.at_risk_limit = value;
        }
        if let Some(value) = input.timezone.as_ref() {
            next.timezone = value.trim().to_string();
        }
        if let Some(value) = input.progress_update_policy {
            next.progress_update_policy = value;
        }

        validate(&next)?;

        let now = Utc::now().to_rfc3339();
        self.db.with_transaction(|conn| {
            for (key, value) in encode(&next) {
                SettingsRepository::upsert(conn, key, &value, &now)?;
            }
            Ok(())
        })?;
        next.updated_at = Some(now);

        info!(
            target: "app::settings",
            policy = next.progress_update_policy.as_str(),
            timezone = %next.timezone,
            "coach settings updated"
        );

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(next.clone());
        }

        Ok(next)
    }

    fn load_settings_from_db(&self) -> AppResult<CoachSettings> {
        let rows = self.db.with_connection(SettingsRepository::load_map)?;
        let mut settings = CoachSettings::default();

        read_into(&rows, KEY_INITIAL_THRESHOLD, &mut settings.initial_smart_threshold);
        read_into(&rows, KEY_MAX_THRESHOLD, &mut settings.max_smart_threshold);
        read_into(&rows, KEY_THRESHOLD_INCREMENT, &mut settings.threshold_increment);
        read_into(&rows, KEY_DAYS_BETWEEN_INCREASES, &mut settings.days_between_increases);
        read_into(&rows, KEY_REFLECTION_MIN_WORDS, &mut settings.reflection_min_words);
        read_into(&rows, KEY_AT_RISK_MISSED_GOALS, &mut settings.at_risk_missed_goals);
        read_into(&rows, KEY_AT_RISK_MIN_DEPTH, &mut settings.at_risk_min_reflection_depth);
        read_into(&rows, KEY_AT_RISK_MIN_CONSISTENCY, &mut settings.at_risk_min_consistency);
        read_into(&rows, KEY_AT_RISK_LIMIT, &mut settings.at_risk_limit);

        if let Some(row) = rows.get(KEY_TIMEZONE) {
            settings.timezone = row.value.clone();
        }
        if let Some(row) = rows.get(KEY_PROGRESS_POLICY) {
            match ProgressUpdatePolicy::parse(&row.value) {
                Some(policy) => settings.progress_update_policy = policy,
                None => warn!(target: "app::settings", value = %row.value, "unknown progress policy, keeping default"),
            }
        }

        settings.updated_at = rows.values().map(|row| row.updated_at.clone()).max();

        if let Err(err) = validate(&settings) {
            warn!(target: "app::settings", error = %err, "stored settings invalid, using defaults");
            return Ok(CoachSettings::default());
        }

        Ok(settings)
    }
}

fn read_into<T: FromStr>(rows: &HashMap<String, AppSettingRow>, key: &str, slot: &mut T) {
    if let Some(row) = rows.get(key) {
        match row.value.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => warn!(target: "app::settings", %key, value = %row.value, "unparseable setting ignored"),
        }
    }
}

fn encode(settings: &CoachSettings) -> Vec<(&'static str, String)> {
    vec![
        (KEY_INITIAL_THRESHOLD, settings.initial_smart_threshold.to_string()),
        (KEY_MAX_THRESHOLD, settings.max_smart_threshold.to_string()),
        (KEY_THRESHOLD_INCREMENT, settings.threshold_increment.to_string()),
        (KEY_DAYS_BETWEEN_INCREASES, settings.days_between_increases.to_string()),
        (KEY_REFLECTION_MIN_WORDS, settings.reflection_min_words.to_string()),
        (KEY_AT_RISK_MISSED_GOALS, settings.at_risk_missed_goals.to_string()),
        (KEY_AT_RISK_MIN_DEPTH, settings.at_risk_min_reflection_depth.to_string()),
        (KEY_AT_RISK_MIN_CONSISTENCY, settings.at_risk_min_consistency.to_string()),
        (KEY_AT_RISK_LIMIT, settings.at_risk_limit.to_string()),
        (KEY_TIMEZONE, settings.timezone.clone()),
        (KEY_PROGRESS_POLICY, settings.progress_update_policy.as_str().to_string()),
    ]
}

fn validate(settings: &CoachSettings) -> AppResult<()> {
    if settings.max_smart_threshold > 100 {
        return Err(AppError::validation("maximum SMART threshold cannot exceed 100"));
    }
    if settings.initial_smart_threshold > settings.max_smart_threshold {
        return Err(AppError::validation(
            "initial SMART threshold must not exceed the maximum",
        ));
    }
    if settings.threshold_increment == 0 {
        return Err(AppError::validation("threshold increment must be at least 1"));
    }
    if settings.days_between_increases < 1 {
        return Err(AppError::validation("days between increases must be at least 1"));
    }
    if settings.reflection_min_words < REFLECTION_MIN_WORDS {
        return Err(AppError::validation(format!(
            "reflection minimum words must be at least {REFLECTION_MIN_WORDS}"
        )));
    }
    if settings.at_risk_limit == 0 {
        return Err(AppError::validation("at-risk list size must be at least 1"));
    }
    if settings.at_risk_min_consistency > 100 {
        return Err(AppError::validation("at-risk consistency must be between 0 and 100"));
    }
    if !(0.0..=5.0).contains(&settings.at_risk_min_reflection_depth) {
        return Err(AppError::validation("at-risk reflection depth must be between 0 and 5"));
    }
    parse_timezone(&settings.timezone)?;
    Ok(())
}
