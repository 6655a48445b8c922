use crate::model::{Amount, CategoryMap};
use crate::Result;
use anyhow::{bail, Context};
use chrono::{
    DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// The time of day used when an expense is given a date but no time.
const DEFAULT_TIME: (u32, u32, u32) = (12, 0, 0);

/// A single expense as held in memory. `category` is always the canonical display name; it is
/// assigned during normalization, not read from the payload.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(default, deserialize_with = "string_or_number")]
    pub(crate) id: String,
    #[serde(default, skip_deserializing)]
    pub(crate) category: String,
    pub(crate) amount: Amount,
    #[serde(default)]
    pub(crate) description: String,
    /// Kept exactly as the service sent it; see `timestamp` for the parsed value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) date: Option<String>,
    /// Any other fields the service attached to the expense.
    #[serde(flatten)]
    pub(crate) other_fields: BTreeMap<String, Value>,
}

impl Expense {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn other_fields(&self) -> &BTreeMap<String, Value> {
        &self.other_fields
    }

    /// Parses `date`. RFC 3339 timestamps are honored as given, timestamps without an offset are
    /// taken as UTC and bare dates are placed at noon UTC.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.date.as_deref()?.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(Utc.from_utc_datetime(&naive));
        }
        NaiveDate::from_str(raw)
            .ok()
            .map(|d| Utc.from_utc_datetime(&d.and_time(default_time())))
    }
}

/// The body of `POST /expenses`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewExpense {
    pub(crate) username: String,
    pub(crate) category: String,
    pub(crate) amount: Amount,
    pub(crate) description: String,
    #[serde(serialize_with = "iso_millis")]
    pub(crate) date: DateTime<Utc>,
}

/// An expense as a person enters it, before validation. Only `amount` and `description` are
/// required; the category falls back to the first known category and the date to "now".
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExpenseDraft {
    pub category: Option<String>,
    pub amount: Option<String>,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl ExpenseDraft {
    pub fn new(amount: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            amount: Some(amount.into()),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Checks the draft and turns it into a request body. Nothing is sent when this fails.
    ///
    /// # Errors
    /// - The amount is missing, unparsable or negative.
    /// - The description is blank.
    /// - No category was chosen and there are no categories to fall back on.
    pub(crate) fn validate<Tz>(
        &self,
        username: &str,
        categories: &CategoryMap,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Result<NewExpense>
    where
        Tz: TimeZone,
    {
        let amount = match self.amount.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => {
                Amount::from_str(s).with_context(|| format!("Invalid amount '{s}'"))?
            }
            _ => bail!("An amount is required"),
        };

        let description = self.description.trim();
        if description.is_empty() {
            bail!("A description is required");
        }

        let category = match self.category.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => categories
                .resolve(name)
                .map(str::to_string)
                .unwrap_or_else(|| name.to_string()),
            _ => match categories.first() {
                Some(first) => first.to_string(),
                None => bail!("There are no categories yet, add a category before adding expenses"),
            },
        };

        Ok(NewExpense {
            username: username.to_string(),
            category,
            amount,
            description: description.to_string(),
            date: resolve_timestamp_in(tz, self.date, self.time, now),
        })
    }
}

/// Chooses the timestamp for a new expense from optional form inputs, interpreting them in `tz`:
/// - date and time: that moment
/// - date only: that date at noon
/// - no date: `now` (a time without a date is ignored)
pub fn resolve_timestamp_in<Tz>(
    tz: &Tz,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    now: DateTime<Utc>,
) -> DateTime<Utc>
where
    Tz: TimeZone,
{
    let Some(date) = date else {
        return now;
    };
    let naive = date.and_time(time.unwrap_or_else(default_time));
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // The wall-clock time was skipped by a DST jump
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

fn default_time() -> NaiveTime {
    let (h, m, s) = DEFAULT_TIME;
    NaiveTime::from_hms_opt(h, m, s).unwrap_or_default()
}

fn iso_millis<S>(date: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number id, got {other}"
        ))),
    }
}
