//! Active context: acting user, language, company and clock

use crate::record::{ObjectStore, Record};
use crate::schema::Schema;
use crate::value::RecordRef;
use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Active language and its rendering formats (strftime patterns)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Language {
    /// Language code, e.g. `en_US`
    pub code: String,
    /// Date format
    pub date_format: String,
    /// Time format
    pub time_format: String,
}

impl Default for Language {
    fn default() -> Self {
        Self {
            code: "en_US".to_string(),
            date_format: "%m/%d/%Y".to_string(),
            time_format: "%H:%M:%S".to_string(),
        }
    }
}

impl Language {
    /// Create a language with explicit formats
    pub fn new(
        code: impl Into<String>,
        date_format: impl Into<String>,
        time_format: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            date_format: date_format.into(),
            time_format: time_format.into(),
        }
    }
}

/// Company the caller acts for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Company name
    pub name: String,
    /// IANA timezone, e.g. `Europe/Madrid`; takes precedence over the offset
    #[serde(default)]
    pub tz: Option<String>,
    /// Fixed offset from UTC in minutes, used when no timezone is set
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Company {
    /// Create a company on a fixed UTC offset
    pub fn new(name: impl Into<String>, utc_offset_minutes: i32) -> Self {
        Self {
            name: name.into(),
            tz: None,
            utc_offset_minutes,
        }
    }

    /// Create a company in an IANA timezone
    pub fn in_zone(name: impl Into<String>, tz: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tz: Some(tz.into()),
            utc_offset_minutes: 0,
        }
    }

    /// Fixed offset, or `None` if the configured offset is out of range
    pub fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Named timezone, or `None` if unset or unknown
    pub fn timezone(&self) -> Option<Tz> {
        self.tz.as_deref().and_then(|name| name.parse::<Tz>().ok())
    }

    /// Wall-clock time at the company of a UTC instant
    ///
    /// `None` when the configured timezone or offset is invalid.
    pub fn to_local(&self, utc: &NaiveDateTime) -> Option<NaiveDateTime> {
        match &self.tz {
            Some(_) => self
                .timezone()
                .map(|tz| tz.from_utc_datetime(utc).naive_local()),
            None => self
                .offset()
                .map(|offset| offset.from_utc_datetime(utc).naive_local()),
        }
    }

    /// Configured timezone as written, for diagnostics
    pub fn zone_label(&self) -> String {
        match &self.tz {
            Some(name) => name.clone(),
            None => format!("{} minutes", self.utc_offset_minutes),
        }
    }
}

/// Source of the current timestamp
pub trait Clock {
    /// Current time, UTC
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Everything the engine needs from the host for one request
#[derive(Clone)]
pub struct Environment {
    /// Live record accessor
    pub store: Rc<dyn ObjectStore>,
    /// Field reflection
    pub schema: Rc<dyn Schema>,
    /// Acting user
    pub user: RecordRef,
    /// Active language
    pub lang: Language,
    /// Active company, if any
    pub company: Option<Company>,
    /// Timestamp source
    pub clock: Rc<dyn Clock>,
}

impl Environment {
    /// Create an environment with the default language, no company and the system clock
    pub fn new(store: Rc<dyn ObjectStore>, schema: Rc<dyn Schema>, user: RecordRef) -> Self {
        Self {
            store,
            schema,
            user,
            lang: Language::default(),
            company: None,
            clock: Rc::new(SystemClock),
        }
    }

    /// Replace the active language
    pub fn with_lang(mut self, lang: Language) -> Self {
        self.lang = lang;
        self
    }

    /// Set the active company
    pub fn with_company(mut self, company: Company) -> Self {
        self.company = Some(company);
        self
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time, UTC
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Browse a record through the store
    pub fn browse(&self, reference: &RecordRef) -> Option<Rc<dyn Record>> {
        self.store.browse(reference)
    }
}
