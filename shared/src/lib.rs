use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// How often a contract's recurring work comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Days,
    Months,
}

impl RecurrenceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Months => "months",
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" => Ok(Self::Days),
            "months" => Ok(Self::Months),
            other => Err(format!("unknown recurrence unit: {}", other)),
        }
    }
}

/// A service contract covering equipment installed at one or more of the
/// client's locations, optionally carrying a recurrence rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    /// Number of recurrence units between occurrences. A contract without a
    /// positive interval never participates in automatic generation.
    pub recurrence_interval: Option<i32>,
    pub recurrence_unit: Option<RecurrenceUnit>,
    /// Day of month (1-31) the work should land on; months unit only.
    pub recurrence_day_of_month: Option<u32>,
    pub start_date: Option<NaiveDate>,
    /// Lead time: how many days before the due date generation may fire.
    pub days_before_work: i32,
    pub equipment_ids: HashSet<Uuid>,
    /// Ordered target location names, matched by exact name equality.
    pub location_names: Vec<String>,
    /// Legacy single-location field, used only when `location_names` is empty.
    pub location_name: Option<String>,
    /// Cursor: instant of the last successful generation cycle. Only ever
    /// moves forward.
    pub last_auto_work_generated: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub locations: Vec<Location>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub equipment: Vec<EquipmentUnit>,
    pub contacts: Vec<ContactPerson>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentUnit {
    pub id: Uuid,
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactPerson {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Work order discriminator for engine-generated recurring reviews.
pub const WORK_TYPE_RECURRING_REVIEW: &str = "recurring_review";

/// Initial status of a freshly generated work order.
pub const WORK_STATUS_LISTED: &str = "listed";

/// A unit of field work at one client location. The generation engine creates
/// these; assignment and completion belong to downstream workflow.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrder {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub client_id: Uuid,
    pub location_name: String,
    /// Equipment covered at this location, in the location's own order.
    pub equipment_ids: Vec<Uuid>,
    pub work_type: String, // recurring_review, repair, installation
    pub status: String,    // listed, assigned, in_progress, completed
    /// Intervention date, day precision (00:00 UTC of the occurrence day).
    pub scheduled_for: DateTime<Utc>,
    pub auto_generated: bool,
    /// Snapshot of the location's first contact person at generation time.
    pub contact_name: String,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl Contract {
    /// Target location names: the ordered list when present, otherwise the
    /// legacy single-name fallback.
    pub fn target_location_names(&self) -> Vec<String> {
        if !self.location_names.is_empty() {
            self.location_names.clone()
        } else {
            self.location_name.iter().cloned().collect()
        }
    }
}

impl Client {
    /// Look up a location by exact name equality.
    pub fn location_by_name(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name == name)
    }
}
