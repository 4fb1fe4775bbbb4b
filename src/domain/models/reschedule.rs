use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, NaiveTime};
use crate::domain::models::appointment::Appointment;
use crate::domain::models::directory::Employee;

/// Caller-supplied "before" values of a reschedule. Absent fields mean unchanged.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleChanges {
    pub old_date: Option<NaiveDate>,
    pub old_time: Option<NaiveTime>,
    pub old_end_time: Option<NaiveTime>,
    pub old_employee_id: Option<String>,
}

impl RescheduleChanges {
    pub fn from_previous(previous: &Appointment) -> Self {
        Self {
            old_date: Some(previous.date),
            old_time: Some(previous.start_time),
            old_end_time: Some(previous.end_time),
            old_employee_id: Some(previous.employee_id.clone()),
        }
    }

    pub fn employee_changed(&self, current: &Appointment) -> bool {
        self.old_employee_id
            .as_deref()
            .is_some_and(|old| old != current.employee_id)
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SlotSnapshot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub employee_id: String,
    pub employee_name: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RescheduleDiff {
    pub date_changed: bool,
    pub time_changed: bool,
    pub employee_changed: bool,
    pub old: SlotSnapshot,
    pub new: SlotSnapshot,
}

impl RescheduleDiff {
    /// `current` must be freshly loaded. `old_employee` is only consulted when the
    /// employee actually changed; otherwise the current employee fills the old block.
    pub fn compute(
        changes: &RescheduleChanges,
        current: &Appointment,
        current_employee: &Employee,
        old_employee: Option<&Employee>,
    ) -> Self {
        let new = SlotSnapshot {
            date: current.date,
            start_time: current.start_time,
            end_time: current.end_time,
            employee_id: current.employee_id.clone(),
            employee_name: current_employee.full_name.clone(),
        };

        let employee_changed = changes.employee_changed(current);
        let (old_employee_id, old_employee_name) = match (employee_changed, old_employee) {
            (true, Some(emp)) => (emp.id.clone(), emp.full_name.clone()),
            (true, None) => (
                changes.old_employee_id.clone().unwrap_or_default(),
                String::new(),
            ),
            (false, _) => (new.employee_id.clone(), new.employee_name.clone()),
        };

        let old = SlotSnapshot {
            date: changes.old_date.unwrap_or(current.date),
            start_time: changes.old_time.unwrap_or(current.start_time),
            end_time: changes.old_end_time.unwrap_or(current.end_time),
            employee_id: old_employee_id,
            employee_name: old_employee_name,
        };

        Self {
            date_changed: old.date != new.date,
            time_changed: old.start_time != new.start_time || old.end_time != new.end_time,
            employee_changed,
            old,
            new,
        }
    }
}
