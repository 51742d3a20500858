use serde::{Deserialize, Serialize};

/// A student record, keyed externally by roll number.
///
/// Serialized field names match the wire format consumed by existing
/// clients (PascalCase), while request payloads use snake_case and are
/// mapped in the server layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Student {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Age")]
    pub age: String,
    #[serde(rename = "Grade")]
    pub grade: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Fathers_name")]
    pub fathers_name: String,
    #[serde(rename = "Mothers_name")]
    pub mothers_name: String,
    #[serde(rename = "Blood_group")]
    pub blood_group: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "ParentEmails")]
    pub parent_emails: Vec<String>,
}

/// A single timetable period. Break periods carry no teacher or room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Period {
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Teacher", skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(rename = "Room", skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

impl Period {
    /// A fixed break slot spliced into the timetable.
    pub fn break_slot(time: &str, subject: &str) -> Self {
        Self {
            time: time.to_string(),
            subject: subject.to_string(),
            teacher: None,
            room: None,
        }
    }

    /// True when a teacher is assigned (breaks and unstaffed periods are not
    /// attendance-relevant).
    pub fn has_teacher(&self) -> bool {
        self.teacher.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Incoming timetable period as posted by clients (lowercase keys).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PeriodInput {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default)]
    pub room: String,
}

/// One attendance entry for a period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceRecord {
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Status")]
    pub status: String,
}

/// Per-subject status override supplied when marking attendance.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AttendanceStatus {
    #[serde(rename = "Subject", default)]
    pub subject: String,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

/// A day-wide homework task shared by all students of the school.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HomeworkTask {
    #[serde(rename = "Subject", default)]
    pub subject: String,
    #[serde(rename = "Homework", default)]
    pub homework: String,
}

/// A per-student diary entry, seeded from [`HomeworkTask`] on first touch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiaryTask {
    #[serde(rename = "Subject")]
    pub subject: String,
    #[serde(rename = "Homework")]
    pub homework: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl DiaryTask {
    pub fn pending(task: &HomeworkTask) -> Self {
        Self {
            subject: task.subject.clone(),
            homework: task.homework.clone(),
            status: "Pending".to_string(),
        }
    }
}

/// Indexed status update for a diary entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatusUpdate {
    pub index: Option<i64>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

/// One activity line inside a daily report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    #[serde(rename = "Activity", default)]
    pub activity: String,
    #[serde(rename = "Remark", default)]
    pub remark: String,
}

/// A daily activity report, keyed by date string per student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyReport {
    #[serde(rename = "Lunch")]
    pub lunch: String,
    #[serde(rename = "Activities")]
    pub activities: Vec<Activity>,
}

/// One behavior observation; the list per student is append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BehaviorNote {
    #[serde(rename = "With Teacher")]
    pub with_teacher: String,
    #[serde(rename = "With Classmates")]
    pub with_classmates: String,
    #[serde(rename = "Note")]
    pub note: String,
}
