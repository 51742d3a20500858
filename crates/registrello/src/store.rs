//! In-memory record store for all school data.
//!
//! Everything lives in insertion-ordered maps ([`IndexMap`]) because the
//! report compiler selects the most-recently-inserted day/date when no
//! explicit selector is given. Data is volatile: it is wiped on restart and
//! by [`SchoolStore::reset`]. Concurrent writers to the same roll number are
//! last-write-wins; the server serializes access behind a lock but makes no
//! stronger promise.
//!
//! Every write into attendance, diary, daily reports or behavior requires the
//! roll number to already exist in the student map. Timetable slots and
//! shared homework are set-once and answer `Conflict` on re-add.

use indexmap::IndexMap;

use crate::error::ApiError;
use crate::keys;
use crate::types::{
    Activity, AttendanceRecord, AttendanceStatus, BehaviorNote, DailyReport, DiaryTask,
    HomeworkTask, Period, PeriodInput, StatusUpdate, Student,
};

/// Fixed break slots spliced in after these input indices when a timetable
/// is added.
const BREAKS: &[(usize, &str, &str)] = &[
    (1, "10:30 - 10:45", "Short Break"),
    (3, "12:00 - 12:30", "Lunch Break"),
    (5, "2:15 - 2:30", "Games Break"),
];

/// The whole in-memory "database", owned by the application state.
#[derive(Debug, Default)]
pub struct SchoolStore {
    /// roll number -> student
    pub students: IndexMap<String, Student>,
    /// grade key -> day key -> periods (breaks included)
    pub timetable: IndexMap<String, IndexMap<String, Vec<Period>>>,
    /// roll number -> matched day key -> per-period records
    pub attendance: IndexMap<String, IndexMap<String, Vec<AttendanceRecord>>>,
    /// day key -> shared tasks for every student
    pub shared_homework: IndexMap<String, Vec<HomeworkTask>>,
    /// roll number -> day key -> per-student diary entries
    pub diary: IndexMap<String, IndexMap<String, Vec<DiaryTask>>>,
    /// roll number -> date string -> report
    pub daily_reports: IndexMap<String, IndexMap<String, DailyReport>>,
    /// roll number -> append-only behavior notes
    pub behaviors: IndexMap<String, Vec<BehaviorNote>>,
}

impl SchoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_student(&self, roll_no: &str) -> Result<&Student, ApiError> {
        self.students
            .get(roll_no)
            .ok_or_else(ApiError::student_not_found)
    }

    // ---------- Students ----------

    pub fn add_student(&mut self, roll_no: &str, student: Student) -> Result<&Student, ApiError> {
        if self.students.contains_key(roll_no) {
            return Err(ApiError::Conflict(format!(
                "Student with roll_no {roll_no} already exists"
            )));
        }
        Ok(self
            .students
            .entry(roll_no.to_string())
            .or_insert(student))
    }

    pub fn student(&self, roll_no: &str) -> Result<&Student, ApiError> {
        self.ensure_student(roll_no)
    }

    pub fn students(&self) -> &IndexMap<String, Student> {
        &self.students
    }

    pub fn parent_emails(&self, roll_no: &str) -> Result<&[String], ApiError> {
        Ok(&self.ensure_student(roll_no)?.parent_emails)
    }

    pub fn set_parent_emails(
        &mut self,
        roll_no: &str,
        emails: Vec<String>,
    ) -> Result<&[String], ApiError> {
        self.ensure_student(roll_no)?;
        let emails: Vec<String> = emails
            .into_iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if emails.is_empty() {
            return Err(ApiError::Validation(
                "Provide at least one parent email in parent_emails[]".to_string(),
            ));
        }
        let student = self
            .students
            .get_mut(roll_no)
            .ok_or_else(ApiError::student_not_found)?;
        student.parent_emails = emails;
        Ok(&student.parent_emails)
    }

    // ---------- Timetable ----------

    /// Add the timetable for one (grade, day) slot. Set-once: re-adding the
    /// same slot is a conflict. Breaks are spliced in at fixed positions.
    pub fn add_timetable(
        &mut self,
        grade_raw: &str,
        day_raw: &str,
        periods: Vec<PeriodInput>,
    ) -> Result<&[Period], ApiError> {
        let grade_raw = grade_raw.trim();
        let day = keys::normalize_day(day_raw);
        if grade_raw.is_empty() || day.is_empty() || periods.is_empty() {
            return Err(ApiError::Validation(
                "grade, day, and periods[] are required".to_string(),
            ));
        }

        let gkey = keys::normalize_grade(grade_raw);
        if self
            .timetable
            .get(&gkey)
            .is_some_and(|days| days.contains_key(&day))
        {
            return Err(ApiError::Conflict(format!(
                "Timetable already exists for Grade {grade_raw} on {day} and cannot be changed"
            )));
        }

        let mut built = Vec::with_capacity(periods.len() + BREAKS.len());
        for (i, p) in periods.into_iter().enumerate() {
            built.push(Period {
                time: p.time,
                subject: p.subject,
                teacher: Some(p.teacher),
                room: Some(p.room),
            });
            if let Some((_, time, subject)) = BREAKS.iter().find(|(after, _, _)| *after == i) {
                built.push(Period::break_slot(time, subject));
            }
        }

        Ok(self
            .timetable
            .entry(gkey)
            .or_default()
            .entry(day)
            .or_insert(built))
    }

    pub fn timetable_for_grade(
        &self,
        grade: &str,
    ) -> Result<&IndexMap<String, Vec<Period>>, ApiError> {
        self.timetable
            .get(&keys::normalize_grade(grade))
            .ok_or_else(|| ApiError::NotFound("No timetable for this grade".to_string()))
    }

    /// Look up one day of a grade's timetable, fuzzy-matching the day against
    /// the stored keys. The error names the available days when the grade has
    /// a timetable but the day does not resolve.
    pub fn timetable_for_day(&self, grade: &str, day: &str) -> Result<(&str, &[Period]), ApiError> {
        let gkey = keys::normalize_grade(grade);
        let days = self.timetable.get(&gkey).ok_or_else(|| {
            ApiError::NotFound("No timetable found for this grade on this day".to_string())
        })?;
        let stored: Vec<&str> = days.keys().map(String::as_str).collect();
        match keys::resolve_stored_day(&stored, day) {
            Some(matched) => {
                let (key, periods) = days.get_key_value(matched).ok_or_else(|| {
                    ApiError::NotFound("No timetable found for this grade on this day".to_string())
                })?;
                Ok((key.as_str(), periods))
            }
            None => Err(ApiError::NotFound(format!(
                "No timetable found for this grade on that day. Available days: {}",
                stored.join(", ")
            ))),
        }
    }

    // ---------- Attendance ----------

    /// Mark attendance for one student and day. The day is fuzzy-resolved
    /// against the timetable of the student's grade; records are rebuilt
    /// from that timetable (overwriting any previous mark for the day).
    /// Staffed periods default to "Pending" unless a status is provided for
    /// the subject; unstaffed periods (breaks) are marked "N/A".
    pub fn mark_attendance(
        &mut self,
        roll_no: &str,
        day_raw: &str,
        provided: &[AttendanceStatus],
    ) -> Result<(String, Vec<AttendanceRecord>), ApiError> {
        let student = self.ensure_student(roll_no)?;
        let grade_raw = student.grade.clone();
        let gkey = keys::normalize_grade(&grade_raw);

        let days = self.timetable.get(&gkey);
        let stored: Vec<&str> = days
            .map(|d| d.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let Some(matched_day) = keys::resolve_stored_day(&stored, day_raw).map(str::to_string)
        else {
            return Err(ApiError::Validation(format!(
                "No timetable found for this student's grade and day. \
                 Add timetable first or use a valid day. \
                 Grade: {grade_raw}; requested day: {day_raw}; available days: {}",
                stored.join(", ")
            )));
        };

        let periods = &self.timetable[&gkey][&matched_day];
        let records: Vec<AttendanceRecord> = periods
            .iter()
            .map(|period| {
                let status = if period.has_teacher() {
                    provided
                        .iter()
                        .find(|s| s.subject == period.subject)
                        .and_then(|s| s.status.as_deref())
                        .map(keys::capitalize)
                        .unwrap_or_else(|| "Pending".to_string())
                } else {
                    "N/A".to_string()
                };
                AttendanceRecord {
                    subject: period.subject.clone(),
                    status,
                }
            })
            .collect();

        self.attendance
            .entry(roll_no.to_string())
            .or_default()
            .insert(matched_day.clone(), records.clone());

        Ok((matched_day, records))
    }

    pub fn attendance_for(
        &self,
        roll_no: &str,
    ) -> Result<&IndexMap<String, Vec<AttendanceRecord>>, ApiError> {
        self.attendance.get(roll_no).ok_or_else(|| {
            ApiError::NotFound("No attendance records for this student".to_string())
        })
    }

    // ---------- Homework & diary ----------

    /// Set the shared homework for one day. Set-once per day key.
    pub fn set_shared_homework(
        &mut self,
        day_raw: &str,
        tasks: Vec<HomeworkTask>,
    ) -> Result<&[HomeworkTask], ApiError> {
        let day = keys::normalize_day(day_raw);
        if day.is_empty() || tasks.is_empty() {
            return Err(ApiError::Validation("day and tasks[] required".to_string()));
        }
        if self.shared_homework.contains_key(&day) {
            return Err(ApiError::Conflict(format!(
                "Homework for {day} already set and cannot be changed"
            )));
        }
        Ok(self.shared_homework.entry(day).or_insert(tasks))
    }

    /// Update a student's diary for one day. On first touch the diary is
    /// seeded by copying the day's shared homework with status "Pending";
    /// afterwards the entries are mutated in place. Out-of-range indices are
    /// ignored, and only "Pending"/"Completed" are accepted as statuses.
    pub fn mark_homework(
        &mut self,
        roll_no: &str,
        day_raw: &str,
        completed: &[i64],
        statuses: &[StatusUpdate],
    ) -> Result<(String, Vec<DiaryTask>), ApiError> {
        self.ensure_student(roll_no)?;
        let day = keys::normalize_day(day_raw);
        let shared = self
            .shared_homework
            .get(&day)
            .ok_or_else(|| ApiError::NotFound("No homework set for this day".to_string()))?;

        let tasks = self
            .diary
            .entry(roll_no.to_string())
            .or_default()
            .entry(day.clone())
            .or_insert_with(|| shared.iter().map(DiaryTask::pending).collect());

        for &i in completed {
            if let Ok(i) = usize::try_from(i) {
                if let Some(task) = tasks.get_mut(i) {
                    task.status = "Completed".to_string();
                }
            }
        }
        for update in statuses {
            let Some(i) = update.index.and_then(|i| usize::try_from(i).ok()) else {
                continue;
            };
            match update.status.as_deref() {
                Some(status @ ("Pending" | "Completed")) => {
                    if let Some(task) = tasks.get_mut(i) {
                        task.status = status.to_string();
                    }
                }
                _ => {}
            }
        }

        Ok((day, tasks.clone()))
    }

    pub fn diary_for(&self, roll_no: &str) -> Result<&IndexMap<String, Vec<DiaryTask>>, ApiError> {
        self.diary
            .get(roll_no)
            .filter(|days| !days.is_empty())
            .ok_or_else(|| ApiError::NotFound("No diary records for this student".to_string()))
    }

    pub fn diary_for_day(&self, roll_no: &str, day: &str) -> Result<&[DiaryTask], ApiError> {
        let day = keys::normalize_day(day);
        self.diary
            .get(roll_no)
            .and_then(|days| days.get(&day))
            .map(Vec::as_slice)
            .ok_or_else(|| ApiError::NotFound("No homework marked yet for that day".to_string()))
    }

    // ---------- Daily reports ----------

    /// Log (or overwrite) the daily report for one date. Lunch is "Yes" only
    /// when the input says so, case-insensitively.
    pub fn log_daily_report(
        &mut self,
        roll_no: &str,
        date: &str,
        lunch_raw: &str,
        activities: Vec<Activity>,
    ) -> Result<(), ApiError> {
        self.ensure_student(roll_no)?;
        let date = date.trim();
        if date.is_empty() {
            return Err(ApiError::Validation(
                "date required (DD-MM-YYYY)".to_string(),
            ));
        }
        let lunch = if lunch_raw.trim().eq_ignore_ascii_case("yes") {
            "Yes"
        } else {
            "No"
        };
        self.daily_reports
            .entry(roll_no.to_string())
            .or_default()
            .insert(
                date.to_string(),
                DailyReport {
                    lunch: lunch.to_string(),
                    activities,
                },
            );
        Ok(())
    }

    pub fn reports_for(&self, roll_no: &str) -> Result<&IndexMap<String, DailyReport>, ApiError> {
        self.daily_reports
            .get(roll_no)
            .ok_or_else(|| ApiError::NotFound("No reports found".to_string()))
    }

    // ---------- Behavior ----------

    /// Append one behavior note. Moods default to "Neutral" and are
    /// capitalized; insertion order is chronological order.
    pub fn record_behavior(
        &mut self,
        roll_no: &str,
        with_teacher: Option<&str>,
        with_classmates: Option<&str>,
        note: String,
    ) -> Result<(), ApiError> {
        self.ensure_student(roll_no)?;
        self.behaviors
            .entry(roll_no.to_string())
            .or_default()
            .push(BehaviorNote {
                with_teacher: keys::capitalize(with_teacher.unwrap_or("Neutral")),
                with_classmates: keys::capitalize(with_classmates.unwrap_or("Neutral")),
                note,
            });
        Ok(())
    }

    pub fn behaviors_for(&self, roll_no: &str) -> Result<&[BehaviorNote], ApiError> {
        self.behaviors
            .get(roll_no)
            .map(Vec::as_slice)
            .ok_or_else(|| ApiError::NotFound("No behavior records found".to_string()))
    }

    // ---------- Reset ----------

    /// Clear every mapping. Previously valid roll numbers become unknown.
    pub fn reset(&mut self) {
        self.students.clear();
        self.timetable.clear();
        self.attendance.clear();
        self.shared_homework.clear();
        self.diary.clear();
        self.daily_reports.clear();
        self.behaviors.clear();
    }
}
