//! Compiles the multi-section plain-text student update sent to parents.
//!
//! Section order and fallback strings are fixed; existing parents' mail
//! filters key off them. When no explicit day/date is given, each section
//! surfaces the most-recently-inserted key of its mapping, which relies on
//! the store's insertion-ordered maps.

use crate::keys;
use crate::store::SchoolStore;
use crate::types::{AttendanceRecord, BehaviorNote, DailyReport, DiaryTask};

/// Build the full update text for one student.
///
/// `day` selects the attendance/diary day (normalized, exact key only — no
/// fuzzy matching here); `date` selects the daily report. Either defaults to
/// the latest inserted key of the respective mapping.
pub fn compile_student_update(
    store: &SchoolStore,
    roll_no: &str,
    day: Option<&str>,
    date: Option<&str>,
) -> String {
    let (name, grade) = store
        .students
        .get(roll_no)
        .map(|s| (s.name.as_str(), s.grade.as_str()))
        .unwrap_or(("", ""));
    let header = format!("Student Update\nName: {name}\nRoll No: {roll_no}\nGrade: {grade}\n");

    let mut att_block = "No attendance records.".to_string();
    if let Some(days) = store.attendance.get(roll_no).filter(|d| !d.is_empty()) {
        let day_key = day
            .map(keys::normalize_day)
            .or_else(|| days.keys().last().cloned());
        att_block = match day_key.as_ref().and_then(|k| days.get(k).map(|r| (k, r))) {
            Some((key, records)) => {
                format!("Attendance ({key}):\n{}", format_attendance(records))
            }
            None => "No attendance for the specified day.".to_string(),
        };
    }

    let mut diary_block = "No homework diary.".to_string();
    if let Some(days) = store.diary.get(roll_no).filter(|d| !d.is_empty()) {
        let day_key = day
            .map(keys::normalize_day)
            .or_else(|| days.keys().last().cloned());
        diary_block = match day_key.as_ref().and_then(|k| days.get(k).map(|t| (k, t))) {
            Some((key, tasks)) => {
                format!("Homework Diary ({key}):\n{}", format_diary(tasks))
            }
            None => "No diary for the specified day.".to_string(),
        };
    }

    let mut report_block = "No daily report.".to_string();
    if let Some(dates) = store.daily_reports.get(roll_no).filter(|d| !d.is_empty()) {
        // Explicit date only wins when it exists as a key; otherwise latest.
        let date_key = date
            .filter(|d| dates.contains_key(*d))
            .map(str::to_string)
            .or_else(|| dates.keys().last().cloned());
        report_block = match date_key.as_ref().and_then(|k| dates.get(k).map(|r| (k, r))) {
            Some((key, report)) => {
                format!("Daily Report ({key}):\n{}", format_daily_report(report))
            }
            None => "No daily report for the specified date.".to_string(),
        };
    }

    let mut behaviors_block = "No behavior records.".to_string();
    if let Some(notes) = store.behaviors.get(roll_no).filter(|n| !n.is_empty()) {
        behaviors_block = format!("Behavior Records:\n{}", format_behaviors(notes));
    }

    format!(
        "{header}\n\
         ----------------------\n\
         {att_block}\n\n\
         ----------------------\n\
         {diary_block}\n\n\
         ----------------------\n\
         {report_block}\n\n\
         ----------------------\n\
         {behaviors_block}\n"
    )
}

fn format_attendance(records: &[AttendanceRecord]) -> String {
    if records.is_empty() {
        return "No attendance records.".to_string();
    }
    records
        .iter()
        .map(|r| format!("- {}: {}", r.subject, r.status))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_diary(tasks: &[DiaryTask]) -> String {
    if tasks.is_empty() {
        return "No homework entries.".to_string();
    }
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| format!("- {}. {}: {} [{}]", i + 1, t.subject, t.homework, t.status))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_daily_report(report: &DailyReport) -> String {
    let mut lines = vec![format!("Lunch: {}", report.lunch)];
    if report.activities.is_empty() {
        lines.push("(No activities)".to_string());
    } else {
        for a in &report.activities {
            lines.push(format!("- {}: {}", a.activity, a.remark));
        }
    }
    lines.join("\n")
}

fn format_behaviors(notes: &[BehaviorNote]) -> String {
    notes
        .iter()
        .map(|b| {
            format!(
                "- With Teacher: {}; With Classmates: {}; Note: {}",
                b.with_teacher, b.with_classmates, b.note
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Activity, HomeworkTask, PeriodInput, Student};

    fn make_student(grade: &str) -> Student {
        Student {
            name: "Ada".to_string(),
            age: "10".to_string(),
            grade: grade.to_string(),
            gender: "F".to_string(),
            fathers_name: "Bob".to_string(),
            mothers_name: "Carol".to_string(),
            blood_group: "O+".to_string(),
            address: "1 Main St".to_string(),
            parent_emails: vec![],
        }
    }

    fn make_period(subject: &str) -> PeriodInput {
        PeriodInput {
            time: "9:00 - 9:45".to_string(),
            subject: subject.to_string(),
            teacher: "T".to_string(),
            room: "A1".to_string(),
        }
    }

    #[test]
    fn test_all_fallbacks_for_fresh_student() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();

        let text = compile_student_update(&store, "7", None, None);
        assert!(text.contains("Student Update\nName: Ada\nRoll No: 7\nGrade: Grade 5\n"));
        assert!(text.contains("No attendance records."));
        assert!(text.contains("No homework diary."));
        assert!(text.contains("No daily report."));
        assert!(text.contains("No behavior records."));
    }

    #[test]
    fn test_attendance_section_with_pending_statuses() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();
        store
            .add_timetable(
                "grade 5",
                "Monday",
                vec![make_period("Math"), make_period("Science")],
            )
            .unwrap();
        store.mark_attendance("7", "Monday", &[]).unwrap();

        let text = compile_student_update(&store, "7", Some("Monday"), None);
        assert!(text.contains("Attendance (Monday):"));
        assert!(text.contains("- Math: Pending"));
        assert!(text.contains("- Science: Pending"));
    }

    #[test]
    fn test_explicit_day_is_exact_not_fuzzy() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();
        store
            .add_timetable("grade 5", "Monday", vec![make_period("Math")])
            .unwrap();
        store.mark_attendance("7", "Monday", &[]).unwrap();

        // "mon" would fuzzy-match in the store, but the compiler uses exact
        // normalized keys only.
        let text = compile_student_update(&store, "7", Some("mon"), None);
        assert!(text.contains("No attendance for the specified day."));

        // Case still normalizes to the stored key.
        let text = compile_student_update(&store, "7", Some("MONDAY"), None);
        assert!(text.contains("Attendance (Monday):"));
    }

    #[test]
    fn test_latest_inserted_day_wins_without_selector() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();
        store
            .add_timetable("grade 5", "Monday", vec![make_period("Math")])
            .unwrap();
        store
            .add_timetable("grade 5", "Tuesday", vec![make_period("Art")])
            .unwrap();
        store.mark_attendance("7", "Monday", &[]).unwrap();
        store.mark_attendance("7", "Tuesday", &[]).unwrap();

        let text = compile_student_update(&store, "7", None, None);
        assert!(text.contains("Attendance (Tuesday):"));
        assert!(text.contains("- Art: Pending"));
    }

    #[test]
    fn test_diary_section_numbering() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();
        store
            .set_shared_homework(
                "Monday",
                vec![
                    HomeworkTask {
                        subject: "Math".to_string(),
                        homework: "p. 42".to_string(),
                    },
                    HomeworkTask {
                        subject: "Science".to_string(),
                        homework: "read ch. 3".to_string(),
                    },
                ],
            )
            .unwrap();
        store.mark_homework("7", "Monday", &[1], &[]).unwrap();

        let text = compile_student_update(&store, "7", Some("Monday"), None);
        assert!(text.contains("Homework Diary (Monday):"));
        assert!(text.contains("- 1. Math: p. 42 [Pending]"));
        assert!(text.contains("- 2. Science: read ch. 3 [Completed]"));
    }

    #[test]
    fn test_daily_report_section() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();
        store
            .log_daily_report(
                "7",
                "01-09-2025",
                "yes",
                vec![Activity {
                    activity: "Painting".to_string(),
                    remark: "Great".to_string(),
                }],
            )
            .unwrap();
        store
            .log_daily_report("7", "02-09-2025", "no", vec![])
            .unwrap();

        // Explicit, existing date
        let text = compile_student_update(&store, "7", None, Some("01-09-2025"));
        assert!(text.contains("Daily Report (01-09-2025):"));
        assert!(text.contains("Lunch: Yes"));
        assert!(text.contains("- Painting: Great"));

        // Unknown date falls back to the latest inserted one
        let text = compile_student_update(&store, "7", None, Some("09-09-2025"));
        assert!(text.contains("Daily Report (02-09-2025):"));
        assert!(text.contains("Lunch: No"));
        assert!(text.contains("(No activities)"));
    }

    #[test]
    fn test_behavior_section_lists_all() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();
        store
            .record_behavior("7", Some("good"), None, "Helped tidy up".to_string())
            .unwrap();
        store
            .record_behavior("7", None, Some("noisy"), String::new())
            .unwrap();

        let text = compile_student_update(&store, "7", None, None);
        assert!(text.contains("Behavior Records:"));
        assert!(text
            .contains("- With Teacher: Good; With Classmates: Neutral; Note: Helped tidy up"));
        assert!(text.contains("- With Teacher: Neutral; With Classmates: Noisy; Note: "));
    }

    #[test]
    fn test_section_separators_present() {
        let mut store = SchoolStore::new();
        store.add_student("7", make_student("Grade 5")).unwrap();

        let text = compile_student_update(&store, "7", None, None);
        assert_eq!(text.matches("----------------------\n").count(), 4);
        assert!(text.ends_with("No behavior records.\n"));
    }
}
