use std::collections::HashMap;

use crate::model::{Day, Period, PeriodKind, ScheduleEntry};

/// Display names for reference data the host application owns. Missing names
/// fall back to the raw id so the grid is still usable mid-sync.
#[derive(Debug, Default)]
pub struct RefNames {
    pub subjects: HashMap<String, String>,
    pub teachers: HashMap<String, String>,
    pub classes: HashMap<String, String>,
}

impl RefNames {
    fn subject(&self, id: &str) -> String {
        self.subjects.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn teacher(&self, id: &str) -> String {
        self.teachers.get(id).cloned().unwrap_or_else(|| id.to_string())
    }

    fn class(&self, id: &str) -> String {
        self.classes.get(id).cloned().unwrap_or_else(|| id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridCell {
    /// The whole row is a break period; nothing can ever be scheduled here.
    Break,
    /// Teaching period with no entry for this day.
    Empty,
    Lesson {
        entry_id: String,
        subject: String,
        teacher: String,
        class: String,
        room: String,
    },
}

#[derive(Debug, Clone)]
pub struct GridRow {
    pub period_id: String,
    pub label: String,
    pub start_time: String,
    pub end_time: String,
    pub kind: PeriodKind,
    /// One cell per day, aligned with the `days` argument to [`render_grid`].
    pub cells: Vec<GridCell>,
}

/// Projects a set of entries onto a day-by-period grid. Read-only transform:
/// uniqueness inside a cell is guaranteed upstream by the conflict check, so
/// a plain first-match lookup is enough.
pub fn render_grid(
    entries: &[ScheduleEntry],
    periods: &[Period],
    days: &[Day],
    names: &RefNames,
) -> Vec<GridRow> {
    let mut ordered: Vec<&Period> = periods.iter().collect();
    ordered.sort_by_key(|p| p.order_index);

    ordered
        .iter()
        .map(|period| {
            let cells = days
                .iter()
                .map(|day| {
                    if period.kind == PeriodKind::Break {
                        return GridCell::Break;
                    }
                    match entries
                        .iter()
                        .find(|e| e.day == day.token() && e.period_id == period.id)
                    {
                        Some(e) => GridCell::Lesson {
                            entry_id: e.id.clone(),
                            subject: names.subject(&e.subject_id),
                            teacher: names.teacher(&e.teacher_id),
                            class: names.class(&e.class_id),
                            room: e.room.clone(),
                        },
                        None => GridCell::Empty,
                    }
                })
                .collect();

            GridRow {
                period_id: period.id.clone(),
                label: period.label.clone(),
                start_time: period.start_time.clone(),
                end_time: period.end_time.clone(),
                kind: period.kind,
                cells,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(id: &str, kind: PeriodKind, order_index: i64) -> Period {
        Period {
            id: id.to_string(),
            school_id: "s1".to_string(),
            label: format!("Period {}", id),
            start_time: "08:00".to_string(),
            end_time: "09:00".to_string(),
            kind,
            order_index,
            updated_at: None,
        }
    }

    fn entry(id: &str, day: &str, period_id: &str) -> ScheduleEntry {
        ScheduleEntry {
            id: id.to_string(),
            school_id: "s1".to_string(),
            academic_year_id: "y1".to_string(),
            academic_term_id: "t1".to_string(),
            class_id: "c1".to_string(),
            subject_id: "sub1".to_string(),
            teacher_id: "te1".to_string(),
            day: day.to_string(),
            period_id: period_id.to_string(),
            room: "101".to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn rows_follow_order_index_not_input_order() {
        let periods = [
            period("p2", PeriodKind::Class, 1),
            period("p1", PeriodKind::Class, 0),
        ];
        let rows = render_grid(&[], &periods, &Day::ALL, &RefNames::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period_id, "p1");
        assert_eq!(rows[1].period_id, "p2");
    }

    #[test]
    fn break_rows_are_marked_on_every_day() {
        let periods = [period("lunch", PeriodKind::Break, 0)];
        let rows = render_grid(&[], &periods, &Day::ALL, &RefNames::default());
        assert_eq!(rows[0].cells.len(), 5);
        assert!(rows[0].cells.iter().all(|c| *c == GridCell::Break));
    }

    #[test]
    fn lesson_cells_resolve_names_with_id_fallback() {
        let periods = [period("p1", PeriodKind::Class, 0)];
        let entries = [entry("e1", "monday", "p1")];
        let mut names = RefNames::default();
        names.subjects.insert("sub1".to_string(), "Maths".to_string());
        names.teachers.insert("te1".to_string(), "A. Mensah".to_string());
        // No class name supplied: the raw id is shown.

        let rows = render_grid(&entries, &periods, &Day::ALL, &names);
        match &rows[0].cells[0] {
            GridCell::Lesson {
                entry_id,
                subject,
                teacher,
                class,
                room,
            } => {
                assert_eq!(entry_id, "e1");
                assert_eq!(subject, "Maths");
                assert_eq!(teacher, "A. Mensah");
                assert_eq!(class, "c1");
                assert_eq!(room, "101");
            }
            other => panic!("expected lesson cell, got {:?}", other),
        }
        // Remaining weekdays are unassigned teaching slots.
        assert!(rows[0].cells[1..].iter().all(|c| *c == GridCell::Empty));
    }

    #[test]
    fn empty_registry_renders_no_rows() {
        let rows = render_grid(&[], &[], &Day::ALL, &RefNames::default());
        assert!(rows.is_empty());
    }
}
