use crate::model::{Period, PeriodKind, ScheduleEntry};

/// A proposed entry: either brand new (`entry_id: None`) or an edit, in which
/// case the entry's own row is excluded from the comparison set so an
/// unchanged re-save never conflicts with itself.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entry_id: Option<&'a str>,
    pub school_id: &'a str,
    pub academic_year_id: &'a str,
    pub academic_term_id: &'a str,
    pub class_id: &'a str,
    pub teacher_id: &'a str,
    pub day: &'a str,
    pub period_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// The class already has a subject in this day/period slot.
    ClassBusy { other_entry_id: String },
    /// The teacher is already scheduled elsewhere in this day/period slot.
    TeacherBusy { other_entry_id: String },
    /// The period id does not resolve to a period at the candidate's school.
    UnknownPeriod,
    /// The period exists but is a break; breaks are never scheduled.
    NotTeachingPeriod,
}

/// Checks one candidate against a snapshot of existing entries and the
/// school's period registry. Pure; persistence and locking are the caller's
/// problem. Violations short-circuit, class occupancy checked before teacher
/// occupancy.
pub fn check_candidate(
    candidate: &Candidate,
    existing: &[ScheduleEntry],
    periods: &[Period],
) -> Result<(), Conflict> {
    let in_scope = |e: &&ScheduleEntry| {
        e.school_id == candidate.school_id
            && e.academic_year_id == candidate.academic_year_id
            && e.academic_term_id == candidate.academic_term_id
            && candidate.entry_id != Some(e.id.as_str())
    };
    let same_slot =
        |e: &&ScheduleEntry| e.day == candidate.day && e.period_id == candidate.period_id;

    if let Some(hit) = existing
        .iter()
        .filter(in_scope)
        .find(|e| e.class_id == candidate.class_id && same_slot(e))
    {
        return Err(Conflict::ClassBusy {
            other_entry_id: hit.id.clone(),
        });
    }

    if let Some(hit) = existing
        .iter()
        .filter(in_scope)
        .find(|e| e.teacher_id == candidate.teacher_id && same_slot(e))
    {
        return Err(Conflict::TeacherBusy {
            other_entry_id: hit.id.clone(),
        });
    }

    match periods
        .iter()
        .find(|p| p.id == candidate.period_id && p.school_id == candidate.school_id)
    {
        None => Err(Conflict::UnknownPeriod),
        Some(p) if p.kind != PeriodKind::Class => Err(Conflict::NotTeachingPeriod),
        Some(_) => Ok(()),
    }
}
