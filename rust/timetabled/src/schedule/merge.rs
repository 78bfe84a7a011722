use super::model::{Event, MergedEvent};

/// Collapses one day's events into display blocks.
///
/// Events are stably sorted by start time, then scanned left to right: an
/// event that starts exactly where the current block ends and shares its
/// subject, branch and direction extends that block. Anything else closes
/// the block. Overlapping events that do not qualify stay separate.
pub fn merge_day(events: &[Event]) -> Vec<MergedEvent> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| e.start_time);

    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    let mut current = start_block(first);
    for next in iter {
        if current.continues_into(next) {
            current.end_time = next.end_time;
            union_into(&mut current.teacher_names, &next.teacher_names);
            union_into(&mut current.student_names, &next.student_names);
        } else {
            merged.push(std::mem::replace(&mut current, start_block(next)));
        }
    }
    merged.push(current);
    merged
}

fn start_block(event: &Event) -> MergedEvent {
    let mut block = event.clone();
    block.teacher_names = Vec::with_capacity(event.teacher_names.len());
    block.student_names = Vec::with_capacity(event.student_names.len());
    union_into(&mut block.teacher_names, &event.teacher_names);
    union_into(&mut block.student_names, &event.student_names);
    block
}

/// Appends names not already present, keeping first-seen order.
fn union_into(dst: &mut Vec<String>, src: &[String]) {
    for name in src {
        if !dst.contains(name) {
            dst.push(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::model::{ClockTime, Weekday};
    use proptest::prelude::*;

    fn t(s: &str) -> ClockTime {
        ClockTime::parse(s).expect("time")
    }

    fn ev(id: &str, start: &str, end: &str, subject: &str) -> Event {
        Event {
            id: id.to_string(),
            day: Weekday::Monday,
            start_time: t(start),
            end_time: t(end),
            subject: subject.to_string(),
            branch_id: "branchA".to_string(),
            direction: "DirX".to_string(),
            teacher_names: vec![],
            student_names: vec![],
        }
    }

    #[test]
    fn contiguous_same_subject_runs_merge() {
        let out = merge_day(&[
            ev("1", "09:00", "10:00", "Math"),
            ev("2", "10:00", "11:00", "Math"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "1");
        assert_eq!(out[0].start_time, t("09:00"));
        assert_eq!(out[0].end_time, t("11:00"));
    }

    #[test]
    fn different_subject_breaks_the_run() {
        let out = merge_day(&[
            ev("1", "09:00", "10:00", "Math"),
            ev("2", "10:00", "11:00", "Physics"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].subject, "Physics");
    }

    #[test]
    fn branch_and_direction_must_match() {
        let mut other_branch = ev("2", "10:00", "11:00", "Math");
        other_branch.branch_id = "branchB".into();
        let mut other_direction = ev("3", "11:00", "12:00", "Math");
        other_direction.direction = "DirY".into();
        let out = merge_day(&[ev("1", "09:00", "10:00", "Math"), other_branch, other_direction]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn gap_prevents_merge() {
        let out = merge_day(&[
            ev("1", "09:00", "10:00", "Math"),
            ev("2", "10:05", "11:00", "Math"),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn input_is_sorted_before_scanning() {
        let out = merge_day(&[
            ev("late", "10:00", "11:00", "Math"),
            ev("early", "09:00", "10:00", "Math"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "early");
        assert_eq!(out[0].end_time, t("11:00"));
    }

    #[test]
    fn equal_start_times_keep_input_order() {
        let out = merge_day(&[
            ev("b", "09:00", "10:00", "Biology"),
            ev("a", "09:00", "10:00", "Art"),
        ]);
        let ids: Vec<&str> = out.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn broken_run_is_not_rejoined() {
        // Math 9-10, Art 10-11, Math 10-11: the second Math starts where the
        // first ended but Art closed the block in between.
        let out = merge_day(&[
            ev("1", "09:00", "10:00", "Math"),
            ev("2", "10:00", "11:00", "Art"),
            ev("3", "10:00", "11:00", "Math"),
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].end_time, t("10:00"));
    }

    #[test]
    fn people_lists_are_deduplicated_unions() {
        let mut a = ev("1", "09:00", "10:00", "Math");
        a.teacher_names = vec!["Karimov".into(), "Karimov".into()];
        a.student_names = vec!["Ali".into(), "Vali".into()];
        let mut b = ev("2", "10:00", "11:00", "Math");
        b.teacher_names = vec!["Saidova".into(), "Karimov".into()];
        b.student_names = vec!["Vali".into(), "Guli".into()];

        let out = merge_day(&[a, b]);
        assert_eq!(out[0].teacher_names, vec!["Karimov", "Saidova"]);
        assert_eq!(out[0].student_names, vec!["Ali", "Vali", "Guli"]);
    }

    #[test]
    fn empty_day_yields_no_blocks() {
        assert!(merge_day(&[]).is_empty());
    }

    fn arb_day() -> impl Strategy<Value = Vec<Event>> {
        let one = (0u32..20, 1u32..4, 0usize..3, 0usize..2).prop_map(|(slot, len, subj, dir)| {
            let start = 8 * 60 + slot * 30;
            let end = start + len * 30;
            Event {
                id: String::new(),
                day: Weekday::Monday,
                start_time: ClockTime::new(start / 60, start % 60).expect("start"),
                end_time: ClockTime::new(end / 60, end % 60).expect("end"),
                subject: ["Math", "Physics", "Art"][subj].to_string(),
                branch_id: "branchA".to_string(),
                direction: ["DirX", "DirY"][dir].to_string(),
                teacher_names: vec![format!("T{}", subj)],
                student_names: vec![],
            }
        });
        prop::collection::vec(one, 0..24).prop_map(|mut v| {
            for (i, e) in v.iter_mut().enumerate() {
                e.id = format!("e{}", i);
            }
            v
        })
    }

    fn covered_minutes(events: &[Event]) -> Vec<bool> {
        let mut minutes = vec![false; 24 * 60];
        for e in events {
            let (s, end) = (
                e.start_time.minutes_since_midnight() as usize,
                e.end_time.minutes_since_midnight() as usize,
            );
            for m in minutes.iter_mut().take(end).skip(s) {
                *m = true;
            }
        }
        minutes
    }

    proptest! {
        #[test]
        fn prop_merge_never_grows(events in arb_day()) {
            prop_assert!(merge_day(&events).len() <= events.len());
        }

        #[test]
        fn prop_merge_preserves_time_coverage(events in arb_day()) {
            let merged = merge_day(&events);
            prop_assert_eq!(covered_minutes(&merged), covered_minutes(&events));
        }

        #[test]
        fn prop_merge_is_idempotent(events in arb_day()) {
            let once = merge_day(&events);
            let twice = merge_day(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
