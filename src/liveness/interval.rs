use super::FunctionLiveness;

/// The line range over which a variable's value must stay available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInterval {
    pub var: String,
    /// Line of the first definition.
    pub start: usize,
    /// Line of the last use. Always `>= start`.
    pub end: usize,
    /// True when a call instruction lies strictly inside the interval, so
    /// a caller-saved register would need a save/restore around it.
    pub spans_call: bool,
}

/// Build the allocatable intervals for a function, sorted ascending by
/// start line (ties keep first-def order).
///
/// The first `reserved_formals` parameters are excluded: they are
/// pre-assigned to argument registers and never compete for the general
/// pools. Dead variables (no use, or a use before the def) are excluded
/// as well, so every emitted interval satisfies `start <= end`.
pub fn build_intervals(live: &FunctionLiveness, reserved_formals: usize) -> Vec<LiveInterval> {
    let reserved = &live.formals[..reserved_formals.min(live.formals.len())];

    let mut intervals: Vec<LiveInterval> = live
        .defined_vars()
        .filter(|(var, _)| !reserved.contains(*var))
        .filter_map(|(var, def)| {
            let use_line = live.use_line(var)?;
            if use_line < def {
                return None;
            }
            Some(LiveInterval {
                var: var.clone(),
                start: def,
                end: use_line,
                spans_call: live.has_call_between(def, use_line),
            })
        })
        .collect();

    intervals.sort_by_key(|interval| interval.start);
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Function, Instr, Op};
    use crate::liveness::analyze;

    fn interval_for<'a>(intervals: &'a [LiveInterval], var: &str) -> Option<&'a LiveInterval> {
        intervals.iter().find(|i| i.var == var)
    }

    fn func(params: Vec<&str>, body: Vec<Instr>, ret: &str) -> Function {
        Function {
            name: "F".to_string(),
            params: params.into_iter().map(|p| p.to_string()).collect(),
            body,
            ret: ret.to_string(),
        }
    }

    #[test]
    fn test_intervals_are_valid_and_sorted() {
        let f = func(
            vec![],
            vec![
                Instr::Const("a".into(), 1),                          // 1
                Instr::Const("b".into(), 2),                          // 2
                Instr::BinOp("c".into(), "a".into(), Op::Add, "b".into()), // 3
                Instr::Print("c".into()),                             // 4
            ],
            "c",
        );
        let intervals = build_intervals(&analyze(&f), 6);

        assert!(intervals.windows(2).all(|w| w[0].start <= w[1].start));
        for interval in &intervals {
            assert!(interval.start <= interval.end, "{interval:?}");
        }
        assert_eq!(interval_for(&intervals, "a").unwrap().end, 3);
        assert_eq!(interval_for(&intervals, "c").unwrap().end, 5);
    }

    #[test]
    fn test_dead_variables_are_excluded() {
        let f = func(
            vec![],
            vec![
                Instr::Const("used".into(), 1),
                Instr::Const("unused".into(), 2),
                Instr::Print("used".into()),
            ],
            "used",
        );
        let intervals = build_intervals(&analyze(&f), 6);
        assert!(interval_for(&intervals, "unused").is_none());
        assert!(interval_for(&intervals, "used").is_some());
    }

    #[test]
    fn test_reserved_formals_are_excluded() {
        let f = func(
            vec!["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"],
            vec![
                Instr::BinOp("x".into(), "p0".into(), Op::Add, "p6".into()),
                Instr::Print("x".into()),
            ],
            "x",
        );
        let intervals = build_intervals(&analyze(&f), 6);
        // The first six formals are pre-assigned; the rest compete.
        assert!(interval_for(&intervals, "p0").is_none());
        assert!(interval_for(&intervals, "p5").is_none());
        assert!(interval_for(&intervals, "p6").is_some());
        // p7 is never used, hence dead.
        assert!(interval_for(&intervals, "p7").is_none());
    }

    #[test]
    fn test_spans_call_is_strict() {
        let f = func(
            vec![],
            vec![
                Instr::Const("x".into(), 1),                       // 1
                Instr::FuncAddr("f".into(), "G".into()),           // 2
                Instr::Call {
                    dst: "r".into(),
                    callee: "f".into(),
                    args: vec![],
                },                                                 // 3
                Instr::Print("x".into()),                          // 4
                Instr::Print("r".into()),                          // 5
            ],
            "r",
        );
        let intervals = build_intervals(&analyze(&f), 6);
        // x: [1, 4] with a call at 3 strictly inside.
        assert!(interval_for(&intervals, "x").unwrap().spans_call);
        // f: [2, 3] ends at the call, does not span it.
        assert!(!interval_for(&intervals, "f").unwrap().spans_call);
        // r: [3, 6] starts at the call, does not span it.
        assert!(!interval_for(&intervals, "r").unwrap().spans_call);
    }
}
