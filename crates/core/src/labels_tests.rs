// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_all_status_labels() {
    for status in LabelStatus::PRECEDENCE {
        let label = status.label();
        assert_eq!(parse_status_label(&label), Some(status));
    }
}

#[test]
fn rejects_unknown_status_label() {
    assert_eq!(parse_status_label("ralph:status:bogus"), None);
    assert_eq!(parse_status_label("ralph:priority:p0"), None);
}

#[test]
fn parses_all_cmd_labels() {
    for cmd in [CmdLabel::Queue, CmdLabel::Pause, CmdLabel::Stop, CmdLabel::Satisfy] {
        assert_eq!(parse_cmd_label(&cmd.label()), Some(cmd));
    }
}

#[test]
fn count_status_labels_ignores_other_prefixes() {
    let labels = Labels::from_iter([
        "ralph:status:queued",
        "ralph:priority:p1",
        "ralph:cmd:pause",
    ]);
    assert_eq!(labels.count_status_labels(), 1);
}

#[test]
fn detects_multiple_status_labels() {
    let labels =
        Labels::from_iter(["ralph:status:queued", "ralph:status:in-progress"]);
    assert_eq!(labels.count_status_labels(), 2);
}

#[test]
fn delta_signature_drops_remove_entries_also_added() {
    let delta = LabelDelta {
        add: vec!["ralph:status:queued".into()],
        remove: vec!["ralph:status:queued".into(), "ralph:status:paused".into()],
    };
    let (add, remove) = delta.signature();
    assert_eq!(add, vec!["ralph:status:queued".to_string()]);
    assert_eq!(remove, vec!["ralph:status:paused".to_string()]);
}

#[test]
fn delta_signature_is_order_independent() {
    let a = LabelDelta { add: vec!["b".into(), "a".into()], remove: vec![] };
    let b = LabelDelta { add: vec!["a".into(), "b".into()], remove: vec![] };
    assert_eq!(a.signature(), b.signature());
}

#[test]
fn empty_delta_reports_empty() {
    assert!(LabelDelta::default().is_empty());
}
