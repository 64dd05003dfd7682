//! Display labels and attachment colours for activity action kinds.

pub const DELETE_ACTION: &str = "delete";

const FALLBACK_COLOR: &str = "#9e9e9e";

const CATALOG: &[(&str, &str, &str)] = &[
    ("create", "作成", "#2eb886"),
    ("edit", "編集", "#3aa3e3"),
    ("move", "移動", "#7e57c2"),
    ("rename", "名前変更", "#5c6bc0"),
    (DELETE_ACTION, "削除", "#e01e5a"),
    ("restore", "復元", "#26a69a"),
    ("permissionChange", "権限変更", "#ecb22e"),
    ("comment", "コメント", "#8d6e63"),
    ("dlpChange", "DLP変更", "#ff7043"),
    ("reference", "参照", "#78909c"),
    ("settingsChange", "設定変更", "#ffa726"),
    ("appliedLabelChange", "ラベル変更", "#ab47bc"),
];

fn lookup(action: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    CATALOG.iter().find(|(kind, _, _)| *kind == action)
}

/// Localized label for `action`; unknown kinds are shown as-is.
pub fn action_label(action: &str) -> String {
    lookup(action)
        .map(|(_, label, _)| label.to_string())
        .unwrap_or_else(|| action.to_string())
}

pub fn action_color(action: &str) -> &'static str {
    lookup(action)
        .map(|(_, _, color)| *color)
        .unwrap_or(FALLBACK_COLOR)
}
