//! Editor file list reducer

use std::collections::HashSet;
use std::sync::Arc;

use crate::action::Action;

pub(crate) fn reduce(files: &Arc<Vec<String>>, action: &Action) -> Arc<Vec<String>> {
    let Action::SetEditorFiles(incoming) = action else {
        return files.clone();
    };

    let mut seen = HashSet::new();
    let deduped: Vec<String> = incoming
        .iter()
        .filter(|file| seen.insert(file.as_str()))
        .cloned()
        .collect();

    if **files == deduped {
        files.clone()
    } else {
        Arc::new(deduped)
    }
}
