//! Detects pagination gaps in fetched comment trees.
//!
//! Depth- and count-limited comment fetches can deliver a comment whose
//! server-reported `child_count` promises children the batch does not
//! contain. Flagged comments are a signal for follow-up subtree fetches,
//! not an error.

use std::collections::HashMap;

use crate::api::CommentView;
use crate::comment_path::CommentPath;

/// Returns, in input order, every comment whose `child_count` exceeds the
/// number of its direct children present in the batch. Only immediate
/// children count; grandchildren do not satisfy a parent's tally. A comment
/// reporting `child_count == 0` is never flagged. Comments with unparsable
/// paths are skipped and logged (server data is skip-not-fatal territory).
pub fn find_comments_with_missing_children(views: &[CommentView]) -> Vec<CommentView> {
    let mut parsed: Vec<Option<CommentPath>> = Vec::with_capacity(views.len());
    let mut direct_children: HashMap<CommentPath, i64> = HashMap::new();

    for view in views {
        match view.comment.path.parse::<CommentPath>() {
            Ok(path) => {
                if let Some(parent) = path.parent() {
                    *direct_children.entry(parent).or_insert(0) += 1;
                }
                parsed.push(Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    comment_id = view.comment.id,
                    path = %view.comment.path,
                    error = %err,
                    "skipping comment with unparsable path"
                );
                parsed.push(None);
            }
        }
    }

    views
        .iter()
        .zip(parsed)
        .filter_map(|(view, path)| {
            let path = path?;
            if view.counts.child_count == 0 {
                return None;
            }
            let present = direct_children.get(&path).copied().unwrap_or(0);
            if present < view.counts.child_count {
                Some(view.clone())
            } else {
                None
            }
        })
        .collect()
}
