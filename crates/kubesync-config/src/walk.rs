//! In-place traversal of document string leaves.

use kubesync_core::{Document, Scalar};

/// Walk every string leaf of `document`, replacing the ones accepted by
/// `matches` with the value returned by `replace`.
///
/// The accumulator is threaded through each `replace` call and returned
/// once the walk finishes. Leaf paths render as `a.b[0].c`; a root string
/// is visited with an empty path. The first error stops the walk, leaving
/// leaves visited so far already replaced.
pub fn walk<A, E, M, F>(
    document: &mut Document,
    init: A,
    matches: M,
    mut replace: F,
) -> Result<A, E>
where
    M: Fn(&str, &str) -> bool,
    F: FnMut(A, &str, &str) -> Result<(A, Document), E>,
{
    walk_node(document, "", init, &matches, &mut replace)
}

fn walk_node<A, E, M, F>(
    node: &mut Document,
    path: &str,
    acc: A,
    matches: &M,
    replace: &mut F,
) -> Result<A, E>
where
    M: Fn(&str, &str) -> bool,
    F: FnMut(A, &str, &str) -> Result<(A, Document), E>,
{
    match node {
        Document::Mapping(map) => {
            let mut acc = acc;
            for (key, child) in map.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                acc = walk_node(child, &child_path, acc, matches, replace)?;
            }
            Ok(acc)
        }
        Document::Sequence(items) => {
            let mut acc = acc;
            for (index, child) in items.iter_mut().enumerate() {
                let child_path = format!("{}[{}]", path, index);
                acc = walk_node(child, &child_path, acc, matches, replace)?;
            }
            Ok(acc)
        }
        Document::Scalar(Scalar::String(value)) => {
            if !matches(path, value) {
                return Ok(acc);
            }
            let (acc, replacement) = replace(acc, path, value)?;
            *node = replacement;
            Ok(acc)
        }
        Document::Scalar(_) => Ok(acc),
    }
}
