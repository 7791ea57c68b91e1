//! Naming of revised siblings.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::{DocumentRef, DocumentStore, StorageError};

/// Trailing `-revNN` on a base name.
static REV_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)-rev\d+$").expect("valid revision suffix pattern"));

/// Strip an existing `-revNN` suffix so revising a revision continues its series.
pub fn revision_base(base: &str) -> &str {
    REV_SUFFIX
        .captures(base)
        .and_then(|caps| caps.get(1))
        .map_or(base, |m| m.as_str())
}

/// Whether `name` is a revision output (`<base>-revNN[.ext]`).
pub fn is_revision_name(name: &str) -> bool {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    revision_base(stem) != stem
}

/// Next free `<base>-revNN.md` among `siblings`.
///
/// `NN` is one more than the highest existing number for this base, starting at 01.
/// Fails when that number cannot be represented, so a name is never reused.
pub fn next_revision_name<S: AsRef<str>>(siblings: &[S], base: &str) -> Result<String, StorageError> {
    let base = revision_base(base);
    let pattern = format!(r"^{}-rev(\d+)(?:\.[^.]+)?$", regex::escape(base));
    let exhausted = || StorageError::RevisionsExhausted(base.to_string());

    let mut highest: u64 = 0;
    match Regex::new(&pattern) {
        Ok(re) => {
            for caps in siblings.iter().filter_map(|name| re.captures(name.as_ref())) {
                let number = caps[1].parse::<u64>().map_err(|_| exhausted())?;
                highest = highest.max(number);
            }
        }
        Err(e) => tracing::warn!(base, error = %e, "Could not build revision pattern"),
    }

    let next = highest.checked_add(1).ok_or_else(exhausted)?;
    Ok(format!("{}-rev{:02}.md", base, next))
}

/// Store-relative path for the next revision of `doc`.
///
/// A folder that cannot be listed counts as empty.
pub async fn next_revision_path(
    store: &dyn DocumentStore,
    doc: &DocumentRef,
) -> Result<PathBuf, StorageError> {
    let folder = doc.parent();
    let siblings = match store.list_names(folder).await {
        Ok(names) => names,
        Err(e) => {
            tracing::warn!(folder = %folder.display(), error = %e, "Treating unreadable folder as empty");
            Vec::new()
        }
    };

    Ok(folder.join(next_revision_name(&siblings, &doc.base_name())?))
}
