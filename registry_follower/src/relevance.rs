use crate::entry::PackageEntry;

/// Only entries that point at a repository somewhere are worth keeping; most of the
/// feed carries no usable link.
pub fn is_relevant(entry: Option<&PackageEntry>) -> bool {
    entry.is_some_and(PackageEntry::has_repo)
}
