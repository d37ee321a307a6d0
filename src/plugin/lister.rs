use ignore::WalkBuilder;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Symlink,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Lists the immediate children of a directory.
pub trait DirLister {
    fn list(&self, path: &Path) -> Vec<ObservedEntry>;
}

/// One-level listing that never follows links.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLister;

impl DirLister for FsLister {
    fn list(&self, path: &Path) -> Vec<ObservedEntry> {
        WalkBuilder::new(path)
            .max_depth(Some(1))
            .standard_filters(false)
            .follow_links(false)
            .build()
            .flatten()
            .filter(|entry| entry.depth() > 0)
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                let file_type = entry.file_type()?;
                let kind = if entry.path_is_symlink() || file_type.is_symlink() {
                    EntryKind::Symlink
                } else if file_type.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::Other
                };
                Some(ObservedEntry { name, kind })
            })
            .collect()
    }
}
