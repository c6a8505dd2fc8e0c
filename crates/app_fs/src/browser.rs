//! Folder browser - filtered, sorted listings of any folder entity

use crate::entity::Entity;
use crate::file_operations::FileSystem;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort key for folder listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Name,
    Size,
    Modified,
    /// File type, i.e. extension
    Type,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Options for listing folder contents
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub show_hidden: bool,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    /// Folders (including archives) before files, whatever the sort order
    pub directories_first: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            sort_by: SortBy::Name,
            sort_order: SortOrder::Ascending,
            directories_first: true,
        }
    }
}

/// List a folder's children, filtered and sorted
pub fn list_directory(fs: &FileSystem, folder: &Entity, options: &ListOptions) -> Result<Vec<Entity>> {
    let mut entries: Vec<Entity> = fs
        .files(folder)?
        .into_iter()
        .filter(|e| options.show_hidden || !e.is_hidden())
        .collect();

    sort_entries(&mut entries, options);
    Ok(entries)
}

/// Name as shown in a listing, with or without the file extension
pub fn display_label(entity: &Entity, show_extensions: bool) -> &str {
    if show_extensions {
        entity.display_name()
    } else {
        entity.base_name()
    }
}

fn sort_entries(entries: &mut [Entity], options: &ListOptions) {
    entries.sort_by(|a, b| {
        if options.directories_first && a.is_folder() != b.is_folder() {
            return if a.is_folder() { Ordering::Less } else { Ordering::Greater };
        }

        let by_name = || natural_sort_key(a.display_name()).cmp(&natural_sort_key(b.display_name()));
        let cmp = match options.sort_by {
            SortBy::Name => by_name(),
            SortBy::Size => a.size().cmp(&b.size()).then_with(by_name),
            SortBy::Modified => a.modified().cmp(&b.modified()).then_with(by_name),
            SortBy::Type => {
                let ext_a = a.extension().map(str::to_lowercase);
                let ext_b = b.extension().map(str::to_lowercase);
                ext_a.cmp(&ext_b).then_with(by_name)
            }
        };

        match options.sort_order {
            SortOrder::Ascending => cmp,
            SortOrder::Descending => cmp.reverse(),
        }
    });
}

/// Generate a natural sort key (handles numbers correctly)
/// "image2.jpg" < "image10.jpg"
pub fn natural_sort_key(s: &str) -> Vec<NaturalSortPart> {
    let mut parts = Vec::new();
    let mut current_num = String::new();
    let mut current_str = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            if !current_str.is_empty() {
                parts.push(NaturalSortPart::Str(current_str.to_lowercase()));
                current_str.clear();
            }
            current_num.push(c);
        } else {
            if !current_num.is_empty() {
                parts.push(number_part(&current_num));
                current_num.clear();
            }
            current_str.push(c);
        }
    }

    if !current_num.is_empty() {
        parts.push(number_part(&current_num));
    }
    if !current_str.is_empty() {
        parts.push(NaturalSortPart::Str(current_str.to_lowercase()));
    }

    parts
}

/// Digit runs too long for u64 compare as text
fn number_part(digits: &str) -> NaturalSortPart {
    match digits.parse::<u64>() {
        Ok(n) => NaturalSortPart::Num(n),
        Err(_) => NaturalSortPart::Str(digits.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum NaturalSortPart {
    Num(u64),
    Str(String),
}
