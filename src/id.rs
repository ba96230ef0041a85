//! Element identity. Ids are 32-bit hashes of string labels, optionally
//! mixed with an index or a parent seed so loops and reusable components
//! produce distinct ids from one label.

use crate::text::TextConfig;

/// A hashed element identifier.
///
/// `id` is the fully mixed hash used for registry lookups. `base_id` is the
/// label-only hash shared by every indexed variation of the same label, and
/// `offset` is the index that was mixed in. `string_id` keeps the original
/// label for debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementId {
    pub id: u32,
    pub offset: u32,
    pub base_id: u32,
    pub string_id: &'static str,
}

impl ElementId {
    /// Hashes `label` into an id. Equal labels always produce equal ids.
    #[inline]
    pub fn new(label: &'static str) -> Self {
        hash_string_with_offset(label, 0, 0)
    }

    /// Hashes `label` mixed with `index`, for elements declared in loops.
    /// All indices share the same `base_id`.
    #[inline]
    pub fn new_index(label: &'static str, index: u32) -> Self {
        hash_string_with_offset(label, index, 0)
    }

    /// Hashes `label` with `index`, seeded by `seed`. Used for ids that must
    /// be unique per ancestor, e.g. the same component instantiated under
    /// different parents.
    #[inline]
    pub fn new_index_seeded(label: &'static str, index: u32, seed: u32) -> Self {
        hash_string_with_offset(label, index, seed)
    }
}

impl From<&'static str> for ElementId {
    fn from(label: &'static str) -> Self {
        ElementId::new(label)
    }
}

/// One-shot string hash. Folds every byte, then finalizes. The id and
/// base id come out identical since no index is mixed in.
pub(crate) fn hash_string(key: &str, seed: u32) -> ElementId {
    let mut hash = seed;
    for byte in key.bytes() {
        hash = hash.wrapping_add(byte as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);

    ElementId {
        id: hash.wrapping_add(1),
        offset: 0,
        base_id: hash.wrapping_add(1),
        string_id: "",
    }
}

/// String hash with an index folded in after the label bytes. The label-only
/// hash is finalized in parallel so `base_id` stays stable across indices.
pub(crate) fn hash_string_with_offset(key: &'static str, offset: u32, seed: u32) -> ElementId {
    let mut base = seed;
    for byte in key.bytes() {
        base = base.wrapping_add(byte as u32);
        base = base.wrapping_add(base << 10);
        base ^= base >> 6;
    }

    let mut hash = base.wrapping_add(offset);
    hash = hash.wrapping_add(hash << 10);
    hash ^= hash >> 6;

    hash = hash.wrapping_add(hash << 3);
    base = base.wrapping_add(base << 3);
    hash ^= hash >> 11;
    base ^= base >> 11;
    hash = hash.wrapping_add(hash << 15);
    base = base.wrapping_add(base << 15);

    ElementId {
        id: hash.wrapping_add(1),
        offset,
        base_id: base.wrapping_add(1),
        string_id: key,
    }
}

/// Numeric hash for derived ids: anonymous elements, wrapped text lines and
/// clip command ids. `seed` is normally the parent element's id.
pub(crate) fn hash_number(offset: u32, seed: u32) -> ElementId {
    let mut hash = seed;
    hash = hash.wrapping_add(offset.wrapping_add(48));
    hash = hash.wrapping_add(hash << 10);
    hash ^= hash >> 6;

    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);

    ElementId {
        id: hash.wrapping_add(1),
        offset,
        base_id: seed,
        string_id: "",
    }
}

/// Cache key for measured text. Folds the content bytes (capped so huge
/// strings stay cheap to key) together with every styling field that can
/// change measurement or wrapping.
pub(crate) fn hash_text_with_config(text: &str, config: &TextConfig) -> u32 {
    let mut hash: u32 = 0;
    for byte in text.bytes().take(256) {
        hash = hash.wrapping_add(byte as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    for field in [
        text.len() as u32,
        config.font_id as u32,
        config.font_size as u32,
        config.line_height as u32,
        config.letter_spacing as u32,
        config.wrap_mode as u32,
    ] {
        hash = hash.wrapping_add(field);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash.wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_label_same_id() {
        assert_eq!(ElementId::new("SideBar"), ElementId::new("SideBar"));
    }

    #[test]
    fn different_labels_differ() {
        assert_ne!(ElementId::new("SideBar").id, ElementId::new("TopBar").id);
    }

    #[test]
    fn index_changes_id_but_not_base() {
        let a = ElementId::new_index("ListItem", 0);
        let b = ElementId::new_index("ListItem", 7);
        assert_ne!(a.id, b.id);
        assert_eq!(a.base_id, b.base_id);
        assert_eq!(b.offset, 7);
    }

    #[test]
    fn seed_changes_everything() {
        let a = ElementId::new_index_seeded("Row", 2, 11);
        let b = ElementId::new_index_seeded("Row", 2, 12);
        assert_ne!(a.id, b.id);
        assert_ne!(a.base_id, b.base_id);
    }

    #[test]
    fn number_hash_distinct_per_offset_and_seed() {
        let a = hash_number(0, 99);
        let b = hash_number(1, 99);
        let c = hash_number(0, 100);
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.base_id, 99);
    }

    #[test]
    fn ids_are_never_zero() {
        // Zero is reserved as the "no element" sentinel.
        assert_ne!(ElementId::new("").id, 0);
        assert_ne!(hash_number(0, 0).id, 0);
        assert_ne!(hash_string("", 0).id, 0);
    }

    #[test]
    fn text_cache_key_tracks_content_and_style() {
        let mut config = TextConfig::default();
        let key = hash_text_with_config("hello world", &config);
        assert_eq!(key, hash_text_with_config("hello world", &config));
        assert_ne!(key, hash_text_with_config("hello, world", &config));
        config.font_size = 24;
        assert_ne!(key, hash_text_with_config("hello world", &config));
    }
}
