//! Tag groups and tag sets
//!
//! A tag group is a named category (e.g. "Area") holding tags (e.g. "IN20",
//! "GUNB"). Groups and tags are addressed by id so they can be renamed
//! without invalidating the tag sets stored on PVs.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ModelError, Result};

pub type TagGroupId = u32;
pub type TagId = u32;

/// Tags attached to one PV: group id -> tag ids
pub type TagSet = BTreeMap<TagGroupId, BTreeSet<TagId>>;

/// Full definition of valid tags: group id -> group
pub type TagDef = BTreeMap<TagGroupId, TagGroup>;

/// One tag group and its member tags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: BTreeMap<TagId, String>,
}

impl TagGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (TagId, S)>,
        S: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(id, name)| (id, name.into())));
        self
    }

    /// Id of the tag called `name`
    pub fn tag_id(&self, name: &str) -> Option<TagId> {
        self.tags
            .iter()
            .find(|(_, tag)| tag.as_str() == name)
            .map(|(id, _)| *id)
    }
}

/// Next free id in an id-keyed map: max + 1, or 0 when empty
pub fn next_id<V>(map: &BTreeMap<u32, V>) -> u32 {
    map.keys().next_back().map(|id| id + 1).unwrap_or(0)
}

/// Whether every group of `sub` is contained in the same group of `sup`
///
/// Groups missing from `sup` count as empty sets.
pub fn is_subset(sub: &TagSet, sup: &TagSet) -> bool {
    sub.iter().all(|(group, tags)| match sup.get(group) {
        Some(other) => tags.is_subset(other),
        None => tags.is_empty(),
    })
}

/// Look up a tag group by name
pub fn find_group<'a>(def: &'a TagDef, name: &str) -> Option<(TagGroupId, &'a TagGroup)> {
    def.iter()
        .find(|(_, group)| group.name == name)
        .map(|(id, group)| (*id, group))
}

/// Map tag names of the group called `group_name` to ids
///
/// Every name must exist; the first unknown one is reported.
pub fn resolve_names<S: AsRef<str>>(
    def: &TagDef,
    group_name: &str,
    names: &[S],
) -> Result<(TagGroupId, BTreeSet<TagId>)> {
    let (group_id, group) = find_group(def, group_name)
        .ok_or_else(|| ModelError::UnknownTagGroup(group_name.to_string()))?;

    let mut ids = BTreeSet::new();
    for name in names {
        let name = name.as_ref();
        let id = group.tag_id(name).ok_or_else(|| ModelError::UnknownTag {
            group: group_name.to_string(),
            tag: name.to_string(),
        })?;
        ids.insert(id);
    }
    Ok((group_id, ids))
}

/// All tag ids of a tag set, flattened
pub fn flatten(tags: &TagSet) -> Vec<TagId> {
    tags.values().flat_map(|ids| ids.iter().copied()).collect()
}

/// Rebuild a tag set from flat tag ids using the group membership in `def`
///
/// Ids that belong to no group are dropped with a warning.
pub fn unflatten(def: &TagDef, ids: &[TagId]) -> TagSet {
    let mut owner: BTreeMap<TagId, TagGroupId> = BTreeMap::new();
    for (group_id, group) in def {
        for tag_id in group.tags.keys() {
            owner.insert(*tag_id, *group_id);
        }
    }

    let mut set = TagSet::new();
    for id in ids {
        match owner.get(id) {
            Some(group) => {
                set.entry(*group).or_default().insert(*id);
            },
            None => tracing::warn!("Tag id {} not found in tag definition", id),
        }
    }
    set
}

/// Human readable `group: tag, tag` pairs for a tag set
pub fn describe(def: &TagDef, tags: &TagSet) -> Vec<(String, Vec<String>)> {
    tags.iter()
        .filter(|(_, ids)| !ids.is_empty())
        .map(|(group_id, ids)| match def.get(group_id) {
            Some(group) => (
                group.name.clone(),
                ids.iter()
                    .map(|id| {
                        group
                            .tags
                            .get(id)
                            .cloned()
                            .unwrap_or_else(|| format!("#{}", id))
                    })
                    .collect(),
            ),
            None => (
                format!("#{}", group_id),
                ids.iter().map(|id| format!("#{}", id)).collect(),
            ),
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn sample_def() -> TagDef {
        let mut def = TagDef::new();
        def.insert(
            0,
            TagGroup::new("Area", "Machine area").with_tags([(0, "IN20"), (1, "GUNB")]),
        );
        def.insert(
            1,
            TagGroup::new("Subsystem", "").with_tags([(2, "Laser"), (3, "Timing")]),
        );
        def
    }

    fn set(pairs: &[(TagGroupId, &[TagId])]) -> TagSet {
        pairs
            .iter()
            .map(|(g, ids)| (*g, ids.iter().copied().collect()))
            .collect()
    }

    #[test]
    fn test_is_subset() {
        let small = set(&[(0, &[0])]);
        let big = set(&[(0, &[0, 1])]);
        assert!(is_subset(&small, &big));
        assert!(!is_subset(&big, &small));
        assert!(is_subset(&TagSet::new(), &small));
        // empty group on the left is satisfied by a missing group on the right
        assert!(is_subset(&set(&[(5, &[])]), &small));
        assert!(!is_subset(&set(&[(5, &[1])]), &small));
    }

    #[test]
    fn test_resolve_names() {
        let def = sample_def();
        let (group, ids) = resolve_names(&def, "Area", &["GUNB", "IN20"]).unwrap();
        assert_eq!(group, 0);
        assert_eq!(ids, BTreeSet::from([0, 1]));

        assert_eq!(
            resolve_names(&def, "Region", &["X"]).unwrap_err(),
            ModelError::UnknownTagGroup("Region".into())
        );
        assert!(matches!(
            resolve_names(&def, "Area", &["IN30"]).unwrap_err(),
            ModelError::UnknownTag { .. }
        ));
    }

    #[test]
    fn test_flatten_roundtrip_through_definition() {
        let def = sample_def();
        let tags = set(&[(0, &[1]), (1, &[2, 3])]);
        let flat = flatten(&tags);
        assert_eq!(flat, vec![1, 2, 3]);
        assert_eq!(unflatten(&def, &flat), tags);
        // unknown ids are dropped
        assert_eq!(unflatten(&def, &[99]), TagSet::new());
    }

    #[test]
    fn test_next_id() {
        let def = sample_def();
        assert_eq!(next_id(&def), 2);
        assert_eq!(next_id(&TagDef::new()), 0);
    }

    #[test]
    fn test_describe() {
        let def = sample_def();
        let described = describe(&def, &set(&[(1, &[3]), (7, &[1])]));
        assert_eq!(described[0], ("Subsystem".to_string(), vec!["Timing".to_string()]));
        assert_eq!(described[1], ("#7".to_string(), vec!["#1".to_string()]));
    }
}
