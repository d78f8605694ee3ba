//! Column maps: output label → nested path.

use std::collections::btree_map::{self, BTreeMap};

use tracing::warn;

use crate::error::InventoryError;
use crate::path::{ColumnPath, PathSegment};
use crate::record::{PROFILE_FIELD, REGION_FIELD, TAGS_FIELD};

/// Label of the instance identifier column.
pub const INSTANCE_ID: &str = "Instance ID";
/// Label of the instance type column.
pub const INSTANCE_TYPE: &str = "Instance Type";
/// Label of the launch time column.
pub const LAUNCH_TIME: &str = "Launch Time";
/// Label of the source profile column.
pub const PROFILE: &str = "Profile";
/// Label of the region column.
pub const REGION: &str = "Region";

/// Label of the tag column for `tag_key`.
pub fn tag_label(tag_key: &str) -> String {
    format!("Tag: {}", tag_key)
}

/// User-requested extra columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArbitraryPaths {
    #[default]
    None,
    /// One path, labelled by its final segment.
    Single(String),
    /// Any number of paths, each labelled by the full path string.
    Many(Vec<String>),
}

/// Mapping from column label to the path extracted for that column.
///
/// Labels are unique and iterate in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<String, ColumnPath>,
}

impl ColumnMap {
    /// Fixed columns plus a `Tag: <tag_key>` column plus `paths`.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::MalformedColumnSpec` if any path fails to parse.
    pub fn build(tag_key: &str, paths: &ArbitraryPaths) -> Result<Self, InventoryError> {
        let mut map = Self::default();
        map.insert(INSTANCE_ID, ColumnPath::from_iter(["InstanceId"]));
        map.insert(INSTANCE_TYPE, ColumnPath::from_iter(["InstanceType"]));
        map.insert(LAUNCH_TIME, ColumnPath::from_iter(["LaunchTime"]));
        map.insert(PROFILE, ColumnPath::from_iter([PROFILE_FIELD]));
        map.insert(REGION, ColumnPath::from_iter([REGION_FIELD]));
        map.insert(
            &tag_label(tag_key),
            ColumnPath::new(vec![
                PathSegment::Key(TAGS_FIELD.to_string()),
                PathSegment::Key(tag_key.to_string()),
            ]),
        );

        match paths {
            ArbitraryPaths::None => {}
            ArbitraryPaths::Single(spec) => {
                let path = ColumnPath::parse(spec)?;
                let label = path.last().map(ToString::to_string).unwrap_or_default();
                map.insert(&label, path);
            }
            ArbitraryPaths::Many(specs) => {
                for spec in specs {
                    let path = ColumnPath::parse(spec)?;
                    map.insert(spec, path);
                }
            }
        }

        Ok(map)
    }

    /// Add a column; an existing column with the same label is replaced.
    pub fn insert(&mut self, label: &str, path: ColumnPath) {
        if let Some(previous) = self.columns.insert(label.to_string(), path) {
            warn!(label, replaced = %previous, "column label collision, keeping the later path");
        }
    }

    pub fn get(&self, label: &str) -> Option<&ColumnPath> {
        self.columns.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.columns.contains_key(label)
    }

    /// Labels in output order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ColumnPath> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<'a> IntoIterator for &'a ColumnMap {
    type Item = (&'a String, &'a ColumnPath);
    type IntoIter = btree_map::Iter<'a, String, ColumnPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_columns() {
        let map = ColumnMap::build("team", &ArbitraryPaths::None).unwrap();
        assert_eq!(map.len(), 6);
        assert_eq!(
            map.labels().collect::<Vec<_>>(),
            [
                "Instance ID",
                "Instance Type",
                "Launch Time",
                "Profile",
                "Region",
                "Tag: team"
            ]
        );
        assert_eq!(
            map.get("Tag: team"),
            Some(&ColumnPath::from_iter(["Tags", "team"]))
        );
        assert_eq!(map.get("Profile"), Some(&ColumnPath::from_iter(["SourceProfile"])));
    }

    #[test]
    fn test_numeric_tag_key_stays_a_field_name() {
        let map = ColumnMap::build("2024", &ArbitraryPaths::None).unwrap();
        assert_eq!(
            map.get("Tag: 2024").unwrap().segments(),
            &[
                PathSegment::Key("Tags".to_string()),
                PathSegment::Key("2024".to_string())
            ]
        );
    }

    #[test]
    fn test_many_paths_use_full_label() {
        let paths = ArbitraryPaths::Many(vec![
            "NetworkInterfaces.0.Association.PublicIp".to_string(),
            "Placement.AvailabilityZone".to_string(),
        ]);
        let map = ColumnMap::build("team", &paths).unwrap();
        assert_eq!(map.len(), 8);
        assert_eq!(
            map.get("NetworkInterfaces.0.Association.PublicIp"),
            Some(&ColumnPath::new(vec![
                "NetworkInterfaces".into(),
                PathSegment::Index(0),
                "Association".into(),
                "PublicIp".into(),
            ]))
        );
        assert!(map.contains("Placement.AvailabilityZone"));
    }

    #[test]
    fn test_single_path_uses_last_segment_label() {
        let paths = ArbitraryPaths::Single("Placement.AvailabilityZone".to_string());
        let map = ColumnMap::build("team", &paths).unwrap();
        assert_eq!(
            map.get("AvailabilityZone"),
            Some(&ColumnPath::from_iter(["Placement", "AvailabilityZone"]))
        );
    }

    #[test]
    fn test_collision_last_wins() {
        // "Region" as a single path collides with the fixed Region column.
        let paths = ArbitraryPaths::Single("Placement.Region".to_string());
        let map = ColumnMap::build("team", &paths).unwrap();
        assert_eq!(map.len(), 6);
        assert_eq!(
            map.get("Region"),
            Some(&ColumnPath::from_iter(["Placement", "Region"]))
        );
    }

    #[test]
    fn test_malformed_path_rejected() {
        let paths = ArbitraryPaths::Many(vec!["Placement..Zone".to_string()]);
        assert!(matches!(
            ColumnMap::build("team", &paths),
            Err(InventoryError::MalformedColumnSpec(_))
        ));
    }

    #[test]
    fn test_labels_are_sorted() {
        let paths = ArbitraryPaths::Many(vec!["ImageId".to_string(), "Architecture".to_string()]);
        let map = ColumnMap::build("env", &paths).unwrap();
        let labels: Vec<_> = map.labels().collect();
        let mut sorted = labels.clone();
        sorted.sort();
        assert_eq!(labels, sorted);
        assert_eq!(labels[0], "Architecture");
    }
}
