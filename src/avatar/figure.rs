//! Figure tables and library resolution for a parsed look

use super::look::LookPart;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// A single drawable part of a figure set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FigurePart {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FigurePart {
    pub fn new(id: u32, kind: impl Into<String>) -> Self {
        Self { id, kind: kind.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FigureSet {
    pub id: u32,
    #[serde(default)]
    pub colorable: bool,
    pub parts: Vec<FigurePart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetType {
    pub palette_id: u32,
    pub sets: HashMap<u32, FigureSet>,
}

/// Set types (`hd`, `ch`, ...) mapped to the sets and parts they contain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FigureData {
    set_types: HashMap<String, SetType>,
}

impl FigureData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_set(&mut self, kind: impl Into<String>, palette_id: u32, set: FigureSet) {
        let set_type = self.set_types.entry(kind.into()).or_insert_with(|| SetType {
            palette_id,
            sets: HashMap::new(),
        });
        set_type.sets.insert(set.id, set);
    }

    pub fn parts(&self, kind: &str, set_id: u32) -> Option<&[FigurePart]> {
        self.set_types
            .get(kind)
            .and_then(|set_type| set_type.sets.get(&set_id))
            .map(|set| set.parts.as_slice())
    }

    pub fn palette_id(&self, kind: &str) -> Option<u32> {
        self.set_types.get(kind).map(|set_type| set_type.palette_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigureMapLibrary {
    pub id: String,
    pub parts: Vec<FigurePart>,
}

/// Which asset library provides each figure part
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Vec<FigureMapLibrary>")]
pub struct FigureMap {
    libraries: Vec<FigureMapLibrary>,
    by_part: HashMap<FigurePart, usize>,
}

impl From<Vec<FigureMapLibrary>> for FigureMap {
    fn from(libraries: Vec<FigureMapLibrary>) -> Self {
        let by_part = libraries
            .iter()
            .enumerate()
            .flat_map(|(index, library)| library.parts.iter().map(move |part| (part.clone(), index)))
            .collect();

        Self { libraries, by_part }
    }
}

impl FigureMap {
    pub fn new(libraries: Vec<FigureMapLibrary>) -> Self {
        libraries.into()
    }

    pub fn library_of_part(&self, id: u32, kind: &str) -> Option<&str> {
        self.by_part
            .get(&FigurePart::new(id, kind))
            .map(|&index| self.libraries[index].id.as_str())
    }

    pub fn libraries(&self) -> impl Iterator<Item = &FigureMapLibrary> {
        self.libraries.iter()
    }
}

/// Minimal set of asset libraries needed to draw the given look parts.
///
/// Sets missing from the figure data and parts missing from the figure map are
/// skipped, so removed wardrobe items only drop their own layers.
pub fn libraries_for_look(
    look: &[LookPart],
    figure_data: &FigureData,
    figure_map: &FigureMap,
) -> BTreeSet<String> {
    let mut libraries = BTreeSet::new();

    for look_part in look {
        let Some(parts) = figure_data.parts(&look_part.kind, look_part.set_id) else {
            debug!("Unknown figure set {}-{}, skipping", look_part.kind, look_part.set_id);
            continue;
        };

        for part in parts {
            match figure_map.library_of_part(part.id, &part.kind) {
                Some(library) => {
                    libraries.insert(library.to_string());
                }
                None => debug!("No library provides part {} {}", part.kind, part.id),
            }
        }
    }

    libraries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::look::parse_look_string;

    fn fixtures() -> (FigureData, FigureMap) {
        let mut data = FigureData::new();
        data.insert_set("hd", 1, FigureSet {
            id: 180,
            colorable: true,
            parts: vec![FigurePart::new(1, "hd"), FigurePart::new(1, "ey"), FigurePart::new(1, "fc")],
        });
        data.insert_set("ch", 3, FigureSet {
            id: 210,
            colorable: true,
            parts: vec![FigurePart::new(4, "ch"), FigurePart::new(4, "ls"), FigurePart::new(4, "rs")],
        });

        let map = FigureMap::new(vec![
            FigureMapLibrary {
                id: "hh_human_face".into(),
                parts: vec![FigurePart::new(1, "ey"), FigurePart::new(1, "fc")],
            },
            FigureMapLibrary {
                id: "hh_human_body".into(),
                parts: vec![FigurePart::new(1, "hd")],
            },
            FigureMapLibrary {
                id: "hh_human_shirt".into(),
                parts: vec![FigurePart::new(4, "ch"), FigurePart::new(4, "ls"), FigurePart::new(4, "rs")],
            },
        ]);

        (data, map)
    }

    #[test]
    fn test_libraries_for_look() {
        let (data, map) = fixtures();
        let libraries = libraries_for_look(&parse_look_string("hd-180-1.ch-210-66"), &data, &map);

        let expected: Vec<&str> = vec!["hh_human_body", "hh_human_face", "hh_human_shirt"];
        assert_eq!(libraries.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_unknown_set_is_skipped() {
        let (data, map) = fixtures();
        let libraries = libraries_for_look(&parse_look_string("hd-180-1.lg-99999-1"), &data, &map);

        assert_eq!(libraries.len(), 2);
        assert!(!libraries.contains("hh_human_shirt"));
    }

    #[test]
    fn test_figure_map_deserializes_from_library_list() {
        let json = r#"[{"id": "hh_human_hair", "parts": [{"id": 7, "type": "hr"}]}]"#;
        let map: FigureMap = serde_json::from_str(json).unwrap();

        assert_eq!(map.library_of_part(7, "hr"), Some("hh_human_hair"));
        assert_eq!(map.library_of_part(7, "hrb"), None);
    }

    #[test]
    fn test_palette_lookup() {
        let (data, _) = fixtures();
        assert_eq!(data.palette_id("ch"), Some(3));
        assert_eq!(data.palette_id("sh"), None);
    }
}
