use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LauncherError, Result};
use crate::options::OptionSet;
use crate::target::{TargetDescriptor, TargetKind};

/// A named target plus the options to launch it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub target: TargetDescriptor,
    #[serde(default)]
    pub options: OptionSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Preset {
    pub fn new(name: impl Into<String>, target: TargetDescriptor, options: OptionSet) -> Self {
        Self {
            name: name.into(),
            target,
            options,
            saved_at: Some(Utc::now()),
        }
    }

    pub fn kind(&self) -> TargetKind {
        self.target.kind()
    }

    fn matches(&self, name: &str, kind: TargetKind) -> bool {
        self.name == name && self.kind() == kind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Ordered preset list keyed by (name, target kind).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetStore {
    presets: Vec<Preset>,
}

impl PresetStore {
    pub fn list(&self) -> &[Preset] {
        &self.presets
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Looks a preset up by name, narrowing by `kind` when the same name is
    /// used for both target kinds.
    pub fn resolve(&self, name: &str, kind: Option<TargetKind>) -> Result<&Preset> {
        self.position(name, kind).map(|index| &self.presets[index])
    }

    /// Inserts `preset`, replacing an existing one with the same key in place.
    pub fn save(&mut self, mut preset: Preset) -> Result<SaveOutcome> {
        preset.name = validate_name(&preset.name)?;

        let existing = self
            .presets
            .iter()
            .position(|existing| existing.matches(&preset.name, preset.kind()));

        match existing {
            Some(index) => {
                self.presets[index] = preset;
                Ok(SaveOutcome::Updated)
            }
            None => {
                self.presets.push(preset);
                Ok(SaveOutcome::Created)
            }
        }
    }

    /// Rebuilds a deserialized list so names are trimmed and each
    /// (name, kind) key appears once. The last duplicate wins, at the
    /// position of the first.
    pub fn normalized(self) -> Result<Self> {
        let mut store = Self::default();
        for preset in self.presets {
            let (name, kind) = (preset.name.clone(), preset.kind());
            if store.save(preset)? == SaveOutcome::Updated {
                warn!(preset = %name.trim(), %kind, "duplicate preset collapsed");
            }
        }
        Ok(store)
    }

    pub fn remove(&mut self, name: &str, kind: Option<TargetKind>) -> Result<Preset> {
        let index = self.position(name, kind)?;
        Ok(self.presets.remove(index))
    }

    pub fn rename(&mut self, name: &str, kind: Option<TargetKind>, new_name: &str) -> Result<()> {
        let index = self.position(name, kind)?;
        let new_name = validate_name(new_name)?;
        let kind = self.presets[index].kind();

        if let Some(clash) = self.presets.iter().position(|p| p.matches(&new_name, kind)) {
            if clash != index {
                return Err(LauncherError::PresetExists { name: new_name, kind });
            }
        }

        self.presets[index].name = new_name;
        Ok(())
    }

    fn position(&self, name: &str, kind: Option<TargetKind>) -> Result<usize> {
        let name = name.trim();
        let mut matches = self
            .presets
            .iter()
            .enumerate()
            .filter(|(_, p)| p.name == name && kind.is_none_or(|k| p.kind() == k))
            .map(|(index, _)| index);

        match (matches.next(), matches.next()) {
            (Some(index), None) => Ok(index),
            (Some(_), Some(_)) => Err(LauncherError::AmbiguousPreset(name.to_string())),
            (None, _) => Err(LauncherError::PresetNotFound(match kind {
                Some(kind) => format!("{} ({})", name, kind),
                None => name.to_string(),
            })),
        }
    }
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LauncherError::InvalidPresetName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Multiplier;

    fn flatpak(name: &str, app: &str) -> Preset {
        Preset::new(name, TargetDescriptor::flatpak(app, ""), OptionSet::default())
    }

    fn host(name: &str, exe: &str) -> Preset {
        Preset::new(name, TargetDescriptor::host(exe, ""), OptionSet::default())
    }

    fn names(store: &PresetStore) -> Vec<(String, TargetKind)> {
        store.list().iter().map(|p| (p.name.clone(), p.kind())).collect()
    }

    #[test]
    fn save_overwrites_same_name_and_kind_in_place() {
        let mut store = PresetStore::default();
        assert_eq!(store.save(flatpak("VLC", "org.videolan.VLC")).unwrap(), SaveOutcome::Created);
        assert_eq!(store.save(host("Cube", "vkcube")).unwrap(), SaveOutcome::Created);

        let mut updated = flatpak(" VLC ", "org.videolan.VLC");
        updated.options.multiplier = Multiplier::X3;
        assert_eq!(store.save(updated).unwrap(), SaveOutcome::Updated);

        assert_eq!(
            names(&store),
            vec![("VLC".to_string(), TargetKind::Flatpak), ("Cube".to_string(), TargetKind::Host)]
        );
        assert_eq!(store.list()[0].options.multiplier, Multiplier::X3);
    }

    #[test]
    fn same_name_different_kind_is_a_separate_preset() {
        let mut store = PresetStore::default();
        store.save(flatpak("Game", "com.example.Game")).unwrap();
        store.save(host("Game", "/usr/bin/game")).unwrap();

        assert_eq!(store.len(), 2);
        assert!(matches!(store.resolve("Game", None), Err(LauncherError::AmbiguousPreset(_))));
        assert_eq!(
            store.resolve("Game", Some(TargetKind::Host)).unwrap().target.program(),
            "/usr/bin/game"
        );
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut store = PresetStore::default();
        let err = store.save(flatpak("  ", "org.videolan.VLC")).unwrap_err();
        assert!(matches!(err, LauncherError::InvalidPresetName(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_and_missing_lookups() {
        let mut store = PresetStore::default();
        store.save(flatpak("VLC", "org.videolan.VLC")).unwrap();

        assert!(matches!(
            store.remove("VLC", Some(TargetKind::Host)),
            Err(LauncherError::PresetNotFound(_))
        ));
        let removed = store.remove("VLC", None).unwrap();
        assert_eq!(removed.target.program(), "org.videolan.VLC");
        assert!(store.is_empty());
    }

    #[test]
    fn rename_refuses_to_clobber() {
        let mut store = PresetStore::default();
        store.save(flatpak("A", "com.example.A")).unwrap();
        store.save(flatpak("B", "com.example.B")).unwrap();
        store.save(host("C", "c")).unwrap();

        assert!(matches!(store.rename("A", None, "B"), Err(LauncherError::PresetExists { .. })));
        store.rename("C", None, "A").unwrap();
        store.rename("A", Some(TargetKind::Flatpak), " Alpha ").unwrap();

        assert_eq!(
            names(&store),
            vec![
                ("Alpha".to_string(), TargetKind::Flatpak),
                ("B".to_string(), TargetKind::Flatpak),
                ("A".to_string(), TargetKind::Host),
            ]
        );
    }

    #[test]
    fn normalizing_trims_and_collapses_duplicates() {
        let store = PresetStore {
            presets: vec![host("A", "/usr/bin/first"), flatpak(" VLC ", "org.videolan.VLC"), host("A ", "/usr/bin/second")],
        };

        let store = store.normalized().unwrap();
        assert_eq!(
            names(&store),
            vec![("A".to_string(), TargetKind::Host), ("VLC".to_string(), TargetKind::Flatpak)]
        );
        assert_eq!(store.resolve("A", Some(TargetKind::Host)).unwrap().target.program(), "/usr/bin/second");
        assert!(store.resolve(" VLC ", None).is_ok());

        let blank = PresetStore {
            presets: vec![flatpak(" ", "org.videolan.VLC")],
        };
        assert!(matches!(blank.normalized(), Err(LauncherError::InvalidPresetName(_))));
    }

    #[test]
    fn store_round_trips_through_json() {
        let mut store = PresetStore::default();
        store.save(flatpak("VLC", "org.videolan.VLC")).unwrap();
        let mut cube = host("Cube", "vkcube");
        cube.options.mangohud = true;
        cube.saved_at = None;
        store.save(cube).unwrap();

        let json = serde_json::to_string(&store).unwrap();
        assert!(json.starts_with('['));
        let back: PresetStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }
}
