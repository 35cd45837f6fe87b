//! Bulk export planning: one CSV per (category, distinct measure) pair.

use std::collections::HashSet;

use crate::{
  category::GeographyFamily,
  engine::Engine,
  error::{Error, Result},
  store::StatsStore,
  text::sanitize_path_segment,
};

/// Archive name of the bulk export.
pub fn archive_name(prefix: &str) -> String { format!("{prefix}_All_Measures.zip") }

/// One file of the bulk export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
  pub family:   GeographyFamily,
  pub category: String,
  pub measure:  String,
  /// `family/category label/measure label.csv`, each segment sanitised.
  pub path:     String,
}

impl<S: StatsStore> Engine<S> {
  /// Every file of the bulk export, in registry order and then measure
  /// order. Feed each entry to [`Engine::csv_export`].
  pub async fn export_plan(&self) -> Result<Vec<ExportEntry>> {
    let mut entries = Vec::new();
    let mut used = HashSet::new();

    for dataset in self.catalog().all_datasets() {
      let measures = self
        .store()
        .distinct_measures(dataset, self.limit_to_state())
        .await
        .map_err(Error::store)?;

      let dir = format!(
        "{}/{}",
        sanitize_path_segment(dataset.family().slug()),
        sanitize_path_segment(&dataset.category.label),
      );
      for measure in measures {
        let label = dataset.meta.measure_label(&measure);
        let mut path = format!("{dir}/{}", sanitize_path_segment(&format!("{label}.csv")));
        if !used.insert(path.clone()) {
          // Two labels sanitised to the same name; disambiguate by raw key.
          path = format!(
            "{dir}/{}",
            sanitize_path_segment(&format!("{label} ({measure}).csv"))
          );
          used.insert(path.clone());
        }
        entries.push(ExportEntry {
          family: dataset.family(),
          category: dataset.name().to_owned(),
          measure,
          path,
        });
      }
    }

    Ok(entries)
  }
}
