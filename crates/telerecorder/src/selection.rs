//! Selection documents: the subset of a catalog handed to the recorder.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{render_document, FieldCatalog, FieldDescriptor};
use crate::error::{Error, Result};

/// Recipe key the recorder reads its output fields from.
pub const SELECTION_RECIPE_KEY: &str = "out";

/// The operator's chosen fields, in the order they were chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionDocument {
    fields: Vec<FieldDescriptor>,
}

/// Result of subsetting a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The document to write.
    pub document: SelectionDocument,
    /// Selected names that the catalog does not know, in selection order.
    pub skipped: Vec<String>,
}

impl SelectionDocument {
    /// Create a document from explicit fields.
    #[must_use]
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Select every field of `catalog`, dropping repeated names.
    #[must_use]
    pub fn all(catalog: &FieldCatalog) -> Self {
        let names: Vec<&str> = catalog.names().collect();
        Self::from_catalog(catalog, &names).document
    }

    /// Build a document from the `selected` names, typed from `catalog`.
    ///
    /// Names keep the operator's order and appear once. Names missing from
    /// the catalog are left out and reported in [`Selection::skipped`].
    pub fn from_catalog<S: AsRef<str>>(catalog: &FieldCatalog, selected: &[S]) -> Selection {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(selected.len());
        let mut skipped = Vec::new();

        for name in selected.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }
            match catalog.type_of(name) {
                Some(field_type) => fields.push(FieldDescriptor::new(name, field_type)),
                None => {
                    warn!("Field '{}' is not in the catalog; skipping", name);
                    skipped.push(name.to_string());
                }
            }
        }

        Selection {
            document: Self { fields },
            skipped,
        }
    }

    /// The selected fields.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Number of selected fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Write the document to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogWrite`] if the file cannot be written.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let write_err = |source| Error::CatalogWrite {
            path: path.to_path_buf(),
            source,
        };

        let bytes = render_document(SELECTION_RECIPE_KEY, &self.fields).map_err(write_err)?;
        std::fs::write(path, bytes).map_err(write_err)?;

        debug!(
            "Wrote selection of {} fields to {}",
            self.fields.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(
            "out",
            vec![
                FieldDescriptor::new("actual_q", "VECTOR6D"),
                FieldDescriptor::new("timestamp", "DOUBLE"),
                FieldDescriptor::new("robot_mode", "INT32"),
            ],
        )
    }

    #[test]
    fn test_selection_keeps_operator_order_and_types() {
        let selection = SelectionDocument::from_catalog(&catalog(), &["robot_mode", "actual_q"]);

        assert!(selection.skipped.is_empty());
        assert_eq!(
            selection.document.fields(),
            &[
                FieldDescriptor::new("robot_mode", "INT32"),
                FieldDescriptor::new("actual_q", "VECTOR6D"),
            ]
        );
    }

    #[test]
    fn test_selection_example_scenario() {
        let selection = SelectionDocument::from_catalog(&catalog(), &["timestamp"]);
        assert_eq!(
            selection.document.fields(),
            &[FieldDescriptor::new("timestamp", "DOUBLE")]
        );
    }

    #[test]
    fn test_unknown_names_skipped() {
        let selection =
            SelectionDocument::from_catalog(&catalog(), &["bogus", "timestamp", "also_bogus"]);

        assert_eq!(selection.document.len(), 1);
        assert_eq!(selection.skipped, vec!["bogus", "also_bogus"]);
    }

    #[test]
    fn test_duplicates_appear_once() {
        let selection = SelectionDocument::from_catalog(
            &catalog(),
            &["timestamp", "actual_q", "timestamp", "bogus", "bogus"],
        );

        let names: Vec<_> = selection
            .document
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["timestamp", "actual_q"]);
        assert_eq!(selection.skipped, vec!["bogus"]);
    }

    #[test]
    fn test_empty_selection() {
        let selection = SelectionDocument::from_catalog::<&str>(&catalog(), &[]);
        assert!(selection.document.is_empty());
        assert!(selection.skipped.is_empty());
    }

    #[test]
    fn test_select_all() {
        let document = SelectionDocument::all(&catalog());
        assert_eq!(document.fields(), catalog().fields());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selected_fields_config.xml");

        let selection =
            SelectionDocument::from_catalog(&catalog(), &["timestamp", "nope", "actual_q"]);
        selection.document.write_to(&path).unwrap();

        let reread = FieldCatalog::load(&path, SELECTION_RECIPE_KEY).unwrap();
        assert_eq!(reread.fields(), selection.document.fields());
    }

    #[test]
    fn test_write_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selected.xml");
        std::fs::write(&path, "stale contents that are much longer than needed").unwrap();

        SelectionDocument::new(vec![FieldDescriptor::new("timestamp", "DOUBLE")])
            .write_to(&path)
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("stale"));
        assert_eq!(FieldCatalog::load(&path, "out").unwrap().len(), 1);
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("selected.xml");

        let err = SelectionDocument::default().write_to(&path).unwrap_err();
        assert!(matches!(err, Error::CatalogWrite { .. }));
    }
}
