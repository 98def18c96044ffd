//! Field catalog documents.
//!
//! A catalog lists the telemetry fields a recorder can capture:
//!
//! ```xml
//! <rtde_config>
//!   <recipe key="out">
//!     <field name="timestamp" type="DOUBLE"/>
//!     <field name="actual_q" type="VECTOR6D"/>
//!   </recipe>
//! </rtde_config>
//! ```
//!
//! The same shape is used both for the full catalog and for the selection
//! document handed to the recorder.

use std::io;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

const ROOT_ELEMENT: &str = "rtde_config";
const RECIPE_ELEMENT: &[u8] = b"recipe";
const FIELD_ELEMENT: &[u8] = b"field";

/// A single recordable field and its declared data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FieldDescriptor {
    /// Field name, e.g. `actual_q`.
    pub name: String,
    /// Declared data type, e.g. `VECTOR6D`.
    #[serde(rename = "type")]
    pub field_type: String,
}

impl FieldDescriptor {
    /// Create a new descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// The ordered fields found under one recipe key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCatalog {
    key: String,
    fields: Vec<FieldDescriptor>,
}

impl FieldCatalog {
    /// Create a catalog from already-known fields.
    #[must_use]
    pub fn new(key: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Read and parse the catalog at `path`, collecting the fields of every
    /// recipe whose `key` attribute equals `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogRead`] if the file cannot be read, and the
    /// errors of [`FieldCatalog::parse`] otherwise.
    pub fn load(path: impl AsRef<Path>, key: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::CatalogRead {
            path: path.to_path_buf(),
            source,
        })?;

        let catalog = Self::parse(&text, key, path)?;
        debug!(
            "Loaded {} fields from {} (recipe '{}')",
            catalog.len(),
            path.display(),
            key
        );
        Ok(catalog)
    }

    /// Parse catalog text. `source` only labels error messages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CatalogParse`] for malformed XML or a field without a
    /// `name`/`type`, and [`Error::CatalogMissingRecipe`] when no recipe has
    /// the requested key.
    pub fn parse(text: &str, key: &str, source: &Path) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        let mut fields = Vec::new();
        let mut found_recipe = false;
        // Number of currently open elements.
        let mut depth = 0usize;
        // Depth at which the matching recipe was opened, while inside it.
        let mut recipe_depth: Option<usize> = None;
        let mut root_seen = false;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::catalog_parse(
                    source,
                    format!("{e} (at byte {})", reader.buffer_position()),
                )
            })?;

            match event {
                Event::Start(ref element) | Event::Empty(ref element) => {
                    let is_empty = matches!(event, Event::Empty(_));
                    let name = element.name();

                    if depth == 0 {
                        if root_seen {
                            return Err(Error::catalog_parse(
                                source,
                                "content after the document element",
                            ));
                        }
                        root_seen = true;
                    }

                    if recipe_depth.is_some_and(|d| d + 1 == depth)
                        && name.as_ref() == FIELD_ELEMENT
                    {
                        fields.push(read_field(element, source)?);
                    } else if recipe_depth.is_none()
                        && name.as_ref() == RECIPE_ELEMENT
                        && attribute(element, "key", source)?.as_deref() == Some(key)
                    {
                        found_recipe = true;
                        if !is_empty {
                            recipe_depth = Some(depth);
                        }
                    }

                    if !is_empty {
                        depth += 1;
                    }
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if recipe_depth == Some(depth) {
                        recipe_depth = None;
                    }
                }
                Event::Text(ref content) if depth == 0 => {
                    if content.iter().any(|b| !b.is_ascii_whitespace()) {
                        return Err(Error::catalog_parse(
                            source,
                            "text outside the document element",
                        ));
                    }
                }
                Event::CData(_) if depth == 0 => {
                    return Err(Error::catalog_parse(
                        source,
                        "text outside the document element",
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !root_seen {
            return Err(Error::catalog_parse(source, "no document element"));
        }
        if depth != 0 {
            return Err(Error::catalog_parse(source, "unexpected end of document"));
        }

        if !found_recipe {
            return Err(Error::CatalogMissingRecipe {
                path: source.to_path_buf(),
                key: key.to_string(),
            });
        }

        Ok(Self::new(key, fields))
    }

    /// The recipe key the fields were read from.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// All fields in document order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field names in document order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Field at a listing position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Declared type of `name`. When a name is listed more than once the last
    /// entry wins.
    #[must_use]
    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|f| f.name == name)
            .map(|f| f.field_type.as_str())
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the catalog has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn attribute(element: &BytesStart<'_>, name: &str, source: &Path) -> Result<Option<String>> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| Error::catalog_parse(source, e.to_string()))?;

    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::catalog_parse(source, e.to_string()))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

fn read_field(element: &BytesStart<'_>, source: &Path) -> Result<FieldDescriptor> {
    let name = attribute(element, "name", source)?
        .ok_or_else(|| Error::catalog_parse(source, "field without a 'name' attribute"))?;
    let field_type = attribute(element, "type", source)?.ok_or_else(|| {
        Error::catalog_parse(source, format!("field '{name}' has no 'type' attribute"))
    })?;
    Ok(FieldDescriptor::new(name, field_type))
}

/// Render a catalog-shaped document holding `fields` under `key`.
pub(crate) fn render_document(key: &str, fields: &[FieldDescriptor]) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut emit = |event: Event<'_>| writer.write_event(event).map_err(io::Error::other);

    emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;
    emit(Event::Start(
        BytesStart::new("recipe").with_attributes([("key", key)]),
    ))?;
    for field in fields {
        emit(Event::Empty(BytesStart::new("field").with_attributes([
            ("name", field.name.as_str()),
            ("type", field.field_type.as_str()),
        ])))?;
    }
    emit(Event::End(BytesEnd::new("recipe")))?;
    emit(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}
