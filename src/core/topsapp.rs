//! topsApp.xml configuration documents.
//!
//! A document is a tree of named components (mappings), properties (scalars)
//! and list properties. Lists are written as repeated sibling `<property>`
//! elements sharing one name, which is how the consuming tool reads them.

use crate::types::{BoundingBox, OrbitMode, PrepError, PrepResult};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;

pub const ROOT_ELEMENT: &str = "topsApp";
pub const TOP_COMPONENT: &str = "topsinsar";
pub const DEFAULT_SENSOR: &str = "SENTINEL1";

pub const KEY_SENSOR: &str = "sensorname";
pub const KEY_REFERENCE: &str = "reference";
pub const KEY_SECONDARY: &str = "secondary";
pub const KEY_SAFE: &str = "safe";
pub const KEY_OUTPUT_DIR: &str = "output directory";
pub const KEY_ORBIT_DIR: &str = "orbit directory";
pub const KEY_SWATHS: &str = "swaths";
pub const KEY_DEM: &str = "demfilename";
pub const KEY_ROI: &str = "regionofinterest";
pub const KEY_GEOCODE_BOX: &str = "geocodeboundingbox";
pub const KEY_AZIMUTH_LOOKS: &str = "azimuthlooks";
pub const KEY_RANGE_LOOKS: &str = "rangelooks";
pub const KEY_FILTER_STRENGTH: &str = "filterstrength";

/// Node of a configuration tree
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Map(IndexMap<String, ConfigNode>),
    List(Vec<String>),
    Scalar(String),
}

impl ConfigNode {
    pub fn map() -> Self {
        ConfigNode::Map(IndexMap::new())
    }

    pub fn scalar(value: impl ToString) -> Self {
        ConfigNode::Scalar(value.to_string())
    }

    pub fn list<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        ConfigNode::List(values.into_iter().map(|v| v.to_string()).collect())
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, ConfigNode>> {
        match self {
            ConfigNode::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Leaf values; a scalar is a one-element view
    pub fn values(&self) -> Vec<&str> {
        match self {
            ConfigNode::Map(_) => Vec::new(),
            ConfigNode::List(items) => items.iter().map(String::as_str).collect(),
            ConfigNode::Scalar(v) => vec![v.as_str()],
        }
    }

    fn is_blank(&self) -> bool {
        self.values().iter().all(|v| v.trim().is_empty())
    }

    fn from_yaml(value: serde_yaml::Value) -> PrepResult<Self> {
        use serde_yaml::Value;
        Ok(match value {
            Value::Mapping(mapping) => {
                let mut map = IndexMap::new();
                for (key, value) in mapping {
                    map.insert(yaml_scalar(&key)?, ConfigNode::from_yaml(value)?);
                }
                ConfigNode::Map(map)
            }
            Value::Sequence(items) => ConfigNode::List(
                items.iter().map(yaml_scalar).collect::<PrepResult<Vec<_>>>()?,
            ),
            Value::Tagged(tagged) => ConfigNode::from_yaml(tagged.value)?,
            other => ConfigNode::Scalar(yaml_scalar(&other)?),
        })
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> PrepResult<String> {
    use serde_yaml::Value;
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(PrepError::InvalidFormat(format!(
            "Template lists may only hold scalars, found {:?}", other
        ))),
    }
}

/// topsApp configuration tree rooted at the `topsApp` element
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    root: IndexMap<String, ConfigNode>,
}

impl Default for ConfigDocument {
    /// Minimal document: fixed sensor name and empty scene lists
    fn default() -> Self {
        let mut reference = IndexMap::new();
        reference.insert(KEY_SAFE.to_string(), ConfigNode::List(Vec::new()));
        let mut secondary = IndexMap::new();
        secondary.insert(KEY_SAFE.to_string(), ConfigNode::List(Vec::new()));

        let mut tops = IndexMap::new();
        tops.insert(KEY_SENSOR.to_string(), ConfigNode::scalar(DEFAULT_SENSOR));
        tops.insert(KEY_REFERENCE.to_string(), ConfigNode::Map(reference));
        tops.insert(KEY_SECONDARY.to_string(), ConfigNode::Map(secondary));

        let mut root = IndexMap::new();
        root.insert(TOP_COMPONENT.to_string(), ConfigNode::Map(tops));
        Self { root }
    }
}

impl ConfigDocument {
    /// Load a YAML template (`topsinsar:` mapping at the top level)
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> PrepResult<Self> {
        log::info!("Reading from template file: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> PrepResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        match ConfigNode::from_yaml(value)? {
            ConfigNode::Map(root) => Ok(Self { root }),
            _ => Err(PrepError::InvalidFormat("Template must be a mapping".to_string())),
        }
    }

    /// Node at a key path such as `["topsinsar", "reference", "safe"]`
    pub fn get(&self, path: &[&str]) -> Option<&ConfigNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.root.get(*first)?;
        for key in rest {
            node = node.as_map()?.get(*key)?;
        }
        Some(node)
    }

    /// Mutable mapping at a key path, creating empty components on the way
    fn component_mut(&mut self, path: &[&str]) -> PrepResult<&mut IndexMap<String, ConfigNode>> {
        let mut map = &mut self.root;
        for key in path {
            let node = map.entry(key.to_string()).or_insert_with(ConfigNode::map);
            map = match node {
                ConfigNode::Map(m) => m,
                _ => {
                    return Err(PrepError::InvalidFormat(format!(
                        "'{}' must be a component, not a property", key
                    )))
                }
            };
        }
        Ok(map)
    }

    /// Check required fields before the document leaves the process
    pub fn validate(&self) -> PrepResult<()> {
        let required: [&[&str]; 5] = [
            &[TOP_COMPONENT, KEY_SENSOR],
            &[TOP_COMPONENT, KEY_REFERENCE, KEY_SAFE],
            &[TOP_COMPONENT, KEY_REFERENCE, KEY_OUTPUT_DIR],
            &[TOP_COMPONENT, KEY_SECONDARY, KEY_SAFE],
            &[TOP_COMPONENT, KEY_SECONDARY, KEY_OUTPUT_DIR],
        ];
        for path in required {
            match self.get(path) {
                Some(node @ (ConfigNode::Scalar(_) | ConfigNode::List(_))) if !node.is_blank() => {}
                _ => return Err(PrepError::MissingRequiredField(path.join("."))),
            }
        }
        Ok(())
    }

    /// Serialize to topsApp XML; fails on a document missing required fields
    pub fn to_xml(&self) -> PrepResult<String> {
        self.validate()?;

        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;
        for (name, node) in &self.root {
            write_node(&mut writer, name, node)?;
        }
        writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| PrepError::InvalidFormat(format!("Non UTF-8 XML output: {}", e)))?;
        xml.push('\n');
        Ok(xml)
    }

    /// Parse topsApp XML; repeated properties with one name become a list
    pub fn from_xml(xml: &str) -> PrepResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut frames: Vec<(String, IndexMap<String, ConfigNode>)> = Vec::new();
        let mut property: Option<(String, String)> = None;
        let mut root: Option<IndexMap<String, ConfigNode>> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"component" => frames.push((name_attribute(&e)?, IndexMap::new())),
                    b"property" => property = Some((name_attribute(&e)?, String::new())),
                    _ if frames.is_empty() => frames.push((String::new(), IndexMap::new())),
                    other => {
                        return Err(PrepError::InvalidFormat(format!(
                            "Unexpected element <{}>", String::from_utf8_lossy(other)
                        )))
                    }
                },
                Event::Empty(e) if e.name().as_ref() == b"property" => {
                    let frame = current_frame(&mut frames)?;
                    push_property(&mut frame.1, name_attribute(&e)?, String::new());
                }
                Event::Text(t) => {
                    if let Some((_, value)) = property.as_mut() {
                        value.push_str(&t.unescape()?);
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"property" => {
                        if let Some((name, value)) = property.take() {
                            let frame = current_frame(&mut frames)?;
                            push_property(&mut frame.1, name, value);
                        }
                    }
                    _ => {
                        let (name, map) = frames.pop().ok_or_else(|| {
                            PrepError::InvalidFormat("Unbalanced XML".to_string())
                        })?;
                        match frames.last_mut() {
                            Some(parent) => {
                                parent.1.insert(name, ConfigNode::Map(map));
                            }
                            None => root = Some(map),
                        }
                    }
                },
                Event::Eof => break,
                _ => {}
            }
        }

        root.map(|root| Self { root })
            .ok_or_else(|| PrepError::InvalidFormat("Empty topsApp document".to_string()))
    }
}

fn write_node<W: std::io::Write>(writer: &mut Writer<W>, name: &str, node: &ConfigNode) -> PrepResult<()> {
    match node {
        ConfigNode::Map(children) => {
            let mut start = BytesStart::new("component");
            start.push_attribute(("name", name));
            writer.write_event(Event::Start(start))?;
            for (child_name, child) in children {
                write_node(writer, child_name, child)?;
            }
            writer.write_event(Event::End(BytesEnd::new("component")))?;
        }
        ConfigNode::List(items) => {
            for item in items {
                write_property(writer, name, item)?;
            }
        }
        ConfigNode::Scalar(value) => write_property(writer, name, value)?,
    }
    Ok(())
}

fn write_property<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: &str) -> PrepResult<()> {
    let mut start = BytesStart::new("property");
    start.push_attribute(("name", name));
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("property")))?;
    Ok(())
}

fn name_attribute(element: &BytesStart) -> PrepResult<String> {
    let attr = element
        .try_get_attribute("name")
        .map_err(quick_xml::Error::from)?
        .ok_or_else(|| PrepError::InvalidFormat(format!(
            "<{}> without a name attribute",
            String::from_utf8_lossy(element.name().as_ref())
        )))?;
    Ok(attr.unescape_value()?.into_owned())
}

fn current_frame(
    frames: &mut [(String, IndexMap<String, ConfigNode>)],
) -> PrepResult<&mut (String, IndexMap<String, ConfigNode>)> {
    frames
        .last_mut()
        .ok_or_else(|| PrepError::InvalidFormat("Property outside of any element".to_string()))
}

fn push_property(map: &mut IndexMap<String, ConfigNode>, name: String, value: String) {
    let Some(node) = map.get_mut(&name) else {
        map.insert(name, ConfigNode::Scalar(value));
        return;
    };
    match node {
        ConfigNode::List(items) => items.push(value),
        ConfigNode::Scalar(first) => {
            let first = std::mem::take(first);
            *node = ConfigNode::List(vec![first, value]);
        }
        ConfigNode::Map(_) => *node = ConfigNode::Scalar(value),
    }
}

/// Field overrides for a pair; `None` leaves the base document untouched
#[derive(Debug, Clone, Default)]
pub struct TopsOverrides {
    pub reference_scenes: Option<Vec<String>>,
    pub secondary_scenes: Option<Vec<String>>,
    pub reference_dir: Option<String>,
    pub secondary_dir: Option<String>,
    pub swaths: Option<Vec<u8>>,
    pub dem: Option<String>,
    pub region_of_interest: Option<BoundingBox>,
    pub geocode_bbox: Option<BoundingBox>,
    pub azimuth_looks: Option<u32>,
    pub range_looks: Option<u32>,
    pub filter_strength: Option<f64>,
    pub orbit_mode: Option<OrbitMode>,
}

/// Applies overrides to a default or template document
pub struct ConfigDocumentBuilder;

impl ConfigDocumentBuilder {
    pub fn build(base: ConfigDocument, overrides: &TopsOverrides) -> PrepResult<ConfigDocument> {
        let mut doc = base;

        if let Some(scenes) = &overrides.reference_scenes {
            doc.component_mut(&[TOP_COMPONENT, KEY_REFERENCE])?
                .insert(KEY_SAFE.to_string(), ConfigNode::list(scenes));
        }
        if let Some(scenes) = &overrides.secondary_scenes {
            doc.component_mut(&[TOP_COMPONENT, KEY_SECONDARY])?
                .insert(KEY_SAFE.to_string(), ConfigNode::list(scenes));
        }
        if let Some(dir) = &overrides.reference_dir {
            doc.component_mut(&[TOP_COMPONENT, KEY_REFERENCE])?
                .insert(KEY_OUTPUT_DIR.to_string(), ConfigNode::scalar(dir));
        }
        if let Some(dir) = &overrides.secondary_dir {
            doc.component_mut(&[TOP_COMPONENT, KEY_SECONDARY])?
                .insert(KEY_OUTPUT_DIR.to_string(), ConfigNode::scalar(dir));
        }

        let tops = doc.component_mut(&[TOP_COMPONENT])?;
        if let Some(swaths) = &overrides.swaths {
            tops.insert(KEY_SWATHS.to_string(), ConfigNode::list(swaths));
        }
        if let Some(dem) = &overrides.dem {
            tops.insert(KEY_DEM.to_string(), ConfigNode::scalar(dem));
        }
        if let Some(roi) = &overrides.region_of_interest {
            tops.insert(KEY_ROI.to_string(), ConfigNode::list(roi.to_snwe()));
        }
        if let Some(gbox) = &overrides.geocode_bbox {
            tops.insert(KEY_GEOCODE_BOX.to_string(), ConfigNode::list(gbox.to_snwe()));
        }
        if let Some(strength) = overrides.filter_strength {
            tops.insert(KEY_FILTER_STRENGTH.to_string(), ConfigNode::scalar(strength));
        }
        if let Some(looks) = overrides.azimuth_looks {
            tops.insert(KEY_AZIMUTH_LOOKS.to_string(), ConfigNode::scalar(looks));
        }
        if let Some(looks) = overrides.range_looks {
            tops.insert(KEY_RANGE_LOOKS.to_string(), ConfigNode::scalar(looks));
        }

        if let Some(mode) = overrides.orbit_mode {
            for block in [KEY_REFERENCE, KEY_SECONDARY] {
                let component = doc.component_mut(&[TOP_COMPONENT, block])?;
                match mode {
                    // Orbit files are downloaded next to topsApp.xml
                    OrbitMode::Precise => {
                        component.insert(KEY_ORBIT_DIR.to_string(), ConfigNode::scalar("."));
                    }
                    OrbitMode::Header => {
                        component.shift_remove(KEY_ORBIT_DIR);
                    }
                }
            }
        }

        Ok(doc)
    }

    /// XML text of a finished document
    pub fn serialize(document: &ConfigDocument) -> PrepResult<String> {
        document.to_xml()
    }
}
