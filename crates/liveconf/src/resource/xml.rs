//! Lightweight element extraction from XML resource configurations.
//!
//! Resource files are not parsed into a full model; managers only need the
//! text of a handful of elements (reference ids, connection parameters).

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::ResourceIdentifier;

/// Collects `(element local name, trimmed text)` for every element accepted by
/// `wanted`, in document order. Empty elements are skipped.
pub fn collect_element_text<F>(xml: &str, wanted: F) -> Result<Vec<(String, String)>, String>
where
    F: Fn(&str) -> bool,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found = Vec::new();
    // Open elements; the text buffer is only kept for the innermost wanted one.
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<(usize, String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if wanted(&name) {
                    current = Some((stack.len(), name.clone(), String::new()));
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if let Some((depth, _, _)) = &current {
                    if *depth == stack.len() {
                        if let Some((_, name, text)) = current.take() {
                            let text = text.trim().to_string();
                            if !text.is_empty() {
                                found.push((name, text));
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((depth, _, text)) = current.as_mut() {
                    if *depth + 1 == stack.len() {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML parsing error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("Unclosed element <{}>", stack.join("><")));
    }

    Ok(found)
}

/// Extracts resource references from `xml`.
///
/// `references` maps an element name to the resource kind its text refers to,
/// e.g. `JDBCConnId -> jdbc`. The result is sorted and deduplicated.
pub fn extract_references(
    xml: &str,
    references: &BTreeMap<String, String>,
) -> Result<Vec<ResourceIdentifier>, String> {
    if references.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<ResourceIdentifier> =
        collect_element_text(xml, |name| references.contains_key(name))?
            .into_iter()
            .filter_map(|(element, text)| {
                references
                    .get(&element)
                    .map(|kind| ResourceIdentifier::new(kind.clone(), text))
            })
            .collect();

    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Returns the text of the first occurrence of each of `names`.
pub fn first_element_texts(xml: &str, names: &[&str]) -> Result<BTreeMap<String, String>, String> {
    let mut values = BTreeMap::new();
    for (name, text) in collect_element_text(xml, |name| names.contains(&name))? {
        values.entry(name).or_insert(text);
    }
    Ok(values)
}
