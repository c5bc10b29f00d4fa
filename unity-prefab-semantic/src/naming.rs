//! Display names in the style of the Unity inspector
//!
//! `m_LocalPosition` reads as "Local Position", `Rigidbody2D` as
//! "Rigidbody 2D", and a property path such as
//! `m_Children.Array.data[0]` as "Children[0]".

use unity_prefab_core::class_names;

/// Prefixes Unity's serializer puts on field names
const FIELD_PREFIXES: &[&str] = &["m_", "k_", "s_", "_"];

/// Components whose inspector title is not their spaced class name
const COMPONENT_TITLES: &[(&str, &str)] = &[
    (class_names::MONO_BEHAVIOUR, "Script"),
    ("TextMeshPro", "TextMeshPro"),
    ("TextMeshProUGUI", "TextMeshPro - Text (UI)"),
    ("TMP_Text", "TextMeshPro Text"),
];

/// Convert a serialized field name to its inspector label
///
/// Strips one `m_`/`k_`/`s_`/`_` prefix, splits camel case into words and
/// capitalizes the first letter. Short all-caps names (`ID`, `UI`) are
/// kept as they are.
pub fn nicify_variable_name(name: &str) -> String {
    let stripped = FIELD_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name);
    if stripped.is_empty() {
        return name.to_string();
    }

    let chars: Vec<char> = stripped.chars().collect();
    let is_acronym =
        chars.len() <= 4 && chars.iter().any(|c| c.is_uppercase()) && !chars.iter().any(|c| c.is_lowercase());
    if is_acronym {
        return stripped.to_string();
    }

    let mut out = String::with_capacity(stripped.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
            continue;
        }
        let prev = chars[i - 1];
        let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
        if c.is_uppercase() && (prev.is_lowercase() || (prev.is_uppercase() && next_is_lower)) {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

/// Render a property path as inspector breadcrumbs
///
/// `Array` segments are dropped and `data[N]` attaches to the field that
/// owns the array. For a prefab override key
/// (`m_Modification.m_Modifications[id@guid]:path`) only the overridden
/// property path is rendered.
pub fn nicify_property_path(path: &str) -> String {
    let path = path.split_once("]:").map_or(path, |(_, overridden)| overridden);

    let mut parts: Vec<String> = Vec::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if segment == "Array" {
            continue;
        }
        if let Some(index) = segment.strip_prefix("data[")
            && let Some(last) = parts.last_mut()
        {
            last.push('[');
            last.push_str(index);
            continue;
        }
        parts.push(nicify_variable_name(segment));
    }
    parts.join(" > ")
}

/// Inspector label of the last field in a property path
pub fn property_display_name(path: &str) -> String {
    let path = path.split_once("]:").map_or(path, |(_, overridden)| overridden);
    path.rsplit('.')
        .find(|s| !s.is_empty() && *s != "Array" && !s.starts_with("data["))
        .map(nicify_variable_name)
        .unwrap_or_default()
}

/// Inspector title of a component
///
/// Scripts are titled by their class name when the GUID index knows it.
pub fn component_display_name(type_name: &str, script_name: Option<&str>) -> String {
    if let Some(script) = script_name.filter(|s| !s.is_empty())
        && type_name == class_names::MONO_BEHAVIOUR
    {
        return nicify_variable_name(script);
    }
    if let Some((_, title)) = COMPONENT_TITLES.iter().find(|(name, _)| *name == type_name) {
        return title.to_string();
    }

    let mut title = nicify_variable_name(type_name);
    if let Some(head) = title.strip_suffix("2D")
        && !head.is_empty()
        && !head.ends_with(' ')
    {
        title = format!("{} 2D", head);
    }
    title
}
