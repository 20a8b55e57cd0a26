//! Interface range expansion.
//!
//! VLAN and port-channel blocks list members in the device's compressed
//! range syntax, e.g. `tagged TengigabitEthernet 1/1-1/4` or
//! `channel-member TengigabitEthernet 1/1-1/2,1/6`. Reconcilers need the
//! individual qualified names.

/// Expands a member specification (`<Type> <ranges>`) into individual
/// qualified interface names, preserving range order.
///
/// Each comma-separated atom is either a single compact label (`1/5`) or a
/// range (`1/1-1/3`) whose endpoints differ only in the last component.
/// Malformed atoms are passed through verbatim as single members so a
/// defensive caller still sees them.
pub fn expand_member_spec(spec: &str) -> Vec<String> {
    let spec = spec.trim();
    let Some((intf_type, rest)) = spec.split_once(char::is_whitespace) else {
        return vec![spec.to_string()];
    };

    let mut out = Vec::new();
    for atom in rest.trim().split(',') {
        let atom = atom.trim();
        if atom.is_empty() {
            continue;
        }
        for label in expand_label_atom(atom) {
            out.push(format!("{} {}", intf_type, label));
        }
    }
    out
}

/// Expands one compact-label atom (`1/1-1/3` or `1/5`) into labels.
fn expand_label_atom(atom: &str) -> Vec<String> {
    let Some((start, end)) = atom.split_once('-') else {
        return vec![atom.to_string()];
    };

    let start_parts: Vec<&str> = start.trim().split('/').collect();
    let end_parts: Vec<&str> = end.trim().split('/').collect();

    // Endpoints must agree on everything but the last component.
    if start_parts.len() != end_parts.len()
        || start_parts.len() < 2
        || start_parts[..start_parts.len() - 1] != end_parts[..end_parts.len() - 1]
    {
        return vec![atom.to_string()];
    }

    let (Ok(lo), Ok(hi)) = (
        start_parts[start_parts.len() - 1].parse::<u32>(),
        end_parts[end_parts.len() - 1].parse::<u32>(),
    ) else {
        return vec![atom.to_string()];
    };
    if lo > hi {
        return vec![atom.to_string()];
    }

    let stem = start_parts[..start_parts.len() - 1].join("/");
    (lo..=hi).map(|n| format!("{}/{}", stem, n)).collect()
}
