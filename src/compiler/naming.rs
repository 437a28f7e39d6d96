//! Deterministic naming of dynamic variables.
//!
//! Every runtime variable name is a pure function of the producing request
//! and the produced resource, so that repeated compilations of the same
//! document yield byte-identical grammars.

use crate::{access_path::AccessPath, grammar::RequestId};

/// Splits an endpoint or access-path fragment into name parts. Splitting
/// happens on path and template punctuation plus the `__` separator used in
/// derived type names; empty parts are dropped.
fn name_parts(fragment: &str) -> Vec<String> {
    fragment
        .split("__")
        .flat_map(|part| part.split(['{', '}', '/', '.', '-', ':', '$']))
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect()
}

/// The variable name for a value produced in a response body or taken from
/// a request's own input: endpoint parts, the method, then the access path.
pub fn dynamic_object_variable_name(request: &RequestId, access_path: &AccessPath) -> String {
    let mut parts = name_parts(&request.endpoint);
    parts.push(request.method.as_str().to_lowercase());
    for segment in access_path.segments() {
        // Array hops carry no name information.
        if !crate::access_path::is_array_index(segment) {
            parts.extend(name_parts(segment));
        }
    }
    parts.join("_")
}

/// The variable name for a value produced in a response header. The literal
/// `header` suffix keeps header variables distinct from body variables of
/// the same name.
pub fn header_variable_name(request: &RequestId, header_name: &str) -> String {
    let mut name = dynamic_object_variable_name(
        request,
        &AccessPath::from_segments([header_name.to_owned()]),
    );
    name.push_str("_header");
    name
}

/// The variable name for an ordering constraint between two requests:
/// the shared endpoint prefix once, then what remains of either endpoint.
pub fn ordering_constraint_variable_name(source: &RequestId, target: &RequestId) -> String {
    let source_parts = name_parts(&source.endpoint);
    let target_parts = name_parts(&target.endpoint);
    let common = source_parts
        .iter()
        .zip(target_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts = vec!["__ordering__".to_owned()];
    parts.extend(source_parts[..common].iter().cloned());
    parts.extend(source_parts[common..].iter().cloned());
    parts.extend(target_parts[common..].iter().cloned());
    parts.join("_")
}

/// The constant prefix stored for a generated uuid-suffix payload: the
/// payload name reduced to its letters, lowercased and capped at ten
/// characters. Names without any letters are kept as-is.
pub fn uuid_suffix_prefix(name: &str) -> String {
    let letters: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .flat_map(|c| c.to_lowercase())
        .take(10)
        .collect();
    if letters.is_empty() {
        name.to_owned()
    } else {
        letters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;

    #[test]
    fn body_variable_names() {
        let request = RequestId::new("/stores/{storeId}/orders", Method::Post);
        let path = AccessPath::from_segments(["[0]", "id"]);
        assert_eq!(
            dynamic_object_variable_name(&request, &path),
            "stores_storeid_orders_post_id"
        );
    }

    #[test]
    fn header_variables_get_suffix() {
        let request = RequestId::new("/files", Method::Post);
        assert_eq!(
            header_variable_name(&request, "ETag"),
            "files_post_etag_header"
        );
    }

    #[test]
    fn ordering_names_share_common_prefix() {
        let source = RequestId::new("/stores/{storeId}", Method::Post);
        let target = RequestId::new("/stores/{storeId}/orders", Method::Put);
        assert_eq!(
            ordering_constraint_variable_name(&source, &target),
            "__ordering___stores_storeid_orders"
        );
    }

    #[test]
    fn uuid_prefixes_are_lowercased_letters() {
        assert_eq!(uuid_suffix_prefix("storeId"), "storeid");
        assert_eq!(uuid_suffix_prefix("archives_name"), "archivesna");
        assert_eq!(uuid_suffix_prefix("1234"), "1234");
    }
}
