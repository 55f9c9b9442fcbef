use kube::api::DynamicObject;

/// Fixed apply order, keyed by lower-cased `kind.group` (bare kind for the
/// core group). Schema definitions install first so the kinds they introduce
/// can resolve on a later cycle; anything unlisted applies last.
const APPLY_ORDER: [&str; 4] = [
    "customresourcedefinition.apiextensions.k8s.io",
    "bundleexport.ferry.dev",
    "bundlebinding.ferry.dev",
    "namespace",
];

/// Ordering key for one object: `kind.group`, lower-cased, bare kind when
/// the group is the core group. Objects without type information get an
/// empty key, which is simply unlisted.
pub fn class_key(obj: &DynamicObject) -> String {
    let Some(types) = obj.types.as_ref() else {
        return String::new();
    };
    let group = match types.api_version.split_once('/') {
        Some((g, _)) => g,
        None => "",
    };
    let kind = types.kind.to_ascii_lowercase();
    if group.is_empty() {
        kind
    } else {
        format!("{kind}.{}", group.to_ascii_lowercase())
    }
}

pub fn rank(obj: &DynamicObject) -> usize {
    let key = class_key(obj);
    APPLY_ORDER
        .iter()
        .position(|class| *class == key)
        .unwrap_or(APPLY_ORDER.len())
}

/// Stable sort: lower-ranked classes first, input order preserved within a
/// rank. No dependency graph is computed; the rank table is the whole story.
pub fn sort_by_hierarchy(objects: &mut [DynamicObject]) {
    objects.sort_by_key(|obj| rank(obj));
}
