use codelore_model::{Endpoint, Symbol, SymbolKind};
use std::collections::BTreeMap;

/// Resolve endpoint model hints to class symbols by name.
///
/// A class in the handler's own file wins; otherwise the class with the
/// lexicographically first id. Unknown names stay unresolved.
pub fn link_endpoint_models(endpoints: &mut [Endpoint], symbols: &[Symbol]) {
    let mut classes: BTreeMap<&str, Vec<&Symbol>> = BTreeMap::new();
    for symbol in symbols.iter().filter(|s| s.kind == SymbolKind::Class) {
        classes.entry(symbol.name.as_str()).or_default().push(symbol);
    }
    for candidates in classes.values_mut() {
        candidates.sort_by(|a, b| a.id.cmp(&b.id));
    }

    let resolve = |hint: Option<&str>, file: &str| -> Option<String> {
        let candidates = classes.get(hint?)?;
        candidates
            .iter()
            .find(|c| c.file == file)
            .or_else(|| candidates.first())
            .map(|c| c.id.clone())
    };

    for endpoint in endpoints.iter_mut() {
        let file = endpoint
            .symbol
            .split_once("::")
            .map_or(endpoint.symbol.as_str(), |(file, _)| file)
            .to_string();
        endpoint.request_model = resolve(endpoint.request_model_hint.as_deref(), &file);
        endpoint.response_model = resolve(endpoint.response_model_hint.as_deref(), &file);
    }
}
