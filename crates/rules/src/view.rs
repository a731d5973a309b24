use codelore_model::{
    module_qualified_name, Endpoint, IncludeKind, ParsedCode, Symbol, SymbolKind, TemplateArtifact,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Read-only indexes over a finished structural model
pub struct ModelView<'a> {
    pub model: &'a ParsedCode,
    symbols: HashMap<&'a str, &'a Symbol>,
    templates: HashMap<&'a str, &'a TemplateArtifact>,
    /// Handler symbol id -> endpoints, in model order
    endpoints_by_handler: BTreeMap<&'a str, Vec<&'a Endpoint>>,
    /// Template path -> templates that reference it, by include kind
    dependents: HashMap<&'a str, Vec<(IncludeKind, &'a str)>>,
    /// Module names of files that failed to parse
    failed_modules: BTreeMap<String, &'a str>,
}

impl<'a> ModelView<'a> {
    pub fn new(model: &'a ParsedCode) -> Self {
        let symbols = model.symbols.iter().map(|s| (s.id.as_str(), s)).collect();
        let templates = model.templates.iter().map(|t| (t.id.as_str(), t)).collect();

        let mut endpoints_by_handler: BTreeMap<&str, Vec<&Endpoint>> = BTreeMap::new();
        for endpoint in &model.endpoints {
            endpoints_by_handler
                .entry(endpoint.symbol.as_str())
                .or_default()
                .push(endpoint);
        }

        let mut dependents: HashMap<&str, Vec<(IncludeKind, &str)>> = HashMap::new();
        for template in &model.templates {
            for (kind, target) in template.resolved_targets() {
                dependents
                    .entry(target)
                    .or_default()
                    .push((kind, template.path.as_str()));
            }
        }

        let failed_modules = model
            .parse_failures
            .iter()
            .filter(|f| f.file.ends_with(".py") || f.file.ends_with(".pyw"))
            .map(|f| (module_qualified_name(&f.file), f.file.as_str()))
            .collect();

        Self {
            model,
            symbols,
            templates,
            endpoints_by_handler,
            dependents,
            failed_modules,
        }
    }

    pub fn symbol(&self, id: &str) -> Option<&'a Symbol> {
        self.symbols.get(id).copied()
    }

    pub fn template(&self, id: &str) -> Option<&'a TemplateArtifact> {
        self.templates.get(id).copied()
    }

    pub fn classes(&self) -> impl Iterator<Item = &'a Symbol> {
        self.model
            .symbols
            .iter()
            .filter(|s| s.kind == SymbolKind::Class)
    }

    pub fn callables(&self) -> impl Iterator<Item = &'a Symbol> {
        self.model.symbols.iter().filter(|s| s.kind.is_callable())
    }

    /// Handlers with their endpoints, ordered by handler id
    pub fn handlers(&self) -> impl Iterator<Item = (&'a Symbol, &[&'a Endpoint])> + '_ {
        self.endpoints_by_handler
            .iter()
            .filter_map(|(id, endpoints)| Some((self.symbol(id)?, endpoints.as_slice())))
    }

    pub fn endpoints_of(&self, handler: &str) -> &[&'a Endpoint] {
        self.endpoints_by_handler
            .get(handler)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Templates including, importing or extending `path`
    pub fn dependents(&self, path: &str) -> &[(IncludeKind, &'a str)] {
        self.dependents
            .get(path)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Module symbol of a file
    pub fn module_of(&self, file: &str) -> Option<&'a Symbol> {
        self.model
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Module && s.file == file)
    }

    /// Failed file whose module name matches an import target
    pub fn failed_module(&self, imported: &str) -> Option<&'a str> {
        let imported = imported.trim_start_matches('.');
        if imported.is_empty() {
            return None;
        }
        let suffix = format!(".{imported}");
        self.failed_modules
            .iter()
            .find(|(module, _)| *module == imported || module.ends_with(&suffix))
            .map(|(_, file)| *file)
    }

    /// Function symbols in `file` with the given simple name
    pub fn function_named(&self, file: &str, name: &str) -> Option<&'a Symbol> {
        self.model
            .symbols
            .iter()
            .find(|s| s.kind.is_callable() && s.file == file && s.name == name)
    }

    /// Class simple names used as a base by at least one class
    pub fn subclasses_by_base(&self) -> BTreeMap<String, BTreeSet<&'a str>> {
        let mut by_base: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        for class in self.classes() {
            for base in &class.bases {
                let base = base.split('[').next().unwrap_or(base);
                let simple = base.rsplit('.').next().unwrap_or(base).trim();
                if !simple.is_empty() {
                    by_base
                        .entry(simple.to_string())
                        .or_default()
                        .insert(class.id.as_str());
                }
            }
        }
        by_base
    }

    /// `"GET /items, POST /items"` for a handler
    pub fn labels(&self, handler: &str) -> String {
        self.endpoints_of(handler)
            .iter()
            .map(|e| e.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
