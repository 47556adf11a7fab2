//! Module System for FIL-S
//!
//! A module is one or more scripts assembled under a `Module` node whose
//! trailing children are the exported items of those scripts. The loader
//! resolves `import` statements against search paths, analyzes
//! dependencies first and caches the analyzed roots by name.

use std::fs;
use std::path::{Path, PathBuf};

use crate::frontend::ast::{Ast, AstFlags, AstNode, AstNodeKind, NodeId};
use crate::frontend::parser::parse_script;
use crate::frontend::semantic::{semantic_analysis, ModuleMap, SemanticResult, RUNTIME_MODULE};
use crate::utils::{Error, Position};

/// File extension of FIL-S sources
pub const SOURCE_EXTENSION: &str = "fil";

/// Check if a top-level item is visible outside its module
fn is_exported(ast: &Ast, item: NodeId) -> bool {
    let name = ast.name(item);
    ast.kind(item).is_exportable() && !name.is_empty() && !name.starts_with('_')
}

/// Build a module node from already parsed scripts
pub fn assemble_module(ast: &mut Ast, name: &str, scripts: &[NodeId]) -> NodeId {
    let mut children: Vec<Option<NodeId>> = scripts.iter().map(|s| Some(*s)).collect();
    for script in scripts {
        for item in ast.child_ids(*script) {
            if is_exported(ast, item) {
                children.push(Some(item));
            }
        }
    }

    ast.add(
        AstNode::new(AstNodeKind::Module, Position::synthetic())
            .with_name(name)
            .with_children(children),
    )
}

/// Names and declarations a module (or a lone script) exports
pub fn exported_symbols(ast: &Ast, root: NodeId) -> Vec<(String, NodeId)> {
    match ast.kind(root) {
        AstNodeKind::Module => ast
            .child_ids(root)
            .into_iter()
            .filter(|child| ast.kind(*child) != AstNodeKind::Script)
            .map(|child| (ast.name(child).to_string(), child))
            .collect(),
        AstNodeKind::Script => ast
            .child_ids(root)
            .into_iter()
            .filter(|item| is_exported(ast, *item))
            .map(|item| (ast.name(item).to_string(), item))
            .collect(),
        _ => Vec::new(),
    }
}

/// Modules named by the non-extern imports of `scripts`, in order of
/// first appearance
pub fn imported_modules(ast: &Ast, scripts: &[NodeId]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for script in scripts {
        for item in ast.child_ids(*script) {
            let node = ast.node(item);
            if node.kind == AstNodeKind::Import
                && !node.flags.contains(AstFlags::EXTERN_C)
                && !names.contains(&node.value)
            {
                names.push(node.value.clone());
            }
        }
    }
    names
}

/// Module loader for import resolution
pub struct ModuleLoader {
    /// Search paths for module sources
    search_paths: Vec<PathBuf>,
    /// Analyzed modules by name
    modules: ModuleMap,
    /// Modules currently being loaded (for circular dependency detection)
    loading_stack: Vec<String>,
}

impl ModuleLoader {
    /// Create a new module loader searching the current directory
    pub fn new() -> Self {
        Self {
            search_paths: vec![PathBuf::from(".")],
            modules: ModuleMap::new(),
            loading_stack: Vec::new(),
        }
    }

    /// Create a loader with an explicit list of search paths
    pub fn with_search_paths(paths: Vec<PathBuf>) -> Self {
        let mut loader = Self::new();
        if !paths.is_empty() {
            loader.search_paths = paths;
        }
        loader
    }

    /// Add a search path
    pub fn add_search_path(&mut self, path: PathBuf) {
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
    }

    /// Analyzed modules so far
    pub fn modules(&self) -> &ModuleMap {
        &self.modules
    }

    /// Find the source files of a module: `<name>.fil`, or every `.fil`
    /// file of a `<name>/` directory
    pub fn find_module_sources(&self, module_name: &str) -> Option<Vec<PathBuf>> {
        for search_path in &self.search_paths {
            let file = search_path.join(format!("{}.{}", module_name, SOURCE_EXTENSION));
            if file.is_file() {
                return Some(vec![file]);
            }

            let dir = search_path.join(module_name);
            if dir.is_dir() {
                let mut files: Vec<PathBuf> = fs::read_dir(&dir)
                    .ok()?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|path| path.extension().map_or(false, |ext| ext == SOURCE_EXTENSION))
                    .collect();
                if !files.is_empty() {
                    files.sort();
                    return Some(files);
                }
            }
        }
        None
    }

    /// Load, analyze and cache a module by name
    pub fn load_module(&mut self, ast: &mut Ast, module_name: &str) -> SemanticResult {
        if let Some(root) = self.modules.get(module_name) {
            return Ok(*root);
        }

        if self.loading_stack.iter().any(|m| m == module_name) {
            return Err(vec![Error::ModuleError(format!(
                "Circular module dependency detected: {} -> {}",
                self.loading_stack.join(" -> "),
                module_name
            ))]);
        }

        let sources = self.find_module_sources(module_name).ok_or_else(|| {
            vec![Error::ModuleError(format!(
                "Module not found: {}. Searched in: {:?}",
                module_name, self.search_paths
            ))]
        })?;

        log::debug!("loading module '{}' from {} file(s)", module_name, sources.len());
        self.loading_stack.push(module_name.to_string());
        let result = parse_sources(ast, &sources)
            .and_then(|scripts| self.analyze_module(ast, module_name, &scripts));
        self.loading_stack.pop();

        let root = result?;
        self.modules.insert(module_name.to_string(), root);
        Ok(root)
    }

    /// Assemble `scripts` into a module, load what it imports (and the
    /// runtime module, when one is available) and analyze it
    pub fn analyze_module(&mut self, ast: &mut Ast, module_name: &str, scripts: &[NodeId]) -> SemanticResult {
        let loading_runtime = module_name == RUNTIME_MODULE || self.loading_stack.iter().any(|m| m == RUNTIME_MODULE);
        if !loading_runtime && self.find_module_sources(RUNTIME_MODULE).is_some() {
            self.load_module(ast, RUNTIME_MODULE)?;
        }

        for dependency in imported_modules(ast, scripts) {
            if dependency != module_name {
                self.load_module(ast, &dependency)?;
            }
        }

        let module = assemble_module(ast, module_name, scripts);
        semantic_analysis(ast, module, &self.modules)
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse every file into a script of `ast`, named after its path
pub fn parse_sources(ast: &mut Ast, paths: &[PathBuf]) -> std::result::Result<Vec<NodeId>, Vec<Error>> {
    paths
        .iter()
        .map(|path| parse_file(ast, path).map_err(|e| vec![e]))
        .collect()
}

fn parse_file(ast: &mut Ast, path: &Path) -> crate::utils::Result<NodeId> {
    let source = fs::read_to_string(path)
        .map_err(|e| Error::ModuleError(format!("Failed to read module file {:?}: {}", path, e)))?;
    parse_script(&source, &path.display().to_string(), ast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("filsc_{}_{}", std::process::id(), tag));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn names(symbols: &[(String, NodeId)]) -> Vec<&str> {
        symbols.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[test]
    fn test_assemble_module_exports() {
        let mut ast = Ast::new();
        let a = parse_script("const visible = 1\n const _hidden = 2\n import io", "a", &mut ast).unwrap();
        let b = parse_script("function f() {}\n actor A() {}\n type T is int", "b", &mut ast).unwrap();

        let module = assemble_module(&mut ast, "m", &[a, b]);
        assert_eq!(ast.name(module), "m");
        assert_eq!(ast.children(module).len(), 6);
        assert_eq!(names(&exported_symbols(&ast, module)), vec!["visible", "f", "A", "T"]);
        assert_eq!(names(&exported_symbols(&ast, a)), vec!["visible"]);
    }

    #[test]
    fn test_imported_modules_skip_extern() {
        let mut ast = Ast::new();
        let script = parse_script(
            "import io\n import extern \"stdio.h\"\n import io\n import math",
            "s",
            &mut ast,
        )
        .unwrap();
        assert_eq!(imported_modules(&ast, &[script]), vec!["io".to_string(), "math".to_string()]);
    }

    #[test]
    fn test_loader_resolves_dependencies() {
        let dir = temp_dir("deps");
        fs::write(dir.join("geometry.fil"), "type Point is (x: int, y: int)\n function origin(): Point { (0, 0) }").unwrap();
        fs::write(dir.join("app.fil"), "import geometry\n const p: Point = origin()").unwrap();

        let mut ast = Ast::new();
        let mut loader = ModuleLoader::with_search_paths(vec![dir.clone()]);
        let root = loader.load_module(&mut ast, "app").unwrap();

        assert_eq!(ast.kind(root), AstNodeKind::Module);
        assert!(loader.modules().contains_key("geometry"));
        assert!(loader.modules().contains_key("app"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_loader_detects_cycles() {
        let dir = temp_dir("cycle");
        fs::write(dir.join("a.fil"), "import b\n const x = 1").unwrap();
        fs::write(dir.join("b.fil"), "import a\n const y = 2").unwrap();

        let mut ast = Ast::new();
        let mut loader = ModuleLoader::with_search_paths(vec![dir.clone()]);
        let errors = loader.load_module(&mut ast, "a").unwrap_err();

        assert!(matches!(&errors[0], Error::ModuleError(msg) if msg.contains("a -> b -> a")));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_runtime_symbols_are_visible() {
        let dir = temp_dir("runtime");
        fs::write(dir.join("runtime.fil"), "function tick(): int { 1 }\n function _internal() {}").unwrap();
        fs::write(dir.join("main.fil"), "const t = tick()").unwrap();

        let mut ast = Ast::new();
        let mut loader = ModuleLoader::with_search_paths(vec![dir.clone()]);
        loader.load_module(&mut ast, "main").unwrap();
        assert!(loader.modules().contains_key(RUNTIME_MODULE));

        fs::write(dir.join("hidden.fil"), "const h = _internal()").unwrap();
        let errors = loader.load_module(&mut ast, "hidden").unwrap_err();
        assert!(matches!(&errors[0], Error::NonExistentSymbol { name, .. } if name == "_internal"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_directory_module() {
        let dir = temp_dir("dir_module");
        fs::create_dir_all(dir.join("shapes")).unwrap();
        fs::write(dir.join("shapes").join("a.fil"), "const side = 4").unwrap();
        fs::write(dir.join("shapes").join("b.fil"), "const area = side * side").unwrap();

        let mut ast = Ast::new();
        let mut loader = ModuleLoader::with_search_paths(vec![dir.clone()]);
        let sources = loader.find_module_sources("shapes").unwrap();
        assert_eq!(sources.len(), 2);

        let root = loader.load_module(&mut ast, "shapes").unwrap();
        assert_eq!(names(&exported_symbols(&ast, root)), vec!["side", "area"]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_errors_name_their_script() {
        let dir = temp_dir("attribution");
        let a = dir.join("a.fil");
        let b = dir.join("b.fil");
        fs::write(&a, "const ok = 1").unwrap();
        fs::write(&b, "const x = true + 1").unwrap();

        let mut ast = Ast::new();
        let scripts = parse_sources(&mut ast, &[a, b.clone()]).unwrap();
        let mut loader = ModuleLoader::with_search_paths(vec![dir.clone()]);
        let errors = loader.analyze_module(&mut ast, "a", &scripts).unwrap_err();

        let pos = errors[0].position().unwrap();
        assert_eq!(ast.source_name(pos), Some(b.display().to_string().as_str()));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_errors_in_imported_module_name_its_file() {
        let dir = temp_dir("import_attribution");
        let lib = dir.join("lib.fil");
        fs::write(&lib, "const broken: bool = 3").unwrap();
        fs::write(dir.join("app.fil"), "import lib\n const y = 1").unwrap();

        let mut ast = Ast::new();
        let mut loader = ModuleLoader::with_search_paths(vec![dir.clone()]);
        let errors = loader.load_module(&mut ast, "app").unwrap_err();

        let pos = errors[0].position().unwrap();
        assert_eq!(ast.source_name(pos), Some(lib.display().to_string().as_str()));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_module() {
        let mut ast = Ast::new();
        let mut loader = ModuleLoader::with_search_paths(vec![std::env::temp_dir().join("filsc_nowhere")]);
        let errors = loader.load_module(&mut ast, "ghost").unwrap_err();
        assert!(matches!(&errors[0], Error::ModuleError(msg) if msg.starts_with("Module not found: ghost")));
    }
}
