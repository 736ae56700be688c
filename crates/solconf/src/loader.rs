//! module loading and linking
//!
//! A [LoaderContext] owns everything that lives for the duration of a configuration load: the
//! initialized packages with their overrides, the cache of loaded modules and the resolver
//! [Registry]. Modules are cached by absolute dotted name and executed at most once, so a module
//! loaded from several places is shared.
//!
//! Module names map directly to files below the package root: module `<package>.a.b` is the file
//! `<root>/a/b.solconf`.
use crate::error::{LoadError, OverrideUsageError, Result};
use crate::eval::Interpreter;
use crate::module::{ExecState, Module, ModuleInit};
use crate::overrides::{cast_overrides, eval_overrides, Override, OverrideSpec};
use crate::resolve::Registry;
use crate::source::{ModuleSource, EXTENSION};
use crate::value::Value;
use crate::var_path::VarPath;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub root: PathBuf,
    pub overrides: Vec<Rc<Override>>,
}

/// How a module is loaded
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// pass the returned value through the resolver
    pub resolve: bool,
    /// return the promoted member instead of the module, if there is one
    pub promoted: bool,
    /// values for required members of the module
    pub reqs: Vec<Override>,
    /// location of the module relative to the root configuration
    pub var_path: Option<VarPath>,
    /// `None` when loading the root configuration module
    pub root: Option<Weak<Module>>,
}

#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// random when not set
    pub package_name: Option<String>,
    pub overrides: Vec<OverrideSpec>,
    /// values for required members of the root module
    pub reqs: Vec<OverrideSpec>,
    pub resolve: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            package_name: None,
            overrides: vec![],
            reqs: vec![],
            resolve: true,
        }
    }
}

#[derive(Debug)]
pub struct LoaderContext {
    packages: RefCell<IndexMap<String, Package>>,
    modules: RefCell<IndexMap<String, Rc<Module>>>,
    registry: Registry,
}

impl Default for LoaderContext {
    fn default() -> Self {
        Self::new(Registry::default())
    }
}

impl LoaderContext {
    pub fn new(registry: Registry) -> Self {
        Self {
            packages: Default::default(),
            modules: Default::default(),
            registry,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Register a package rooted at the directory `path`, returns the package name
    pub fn init_package(
        &self,
        path: &Path,
        name: Option<&str>,
        overrides: Vec<OverrideSpec>,
    ) -> Result<String> {
        let root = path
            .canonicalize()
            .ok()
            .filter(|root| root.is_dir())
            .ok_or_else(|| LoadError::NotADirectory(path.to_path_buf()))?;

        let name = match name {
            Some(name) => name.to_string(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        if self.packages.borrow().contains_key(&name) {
            return Err(LoadError::PackageExists(name).into());
        }

        let overrides = eval_overrides(overrides)?
            .into_iter()
            .map(Rc::new)
            .collect::<Vec<_>>();

        tracing::debug!(package = %name, root = %root.display(), overrides = overrides.len(), "initialized package");
        self.packages.borrow_mut().insert(
            name.clone(),
            Package {
                name: name.clone(),
                root,
                overrides,
            },
        );
        Ok(name)
    }

    /// The override records of a package
    pub fn package_overrides(&self, package: &str) -> Result<Vec<Rc<Override>>> {
        self.packages
            .borrow()
            .get(package)
            .map(|package| package.overrides.clone())
            .ok_or_else(|| LoadError::UnknownPackage(package.to_string()).into())
    }

    pub fn package_root(&self, package: &str) -> Result<PathBuf> {
        self.packages
            .borrow()
            .get(package)
            .map(|package| package.root.clone())
            .ok_or_else(|| LoadError::UnknownPackage(package.to_string()).into())
    }

    /// The package name and file of an absolute module name
    pub fn module_path(&self, name: &str) -> Result<(String, PathBuf)> {
        let (package, relative) = name.split_once('.').unwrap_or((name, ""));
        let mut path = self.package_root(package)?;

        if relative.is_empty() {
            return Err(LoadError::ModuleNotFound {
                name: name.to_string(),
                path,
            }
            .into());
        }

        path.extend(relative.split('.'));
        path.set_extension(EXTENSION);
        Ok((package.to_string(), path))
    }

    /// A module that was already loaded
    pub fn cached(&self, name: &str) -> Option<Rc<Module>> {
        self.modules.borrow().get(name).cloned()
    }

    /// Load (and execute) the module with absolute name `name`
    #[tracing::instrument(skip(self, options), fields(var_path = ?options.var_path.as_ref().map(VarPath::as_str)))]
    pub fn load(&self, name: &str, options: LoadOptions) -> Result<Value> {
        let module = match self.cached(name) {
            Some(module) => {
                if !options.reqs.is_empty() {
                    return Err(LoadError::ReloadWithReqs(name.to_string()).into());
                }
                tracing::debug!(state = ?module.state(), "module from cache");
                module
            }
            None => {
                let (package, path) = self.module_path(name)?;
                if !path.is_file() {
                    return Err(LoadError::ModuleNotFound {
                        name: name.to_string(),
                        path,
                    }
                    .into());
                }

                let source = ModuleSource::load_file(&path, name)?;
                let module = Rc::new(Module::new(ModuleInit::new(
                    name.to_string(),
                    source.path,
                    package,
                    options.var_path,
                    source.promoted,
                    options.root,
                    options.reqs,
                    source.statements,
                )));
                self.modules
                    .borrow_mut()
                    .insert(name.to_string(), module.clone());
                module
            }
        };

        match module.state() {
            ExecState::NotExecuted => {
                module.set_state(ExecState::Executing);
                let executed = Interpreter::new(self, module.clone())
                    .execute()
                    .and_then(|_| Self::check_reqs_used(&module));
                if let Err(err) = executed {
                    self.modules.borrow_mut().shift_remove(name);
                    return Err(err);
                }
                module.set_state(ExecState::Executed);
            }
            ExecState::Executing => {
                tracing::debug!("module is still executing, returning it partially executed")
            }
            ExecState::Executed => {}
        }

        let value = match module.promoted() {
            Some(promoted) if options.promoted && !options.resolve => {
                match module.block().own(promoted) {
                    Some(value) => value,
                    None => Value::Module(module.clone()),
                }
            }
            _ => Value::Module(module.clone()),
        };

        if options.resolve {
            return self.registry.resolve(&value);
        }
        Ok(value)
    }

    fn check_reqs_used(module: &Module) -> Result<()> {
        let unused = module
            .reqs()
            .iter()
            .filter(|record| record.used() == 0)
            .map(Override::source_text)
            .collect::<Vec<_>>();
        if unused.is_empty() {
            return Ok(());
        }

        Err(OverrideUsageError::UnusedReqs {
            module: module.name().to_string(),
            reqs: unused,
        }
        .into())
    }

    /// Fail listing every override of the package that was never applied
    pub fn check_overrides_used(&self, package: &str) -> Result<()> {
        let unused = self
            .package_overrides(package)?
            .iter()
            .filter(|record| record.used() == 0)
            .map(|record| record.source_text())
            .collect::<Vec<_>>();

        if unused.is_empty() {
            return Ok(());
        }
        Err(OverrideUsageError::Unused(unused).into())
    }

    /// Load a configuration file as the root module of a new package
    ///
    /// The package is rooted at the directory containing the file.
    #[tracing::instrument(skip(self, path, options), fields(path = %path.display()))]
    pub fn load_config(&self, path: &Path, options: ConfigOptions) -> Result<Value> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
            return Err(LoadError::InvalidSuffix(path.to_path_buf()).into());
        }
        if !path.is_file() {
            return Err(LoadError::NotFound(path.to_path_buf()).into());
        }

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| LoadError::InvalidSuffix(path.to_path_buf()))?;

        let package = self.init_package(parent, options.package_name.as_deref(), options.overrides)?;
        let value = self.load(
            &format!("{package}.{stem}"),
            LoadOptions {
                resolve: false,
                promoted: true,
                reqs: cast_overrides(options.reqs)?,
                var_path: Some(VarPath::new()),
                root: None,
            },
        )?;

        if !options.resolve {
            return Ok(value);
        }

        self.check_overrides_used(&package)?;
        self.registry.resolve(&value)
    }
}

/// Load and resolve a configuration file with a fresh [LoaderContext]
pub fn load_config(path: &Path, overrides: Vec<OverrideSpec>) -> Result<Value> {
    LoaderContext::default().load_config(
        path,
        ConfigOptions {
            overrides,
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn package(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }
        dir
    }

    #[test]
    fn module_paths() {
        let dir = package(&[]);
        let context = LoaderContext::default();
        let package = context.init_package(dir.path(), Some("pkg"), vec![]).unwrap();
        assert_eq!(package, "pkg");

        let (package, path) = context.module_path("pkg.a.b").unwrap();
        assert_eq!(package, "pkg");
        assert_eq!(path, dir.path().canonicalize().unwrap().join("a/b.solconf"));

        assert!(matches!(
            context.module_path("pkg"),
            Err(Error::Load(LoadError::ModuleNotFound { .. }))
        ));
        assert!(matches!(
            context.module_path("other.a"),
            Err(Error::Load(LoadError::UnknownPackage(name))) if name == "other"
        ));
    }

    #[test]
    fn packages_are_unique() {
        let dir = package(&[]);
        let context = LoaderContext::default();
        context.init_package(dir.path(), Some("pkg"), vec![]).unwrap();
        assert!(matches!(
            context.init_package(dir.path(), Some("pkg"), vec![]),
            Err(Error::Load(LoadError::PackageExists(_)))
        ));

        let generated = context.init_package(dir.path(), None, vec![]).unwrap();
        assert_eq!(generated.len(), 32);

        assert!(matches!(
            context.init_package(&dir.path().join("missing"), None, vec![]),
            Err(Error::Load(LoadError::NotADirectory(_)))
        ));
    }

    #[test]
    fn modules_are_cached() {
        let dir = package(&[("main.solconf", "a = 1"), ("sub.solconf", "b = 2")]);
        let context = LoaderContext::default();
        context.init_package(dir.path(), Some("pkg"), vec![]).unwrap();

        let first = context.load("pkg.sub", LoadOptions::default()).unwrap();
        let second = context.load("pkg.sub", LoadOptions::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(context.cached("pkg.sub").unwrap().state(), ExecState::Executed);

        let reqs = crate::overrides::parse_overrides("b = 3").unwrap();
        assert!(matches!(
            context.load(
                "pkg.sub",
                LoadOptions {
                    reqs,
                    ..Default::default()
                }
            ),
            Err(Error::Load(LoadError::ReloadWithReqs(_)))
        ));
    }

    #[test]
    fn failed_modules_leave_the_cache() {
        let dir = package(&[("main.solconf", "a = undefined_name")]);
        let context = LoaderContext::default();
        context.init_package(dir.path(), Some("pkg"), vec![]).unwrap();

        assert!(context.load("pkg.main", LoadOptions::default()).is_err());
        assert!(context.cached("pkg.main").is_none());
    }

    #[test]
    fn config_paths() {
        let dir = package(&[("main.solconf", "a = 1"), ("other.txt", "")]);
        let context = LoaderContext::default();

        assert!(matches!(
            context.load_config(&dir.path().join("other.txt"), ConfigOptions::default()),
            Err(Error::Load(LoadError::InvalidSuffix(_)))
        ));
        assert!(matches!(
            context.load_config(&dir.path().join("missing.solconf"), ConfigOptions::default()),
            Err(Error::Load(LoadError::NotFound(_)))
        ));
        assert_eq!(
            context
                .load_config(&dir.path().join("main.solconf"), ConfigOptions::default())
                .unwrap(),
            IndexMap::from([("a", 1_i64)]).into()
        );
    }

    #[test]
    fn unresolved_loads_skip_the_usage_check() {
        let dir = package(&[("main.solconf", "a = 1")]);
        let context = LoaderContext::default();
        let value = context
            .load_config(
                &dir.path().join("main.solconf"),
                ConfigOptions {
                    package_name: Some("pkg".to_string()),
                    overrides: vec!["b = 2".into()],
                    resolve: false,
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(matches!(value, Value::Module(_)));
        assert!(matches!(
            context.check_overrides_used("pkg"),
            Err(Error::OverrideUsage(OverrideUsageError::Unused(unused))) if unused == vec!["b = 2"]
        ));
    }
}
