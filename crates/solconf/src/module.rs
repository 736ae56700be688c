//! declaration blocks and modules
//!
//! A [Block] is an ordered namespace of declared members plus their modifier annotations. It is
//! used for both module bodies and nested class-like blocks. A [Module] is a block with extra
//! identity: absolute dotted name, backing file, package and its place in the configuration tree.
use crate::error::ModifierError;
use crate::modifiers::Modifiers;
use crate::overrides::Override;
use crate::resolve::Memo;
use crate::source::Statement;
use crate::value::Value;
use crate::var_path::VarPath;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

pub struct Block {
    name: String,
    /// dotted path of nested block names within the module, empty for module bodies
    qualname: String,
    module: String,
    bases: Vec<Rc<Block>>,
    members: RefCell<IndexMap<String, Value>>,
    annotations: RefCell<IndexMap<String, Modifiers>>,
    default_hidden: RefCell<BTreeSet<String>>,
    memo: Memo,
}

impl Block {
    pub fn new(name: &str, qualname: &str, module: &str, bases: Vec<Rc<Block>>) -> Self {
        Self {
            name: name.to_string(),
            qualname: qualname.to_string(),
            module: module.to_string(),
            bases,
            members: Default::default(),
            annotations: Default::default(),
            default_hidden: Default::default(),
            memo: Memo::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    pub fn module_name(&self) -> &str {
        &self.module
    }

    pub fn bases(&self) -> &[Rc<Block>] {
        &self.bases
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    /// A member declared directly in this block
    pub fn own(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn contains_own(&self, name: &str) -> bool {
        self.members.borrow().contains_key(name)
    }

    pub fn own_names(&self) -> Vec<String> {
        self.members.borrow().keys().cloned().collect()
    }

    /// A member declared in this block or inherited from a base
    ///
    /// Bases are searched in declaration order, the first base wins.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.own(name)
            .or_else(|| self.bases.iter().find_map(|base| base.get(name)))
    }

    pub fn set(&self, name: &str, value: Value) {
        self.members.borrow_mut().insert(name.to_string(), value);
    }

    /// Add an annotation, merging it with an annotation of the same member in this block
    pub fn annotate(&self, name: &str, modifiers: Modifiers) -> Result<(), ModifierError> {
        let mut annotations = self.annotations.borrow_mut();
        let merged = match annotations.get(name) {
            Some(existing) => existing.merge(&modifiers)?,
            None => modifiers,
        };
        annotations.insert(name.to_string(), merged);
        Ok(())
    }

    /// The annotation of a member, inherited annotations are replaced by derived ones
    pub fn annotation(&self, name: &str) -> Option<Modifiers> {
        self.annotations
            .borrow()
            .get(name)
            .cloned()
            .or_else(|| self.bases.iter().find_map(|base| base.annotation(name)))
    }

    pub fn hide_by_default(&self, name: &str) {
        self.default_hidden.borrow_mut().insert(name.to_string());
    }

    pub fn is_default_hidden(&self, name: &str) -> bool {
        self.default_hidden.borrow().contains(name)
            || self.bases.iter().any(|base| base.is_default_hidden(name))
    }

    /// Own and inherited members, most-base first so derived blocks override their bases
    pub fn all_members(&self) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        for base in self.bases.iter().rev() {
            out.extend(base.all_members());
        }
        out.extend(self.members.borrow().clone());
        out
    }

    /// Own and inherited annotations, with the same precedence as [Block::all_members]
    pub fn all_annotations(&self) -> IndexMap<String, Modifiers> {
        let mut out = IndexMap::new();
        for base in self.bases.iter().rev() {
            out.extend(base.all_annotations());
        }
        out.extend(self.annotations.borrow().clone());
        out
    }

    /// The nesting path of this block relative to its module
    pub fn class_path(&self) -> VarPath {
        VarPath::from_steps(
            self.qualname
                .split('.')
                .filter(|component| !component.is_empty())
                .map(|component| crate::var_path::Step::Attribute(component.to_string())),
        )
    }

    pub fn describe(&self) -> String {
        if self.qualname.is_empty() {
            format!("module `{}`", self.module)
        } else {
            format!("block `{}` of module `{}`", self.qualname, self.module)
        }
    }
}

impl Debug for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let members = self.members.borrow();
        let annotations = self.annotations.borrow();
        f.debug_struct("Block")
            .field("qualname", &self.qualname)
            .field("module", &self.module)
            .field(
                "bases",
                &self.bases.iter().map(|base| base.qualname()).collect::<Vec<_>>(),
            )
            .field(
                "members",
                &members
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.describe()))
                    .collect::<IndexMap<_, _>>(),
            )
            .field("annotations", &*annotations)
            .field("default_hidden", &*self.default_hidden.borrow())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    NotExecuted,
    Executing,
    Executed,
}

pub struct Module {
    name: String,
    path: PathBuf,
    package: String,
    /// location relative to the root configuration, `None` when not addressable
    var_path: Option<VarPath>,
    /// statically detected promoted member
    promoted: Option<String>,
    /// `None` for the root configuration module
    root: Option<Weak<Module>>,
    reqs: Vec<Override>,
    block: Block,
    statements: Vec<Statement>,
    state: Cell<ExecState>,
}

#[derive(Debug, derive_new::new)]
pub struct ModuleInit {
    pub name: String,
    pub path: PathBuf,
    pub package: String,
    pub var_path: Option<VarPath>,
    pub promoted: Option<String>,
    pub root: Option<Weak<Module>>,
    pub reqs: Vec<Override>,
    pub statements: Vec<Statement>,
}

impl Module {
    pub fn new(init: ModuleInit) -> Self {
        let block = Block::new(
            init.name.rsplit('.').next().unwrap_or(&init.name),
            "",
            &init.name,
            Vec::new(),
        );

        Self {
            name: init.name,
            path: init.path,
            package: init.package,
            var_path: init.var_path,
            promoted: init.promoted,
            root: init.root,
            reqs: init.reqs,
            block,
            statements: init.statements,
            state: Cell::new(ExecState::NotExecuted),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn var_path(&self) -> Option<&VarPath> {
        self.var_path.as_ref()
    }

    pub fn promoted(&self) -> Option<&str> {
        self.promoted.as_deref()
    }

    /// The root configuration module of the tree this module was loaded into
    ///
    /// `None` when this module is the root.
    pub fn root(&self) -> Option<Rc<Module>> {
        self.root.as_ref().and_then(Weak::upgrade)
    }

    pub fn reqs(&self) -> &[Override] {
        &self.reqs
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn state(&self) -> ExecState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: ExecState) {
        self.state.set(state)
    }

    pub fn describe(&self) -> String {
        format!("module `{}` ({})", self.name, self.path.display())
    }
}

impl Debug for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("package", &self.package)
            .field("var_path", &self.var_path.as_ref().map(VarPath::as_str))
            .field("promoted", &self.promoted)
            .field("is_root", &self.root.is_none())
            .field("reqs", &self.reqs)
            .field("state", &self.state.get())
            .field("block", &self.block)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn inheritance_order() {
        let a = Rc::new(Block::new("A", "A", "pkg.main", vec![]));
        a.set("x", Value::Integer(1));
        a.set("y", Value::Integer(1));
        let b = Rc::new(Block::new("B", "B", "pkg.main", vec![]));
        b.set("y", Value::Integer(2));
        b.set("z", Value::Integer(2));
        let c = Block::new("C", "C", "pkg.main", vec![a, b]);
        c.set("z", Value::Integer(3));

        let members = c.all_members();
        assert_eq!(members.keys().collect::<Vec<_>>(), vec!["y", "z", "x"]);
        assert_eq!(members["x"], Value::Integer(1));
        assert_eq!(members["y"], Value::Integer(1));
        assert_eq!(members["z"], Value::Integer(3));
        assert_eq!(c.get("y"), Some(Value::Integer(1)));
    }

    #[test]
    fn annotations_merge_within_block() {
        let block = Block::new("A", "A", "pkg.main", vec![]);
        block
            .annotate("x", Modifiers::builtin("hidden").unwrap())
            .unwrap();
        block
            .annotate("x", Modifiers::new().with("name", "y"))
            .unwrap();
        assert!(block.annotate("x", Modifiers::builtin("visible").unwrap()).is_err());

        let annotation = block.annotation("x").unwrap();
        assert!(annotation.is_hidden());
        assert_eq!(annotation.rename(), Some("y"));
    }

    #[test]
    fn class_path() {
        let block = Block::new("C", "A.B.C", "pkg.main", vec![]);
        assert_eq!(block.class_path().as_str(), "A.B.C");
        assert!(Block::new("main", "", "pkg.main", vec![]).class_path().is_empty());
    }
}
