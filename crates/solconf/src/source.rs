//! configuration source files
//!
//! A `.solconf` file is an hcl body. The pre-processor turns it into a list of [Statement]s and
//! extracts what has to be known before the module executes:
//!
//! - attributes become member declarations ([Statement::Assign])
//! - blocks become class-like declaration blocks, their labels name base blocks
//! - `modifiers { member = <modifier> }` annotates members of the enclosing body
//! - `import { name = <expr> }` declares members that are hidden by default
//! - the member annotated `promoted` (module scope only)
//!
//! Assigning a reserved name or using an expression outside the supported subset fails here,
//! citing file and line.
use crate::error::{LoadError, PromotionError, Result};
use crate::modifiers::PROMOTED;
use crate::visit::VisitExpressions;
use hcl::{Expression, Template, TraversalOperator};
use hcl_edit::structure::{Attribute, Body, Structure};
use hcl_edit::Span;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// The configuration file extension
pub const EXTENSION: &str = "solconf";

/// Names that configuration source cannot assign
pub const RESERVED: &[&str] = &[
    "load",
    "submodule",
    "req",
    "ref",
    "call",
    "resolved",
    "choices",
    "id_str",
    "modifiers",
    "import",
];

const MODIFIERS_BLOCK: &str = "modifiers";
const IMPORT_BLOCK: &str = "import";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub path: PathBuf,
    pub line: Option<usize>,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Assign {
        name: String,
        expr: Expression,
        location: Location,
    },
    Block {
        name: String,
        bases: Vec<String>,
        body: Vec<Statement>,
        location: Location,
    },
    Annotate {
        name: String,
        expr: Expression,
        location: Location,
    },
    Import {
        name: String,
        expr: Expression,
        location: Location,
    },
}

impl Statement {
    pub fn location(&self) -> &Location {
        match self {
            Statement::Assign { location, .. }
            | Statement::Block { location, .. }
            | Statement::Annotate { location, .. }
            | Statement::Import { location, .. } => location,
        }
    }
}

/// A pre-processed configuration file
#[derive(Debug)]
pub struct ModuleSource {
    pub path: PathBuf,
    pub statements: Vec<Statement>,
    /// the module-scope member annotated `promoted`
    pub promoted: Option<String>,
}

impl ModuleSource {
    pub fn load_file(path: &Path, module: &str) -> Result<Self> {
        tracing::info!(path=%path.display(), module, "loading file");

        let text = std::fs::read_to_string(path).map_err(|source| LoadError::IoError {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&text, path, module)
    }

    pub fn parse(text: &str, path: &Path, module: &str) -> Result<Self> {
        let body = hcl_edit::parser::parse_body(text).map_err(|source| LoadError::HclParseFailed {
            path: path.to_path_buf(),
            source,
        })?;

        let mut pre_processor = PreProcessor {
            text,
            path,
            module,
            promoted: vec![],
        };
        let statements = pre_processor.body(&body, &[])?;

        let promoted = match pre_processor.promoted.len() {
            0 => None,
            1 => pre_processor.promoted.pop(),
            _ => {
                return Err(PromotionError::Multiple {
                    module: module.to_string(),
                    members: pre_processor.promoted,
                }
                .into())
            }
        };

        tracing::trace!(module, statements = statements.len(), ?promoted, "pre-processed");
        Ok(Self {
            path: path.to_path_buf(),
            statements,
            promoted,
        })
    }
}

struct PreProcessor<'a> {
    text: &'a str,
    path: &'a Path,
    module: &'a str,
    promoted: Vec<String>,
}

impl<'a> PreProcessor<'a> {
    fn location(&self, span: Option<std::ops::Range<usize>>) -> Location {
        let line = span
            .and_then(|span| self.text.get(..span.start))
            .map(|before| before.matches('\n').count() + 1);

        Location {
            path: self.path.to_path_buf(),
            line,
        }
    }

    fn body(&mut self, body: &Body, nesting: &[String]) -> Result<Vec<Statement>> {
        let mut statements = vec![];

        for structure in body.iter() {
            match structure {
                Structure::Attribute(attribute) => {
                    let (name, expr, location) = self.attribute(attribute)?;
                    check_reserved(&name, &location)?;
                    statements.push(Statement::Assign {
                        name,
                        expr,
                        location,
                    });
                }
                Structure::Block(block) => {
                    let name = block.ident.value().as_str().to_string();
                    let location = self.location(block.ident.span());

                    match name.as_str() {
                        MODIFIERS_BLOCK | IMPORT_BLOCK => {
                            if !block.labels.is_empty() {
                                return Err(LoadError::InvalidDeclaration {
                                    reason: format!("`{name}` blocks take no labels"),
                                    location: location.to_string(),
                                }
                                .into());
                            }

                            for structure in block.body.iter() {
                                let Structure::Attribute(attribute) = structure else {
                                    return Err(LoadError::InvalidDeclaration {
                                        reason: format!("`{name}` blocks only contain attributes"),
                                        location: location.to_string(),
                                    }
                                    .into());
                                };

                                let (member, expr, location) = self.attribute(attribute)?;
                                if name == MODIFIERS_BLOCK {
                                    self.check_promoted(&member, &expr, nesting)?;
                                    statements.push(Statement::Annotate {
                                        name: member,
                                        expr,
                                        location,
                                    });
                                } else {
                                    check_reserved(&member, &location)?;
                                    statements.push(Statement::Import {
                                        name: member,
                                        expr,
                                        location,
                                    });
                                }
                            }
                        }
                        _ => {
                            check_reserved(&name, &location)?;

                            let mut inner = nesting.to_vec();
                            inner.push(name.clone());
                            let body = self.body(&block.body, &inner)?;

                            statements.push(Statement::Block {
                                name,
                                bases: block
                                    .labels
                                    .iter()
                                    .map(|label| label.as_str().to_string())
                                    .collect(),
                                body,
                                location,
                            });
                        }
                    }
                }
            }
        }

        Ok(statements)
    }

    fn attribute(&self, attribute: &Attribute) -> Result<(String, Expression, Location)> {
        let name = attribute.key.value().as_str().to_string();
        let location = self.location(attribute.key.span());
        let expr: Expression = attribute.value.clone().into();

        if let Some(component) = unsupported_component(&expr) {
            return Err(LoadError::InvalidDeclaration {
                reason: format!("unsupported expression component in `{name}`: {component}"),
                location: location.to_string(),
            }
            .into());
        }

        Ok((name, expr, location))
    }

    /// Record statically promoted members
    fn check_promoted(&mut self, member: &str, expr: &Expression, nesting: &[String]) -> Result<()> {
        let mut promotes = false;
        expr.visit_expressions(&mut |expr: &Expression| {
            if matches!(expr, Expression::Variable(var) if var.as_str() == PROMOTED) {
                promotes = true;
            }
        });

        if !promotes {
            return Ok(());
        }

        if !nesting.is_empty() {
            return Err(PromotionError::NotRoot {
                module: self.module.to_string(),
                path: format!("{}.{member}", nesting.join(".")),
            }
            .into());
        }

        self.promoted.push(member.to_string());
        Ok(())
    }
}

fn check_reserved(name: &str, location: &Location) -> Result<()> {
    if RESERVED.contains(&name) {
        return Err(LoadError::ReservedName {
            name: name.to_string(),
            location: location.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Describes the first expression component outside the supported subset
pub(crate) fn unsupported_component(expr: &Expression) -> Option<String> {
    let mut found = None;
    expr.visit_expressions(&mut |expr: &Expression| {
        if found.is_some() {
            return;
        }

        found = match expr {
            Expression::ForExpr(_) => Some("for expression".to_string()),
            Expression::Traversal(traversal)
                if traversal.operators.iter().any(|operator| {
                    matches!(
                        operator,
                        TraversalOperator::AttrSplat | TraversalOperator::FullSplat
                    )
                }) =>
            {
                Some("splat operator".to_string())
            }
            Expression::FuncCall(func_call) if func_call.expand_final => {
                Some(format!("argument expansion in call to `{}`", func_call.name))
            }
            Expression::TemplateExpr(template_expr) => match Template::from_expr(template_expr) {
                Ok(template)
                    if template
                        .elements()
                        .iter()
                        .any(|element| matches!(element, hcl::template::Element::Directive(_))) =>
                {
                    Some("template directive".to_string())
                }
                _ => None,
            },
            _ => None,
        };
    });
    found
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Result<ModuleSource> {
        ModuleSource::parse(text, Path::new("main.solconf"), "pkg.main")
    }

    #[test]
    fn statements() {
        let source = parse(
            r#"
            a = 1
            B base {
              c = a
              modifiers {
                c = hidden
              }
            }
            import {
              helper = load(".helper")
            }
            "#,
        )
        .unwrap();

        assert_eq!(source.statements.len(), 3);
        assert!(matches!(&source.statements[0], Statement::Assign { name, .. } if name == "a"));
        let Statement::Block { name, bases, body, .. } = &source.statements[1] else {
            panic!("expected a block");
        };
        assert_eq!(name, "B");
        assert_eq!(bases, &vec!["base".to_string()]);
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[1], Statement::Annotate { name, .. } if name == "c"));
        assert!(matches!(&source.statements[2], Statement::Import { name, .. } if name == "helper"));
        assert_eq!(source.promoted, None);
    }

    #[test]
    fn reserved_name_cites_line() {
        let err = parse("a = 1\n\nload = 2\n").unwrap_err();
        let Error::Load(LoadError::ReservedName { name, location }) = err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(name, "load");
        assert_eq!(location, "main.solconf:3");
    }

    #[test]
    fn promoted_detection() {
        let source = parse("A {\n}\nmodifiers {\n  A = [promoted, hidden]\n}\n").unwrap();
        assert_eq!(source.promoted.as_deref(), Some("A"));

        assert!(matches!(
            parse("a = 1\nb = 2\nmodifiers {\n  a = promoted\n  b = promoted\n}\n"),
            Err(Error::Promotion(PromotionError::Multiple { members, .. })) if members == vec!["a", "b"]
        ));

        assert!(matches!(
            parse("A {\n  x = 1\n  modifiers {\n    x = promoted\n  }\n}\n"),
            Err(Error::Promotion(PromotionError::NotRoot { path, .. })) if path == "A.x"
        ));
    }

    #[test]
    fn unsupported_components() {
        for text in [
            "a = [for x in y : x]",
            "a = b[*].c",
            "a = f(b...)",
            "a = \"%{ if b }x%{ endif }\"",
        ] {
            assert!(
                matches!(
                    parse(text),
                    Err(Error::Load(LoadError::InvalidDeclaration { .. }))
                ),
                "{text}"
            );
        }
    }
}
