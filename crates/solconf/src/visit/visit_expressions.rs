use super::Visit;
use hcl::{
    template::{Directive, Element},
    Expression, ObjectKey, Operation, Template, TraversalOperator,
};

/// Recursively visit all [hcl::Expression]s, parents before their children
pub trait VisitExpressions {
    fn visit_expressions(&self, visitor: &mut dyn Visit<Expression>);
}

impl VisitExpressions for Expression {
    fn visit_expressions(&self, visitor: &mut dyn Visit<Expression>) {
        visitor.visit(self);

        match self {
            Expression::Traversal(traversal) => {
                traversal.expr.visit_expressions(visitor);
                for operator in &traversal.operators {
                    if let TraversalOperator::Index(index) = operator {
                        index.visit_expressions(visitor);
                    }
                }
            }
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_expressions(visitor);
                }
            }
            Expression::Object(object) => {
                for (key, value) in object {
                    if let ObjectKey::Expression(key) = key {
                        key.visit_expressions(visitor);
                    }
                    value.visit_expressions(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                // invalid templates are reported when evaluated
                if let Ok(template) = Template::from_expr(template_expr) {
                    template.visit_expressions(visitor);
                }
            }
            Expression::FuncCall(func_call) => {
                for arg in &func_call.args {
                    arg.visit_expressions(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_expressions(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_expressions(visitor);
                cond.true_expr.visit_expressions(visitor);
                cond.false_expr.visit_expressions(visitor);
            }
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_expressions(visitor);
                    binop.rhs_expr.visit_expressions(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_expressions(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr.collection_expr.visit_expressions(visitor);
                forexpr
                    .key_expr
                    .iter()
                    .for_each(|e| e.visit_expressions(visitor));
                forexpr.value_expr.visit_expressions(visitor);
                forexpr
                    .cond_expr
                    .iter()
                    .for_each(|e| e.visit_expressions(visitor));
            }
            _ => {}
        }
    }
}

impl VisitExpressions for Template {
    fn visit_expressions(&self, visitor: &mut dyn Visit<Expression>) {
        for element in self.elements() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_expressions(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_expressions(visitor);
                        ifdir.true_template.visit_expressions(visitor);
                        ifdir
                            .false_template
                            .iter()
                            .for_each(|t| t.visit_expressions(visitor));
                    }
                    Directive::For(fordir) => {
                        fordir.collection_expr.visit_expressions(visitor);
                        fordir.template.visit_expressions(visitor);
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}
