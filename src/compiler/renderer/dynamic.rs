use crate::compiler::result::CompileResult;
use crate::compiler::{CompileFailure, Compiler, Renderer, escape_text};
use crate::node::{Directive, Node};
use crate::runtime::expr;

/// 动态渲染器：输出表达式、控制指令与注入点。
/// 表达式在这里提前解析校验，问题在编译期带着节点上下文暴露，
/// 而不是等到渲染时。
pub struct DynamicRenderer;

impl Renderer for DynamicRenderer {
    fn render(
        &self,
        _compiler: &Compiler,
        res: &mut CompileResult,
        node: &Node,
    ) -> Result<bool, CompileFailure> {
        match node {
            Node::Echo(e) => {
                check_expr(&e.expr, node)?;
                let op = if e.escape { "E" } else { "R" };
                res.push_line(&format!("{op} {}", flatten(&e.expr)), Some(&e.context));
                Ok(true)
            }
            Node::Directive(d) => {
                self.render_directive(res, d, node)?;
                Ok(true)
            }
            Node::Inline(i) => {
                let op = match &i.default {
                    Some(default) => format!("J {} {}", i.name, escape_text(default)),
                    None => format!("J {}", i.name),
                };
                res.push_line(&op, Some(&i.context));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl DynamicRenderer {
    fn render_directive(
        &self,
        res: &mut CompileResult,
        d: &Directive,
        node: &Node,
    ) -> Result<(), CompileFailure> {
        match d.name.as_str() {
            "if" => {
                let body = require_body(d, node)?;
                check_expr(body, node)?;
                res.push_line(&format!("IF {}", flatten(body)), Some(&d.context));
            }
            "elseif" => {
                let body = require_body(d, node)?;
                check_expr(body, node)?;
                res.push_line(&format!("EF {}", flatten(body)), Some(&d.context));
            }
            "else" => {
                if d.body.is_some() {
                    return Err(CompileFailure::new("指令 @else 不接受参数", node.context()));
                }
                res.push_line("EL", Some(&d.context));
            }
            "endif" | "endfor" => {
                res.push_line("END", Some(&d.context));
            }
            "for" => {
                let body = require_body(d, node)?;
                let Some((var, iter)) = body.split_once(" in ") else {
                    return Err(CompileFailure::new(
                        format!("for 指令缺少 'in' 关键字: {body}"),
                        node.context(),
                    ));
                };
                let var = var.trim();
                let iter = iter.trim();
                if var.is_empty() || !var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(CompileFailure::new(
                        format!("for 指令的循环变量无效: {var}"),
                        node.context(),
                    ));
                }
                check_expr(iter, node)?;
                res.push_line(&format!("FOR {var} {}", flatten(iter)), Some(&d.context));
            }
            other => {
                return Err(CompileFailure::new(
                    format!("无法识别的指令 @{other}"),
                    node.context(),
                ));
            }
        }
        Ok(())
    }
}

fn require_body<'a>(d: &'a Directive, node: &Node) -> Result<&'a str, CompileFailure> {
    match d.body.as_deref() {
        Some(body) if !body.trim().is_empty() => Ok(body),
        _ => Err(CompileFailure::new(
            format!("指令 @{} 缺少参数", d.name),
            node.context(),
        )),
    }
}

fn check_expr(src: &str, node: &Node) -> Result<(), CompileFailure> {
    expr::parse(src)
        .map(|_| ())
        .map_err(|msg| CompileFailure::new(format!("表达式无效：{msg}"), node.context()))
}

/// 表达式内的换行压成空格，保证一行一条指令
fn flatten(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}
