use super::expr::{self, Expr};
use crate::compiler::unescape_text;
use std::collections::HashMap;

/// 渲染程序指令，一行一条。行号（1 起始）即 `ops` 下标 + 1，
/// 运行期失败据此回溯到源码映射。
#[derive(Debug, Clone)]
pub enum Op {
    /// 字面文本
    Text(String),
    /// 表达式输出（escape 为 false 时不做 HTML 转义）
    Echo { expr: Expr, escape: bool },
    /// 注入点：取绑定值，缺省时回退默认文本
    Inject { name: String, default: Option<String> },
    If(Expr),
    ElseIf(Expr),
    Else,
    For { var: String, iter: Expr },
    End,
}

/// 运行期失败：信息 + 出错的生成行。
/// 经 ExceptionMapper 结合源码映射改写为模板位置。
#[derive(Debug, Clone)]
pub struct RenderError {
    pub message: String,
    pub line: usize,
}

impl RenderError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// 控制块结构：IF 的分支（EF/EL）位置与 END 位置；FOR 的 END 位置
#[derive(Debug, Clone, Default)]
pub struct BlockInfo {
    pub branches: Vec<usize>,
    pub end: usize,
}

/// 可执行单元：渲染程序文本解析与结构配平后的产物
#[derive(Debug)]
pub struct Unit {
    pub ops: Vec<Op>,
    /// IF/FOR 起始下标 → 块结构
    pub blocks: HashMap<usize, BlockInfo>,
}

impl Unit {
    /// 从渲染程序文本装载单元。指令格式或控制结构非法即失败，
    /// 错误行号指向程序文本（可经源码映射回溯）。
    pub fn parse(content: &str) -> Result<Self, RenderError> {
        let mut ops = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;
            let (code, rest) = match line.split_once(' ') {
                Some((code, rest)) => (code, rest),
                None => (line, ""),
            };
            let op = match code {
                "T" => Op::Text(unescape_text(rest)),
                "E" | "R" => Op::Echo {
                    expr: parse_expr(rest, line_no)?,
                    escape: code == "E",
                },
                "J" => match rest.split_once(' ') {
                    Some((name, default)) => Op::Inject {
                        name: name.to_string(),
                        default: Some(unescape_text(default)),
                    },
                    None if !rest.is_empty() => Op::Inject {
                        name: rest.to_string(),
                        default: None,
                    },
                    None => {
                        return Err(RenderError::new("注入指令缺少名称", line_no));
                    }
                },
                "IF" => Op::If(parse_expr(rest, line_no)?),
                "EF" => Op::ElseIf(parse_expr(rest, line_no)?),
                "EL" => Op::Else,
                "FOR" => match rest.split_once(' ') {
                    Some((var, iter)) => Op::For {
                        var: var.to_string(),
                        iter: parse_expr(iter, line_no)?,
                    },
                    None => {
                        return Err(RenderError::new("循环指令缺少迭代对象", line_no));
                    }
                },
                "END" => Op::End,
                other => {
                    return Err(RenderError::new(
                        format!("无法识别的指令 '{other}'"),
                        line_no,
                    ));
                }
            };
            ops.push(op);
        }

        let blocks = balance(&ops)?;
        Ok(Self { ops, blocks })
    }
}

fn parse_expr(src: &str, line: usize) -> Result<Expr, RenderError> {
    expr::parse(src).map_err(|msg| RenderError::new(format!("表达式无效：{msg}"), line))
}

/// 控制块配平：IF/FOR 与 END 配对，EF/EL 只允许出现在 IF 块内
fn balance(ops: &[Op]) -> Result<HashMap<usize, BlockInfo>, RenderError> {
    let mut blocks: HashMap<usize, BlockInfo> = HashMap::new();
    // (起始下标, 是否为 IF 块)
    let mut stack: Vec<(usize, bool)> = Vec::new();

    for (i, op) in ops.iter().enumerate() {
        let line = i + 1;
        match op {
            Op::If(_) => {
                stack.push((i, true));
                blocks.insert(i, BlockInfo::default());
            }
            Op::For { .. } => {
                stack.push((i, false));
                blocks.insert(i, BlockInfo::default());
            }
            Op::ElseIf(_) | Op::Else => {
                let Some(&(start, is_if)) = stack.last() else {
                    return Err(RenderError::new("分支指令没有匹配的条件块", line));
                };
                if !is_if {
                    return Err(RenderError::new("分支指令出现在循环块内", line));
                }
                blocks.get_mut(&start).expect("block exists").branches.push(i);
            }
            Op::End => {
                let Some((start, _)) = stack.pop() else {
                    return Err(RenderError::new("多余的块结束指令", line));
                };
                blocks.get_mut(&start).expect("block exists").end = i;
            }
            _ => {}
        }
    }

    if let Some(&(start, is_if)) = stack.last() {
        return Err(RenderError::new(
            if is_if {
                "条件块未闭合"
            } else {
                "循环块未闭合"
            },
            start + 1,
        ));
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_op_kind() {
        let unit = Unit::parse("T hello\\n\nE name\nR html\nJ name Guest\nIF ok\nEL\nEND\nFOR x items\nEND").unwrap();
        assert_eq!(unit.ops.len(), 9);
        let Op::Text(t) = &unit.ops[0] else { panic!() };
        assert_eq!(t, "hello\n");
    }

    #[test]
    fn block_structure_resolved() {
        let unit = Unit::parse("IF a\nT x\nEF b\nT y\nEL\nT z\nEND").unwrap();
        let info = &unit.blocks[&0];
        assert_eq!(info.branches, vec![2, 4]);
        assert_eq!(info.end, 6);
    }

    #[test]
    fn unbalanced_rejected() {
        assert!(Unit::parse("IF a\nT x").is_err());
        assert!(Unit::parse("END").is_err());
        assert!(Unit::parse("FOR x items\nEL\nEND").is_err());
    }

    #[test]
    fn bad_expression_reports_line() {
        let err = Unit::parse("T ok\nE a ==").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
