use super::expr::{self, EvalContext};
use super::funcs::{FunctionRegistry, html_escape, stringify};
use super::unit::{Op, RenderError, Unit};
use serde_json::Value;
use std::collections::HashMap;

/// 执行器：对渲染数据运行可执行单元。
/// 输出缓冲为局部所有，任何退出路径都随栈释放。
pub struct Executor<'a> {
    funcs: &'a FunctionRegistry,
}

impl<'a> Executor<'a> {
    pub fn new(funcs: &'a FunctionRegistry) -> Self {
        Self { funcs }
    }

    pub fn execute(&self, unit: &Unit, data: &Value) -> Result<String, RenderError> {
        let mut out = String::new();
        let mut scopes: Vec<HashMap<String, Value>> = Vec::new();
        self.exec_range(unit, 0, unit.ops.len(), data, &mut scopes, &mut out)?;
        Ok(out)
    }

    fn exec_range(
        &self,
        unit: &Unit,
        lo: usize,
        hi: usize,
        data: &Value,
        scopes: &mut Vec<HashMap<String, Value>>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let mut i = lo;
        while i < hi {
            let line = i + 1;
            match &unit.ops[i] {
                Op::Text(text) => {
                    out.push_str(text);
                    i += 1;
                }

                Op::Echo { expr, escape } => {
                    let ctx = EvalContext {
                        scopes: scopes.as_slice(),
                        data,
                        funcs: self.funcs,
                    };
                    let value =
                        expr::eval(expr, &ctx).map_err(|msg| RenderError::new(msg, line))?;
                    let text = stringify(&value);
                    if *escape {
                        out.push_str(&html_escape(&text));
                    } else {
                        out.push_str(&text);
                    }
                    i += 1;
                }

                Op::Inject { name, default } => {
                    let ctx = EvalContext {
                        scopes: scopes.as_slice(),
                        data,
                        funcs: self.funcs,
                    };
                    let value = ctx.lookup(name);
                    let text = if value.is_null() {
                        default.clone().unwrap_or_default()
                    } else {
                        stringify(&value)
                    };
                    out.push_str(&html_escape(&text));
                    i += 1;
                }

                Op::If(_) => {
                    let info = unit
                        .blocks
                        .get(&i)
                        .ok_or_else(|| RenderError::new("控制块信息缺失", line))?;
                    // 分支段边界：条件自身、各 EF/EL、END
                    let mut bounds = vec![i];
                    bounds.extend(&info.branches);

                    let mut chosen = None;
                    for (n, &branch) in bounds.iter().enumerate() {
                        let seg_end = bounds.get(n + 1).copied().unwrap_or(info.end);
                        let taken = match &unit.ops[branch] {
                            Op::If(cond) | Op::ElseIf(cond) => {
                                let ctx = EvalContext {
                                    scopes: scopes.as_slice(),
                                    data,
                                    funcs: self.funcs,
                                };
                                expr::truthy(
                                    &expr::eval(cond, &ctx)
                                        .map_err(|msg| RenderError::new(msg, branch + 1))?,
                                )
                            }
                            Op::Else => true,
                            _ => false,
                        };
                        if taken {
                            chosen = Some((branch + 1, seg_end));
                            break;
                        }
                    }
                    if let Some((start, end)) = chosen {
                        self.exec_range(unit, start, end, data, scopes, out)?;
                    }
                    i = info.end + 1;
                }

                Op::For { var, iter } => {
                    let info = unit
                        .blocks
                        .get(&i)
                        .ok_or_else(|| RenderError::new("控制块信息缺失", line))?;
                    let ctx = EvalContext {
                        scopes: scopes.as_slice(),
                        data,
                        funcs: self.funcs,
                    };
                    let value =
                        expr::eval(iter, &ctx).map_err(|msg| RenderError::new(msg, line))?;
                    let items = match value {
                        Value::Array(items) => items,
                        Value::Null => Vec::new(),
                        other => {
                            return Err(RenderError::new(
                                format!("@for 的对象不可迭代: {other}"),
                                line,
                            ));
                        }
                    };
                    for item in items {
                        scopes.push(HashMap::from([(var.clone(), item)]));
                        let result = self.exec_range(unit, i + 1, info.end, data, scopes, out);
                        scopes.pop();
                        result?;
                    }
                    i = info.end + 1;
                }

                // 配平保证分支/结束指令只会作为段边界出现
                Op::ElseIf(_) | Op::Else | Op::End => {
                    return Err(RenderError::new("指令顺序异常", line));
                }
            }
        }
        Ok(())
    }
}
